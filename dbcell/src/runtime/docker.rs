//! Docker Engine implementation of [`ContainerRuntime`] over bollard.

use super::ContainerRuntime;
use super::types::{
    ContainerDetails, ExecHandle, ExecStatus, ExecStream, HealthReport, HealthStatus, LogStream,
    MountKind, MountPoint, ProbeResult,
};
use crate::exec::ExecSpec;
use crate::options::DockerOptions;
use bollard::Docker;
use bollard::container::{InspectContainerOptions, LogOutput, LogsOptions};
use bollard::exec::{CreateExecOptions, StartExecOptions, StartExecResults};
use bollard::models::{
    ContainerInspectResponse, Health, HealthStatusEnum, MountPoint as DockerMountPoint,
    MountPointTypeEnum,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dbcell_shared::errors::{DbcellError, DbcellResult};
use dbcell_shared::frame::{StreamKind, encode_frame};
use futures::StreamExt;
use tokio_util::io::StreamReader;

/// Runtime client backed by the Docker Engine API.
#[derive(Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect using `options`, falling back to local defaults.
    pub fn connect(options: &DockerOptions) -> DbcellResult<Self> {
        let docker = match options.host.as_deref() {
            None => Docker::connect_with_local_defaults().map_err(connect_err)?,
            Some(host) if host.starts_with("tcp://") || host.starts_with("http://") => {
                Docker::connect_with_http(host, options.timeout_secs, bollard::API_DEFAULT_VERSION)
                    .map_err(connect_err)?
            }
            Some(host) => connect_unix(host, options.timeout_secs)?,
        };

        tracing::debug!(host = ?options.host, "Connected Docker client");
        Ok(Self { docker })
    }

    /// Wrap an already configured client.
    pub fn from_client(docker: Docker) -> Self {
        Self { docker }
    }
}

#[cfg(unix)]
fn connect_unix(host: &str, timeout_secs: u64) -> DbcellResult<Docker> {
    let path = host.strip_prefix("unix://").unwrap_or(host);
    Docker::connect_with_unix(path, timeout_secs, bollard::API_DEFAULT_VERSION)
        .map_err(connect_err)
}

#[cfg(not(unix))]
fn connect_unix(host: &str, _timeout_secs: u64) -> DbcellResult<Docker> {
    Err(DbcellError::Config(format!(
        "Unsupported Docker host on this platform: {}",
        host
    )))
}

fn connect_err(e: bollard::errors::Error) -> DbcellError {
    DbcellError::Runtime(format!("Failed to connect to Docker: {}", e))
}

fn runtime_err(e: bollard::errors::Error) -> DbcellError {
    DbcellError::Runtime(e.to_string())
}

#[async_trait::async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn exec_create(&self, container_id: &str, spec: &ExecSpec) -> DbcellResult<ExecHandle> {
        let env = spec.env_vars().map(|env| {
            env.iter()
                .map(|(key, value)| format!("{}={}", key, value))
                .collect::<Vec<_>>()
        });

        let options = CreateExecOptions::<String> {
            cmd: Some(spec.command().to_vec()),
            user: spec.user_name().map(str::to_string),
            tty: Some(spec.is_tty()),
            env,
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            ..Default::default()
        };

        let created = self
            .docker
            .create_exec(container_id, options)
            .await
            .map_err(runtime_err)?;

        Ok(ExecHandle::new(created.id, spec.is_tty()))
    }

    async fn exec_attach(&self, exec: &ExecHandle) -> DbcellResult<ExecStream> {
        let options = StartExecOptions {
            detach: false,
            tty: exec.tty(),
            output_capacity: None,
        };

        match self
            .docker
            .start_exec(exec.id(), Some(options))
            .await
            .map_err(runtime_err)?
        {
            StartExecResults::Attached { output, .. } => {
                // bollard has already split the channels; put them back on the
                // wire format so the demultiplexer stays the only parser.
                let frames = output.map(|chunk| chunk.map(reframe).map_err(std::io::Error::other));
                Ok(Box::pin(StreamReader::new(frames)))
            }
            StartExecResults::Detached => Err(DbcellError::Runtime(format!(
                "exec {} started detached while attaching",
                exec.id()
            ))),
        }
    }

    async fn exec_start_detached(&self, exec: &ExecHandle) -> DbcellResult<()> {
        let options = StartExecOptions {
            detach: true,
            tty: exec.tty(),
            output_capacity: None,
        };

        self.docker
            .start_exec(exec.id(), Some(options))
            .await
            .map_err(runtime_err)?;
        Ok(())
    }

    async fn exec_inspect(&self, exec: &ExecHandle) -> DbcellResult<ExecStatus> {
        let inspect = self
            .docker
            .inspect_exec(exec.id())
            .await
            .map_err(runtime_err)?;

        Ok(ExecStatus {
            running: inspect.running.unwrap_or(false),
            exit_code: inspect.exit_code,
        })
    }

    async fn container_inspect(&self, container: &str) -> DbcellResult<ContainerDetails> {
        let inspect = self
            .docker
            .inspect_container(container, None::<InspectContainerOptions>)
            .await
            .map_err(runtime_err)?;

        Ok(container_details(inspect))
    }

    async fn container_logs(
        &self,
        container_id: &str,
        since: DateTime<Utc>,
    ) -> DbcellResult<LogStream> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            since: since.timestamp(),
            tail: "all".to_string(),
            ..Default::default()
        };

        let docker = self.docker.clone();
        let container_id = container_id.to_string();
        let chunks = async_stream::stream! {
            let mut logs = docker.logs(&container_id, Some(options));
            while let Some(item) = logs.next().await {
                yield item.map(LogOutput::into_bytes).map_err(std::io::Error::other);
            }
        };

        Ok(Box::pin(StreamReader::new(Box::pin(chunks))))
    }
}

fn reframe(output: LogOutput) -> Bytes {
    match output {
        LogOutput::StdErr { message } => encode_frame(StreamKind::Stderr, &message),
        LogOutput::StdOut { message } | LogOutput::Console { message } => {
            encode_frame(StreamKind::Stdout, &message)
        }
        LogOutput::StdIn { message } => encode_frame(StreamKind::Stdin, &message),
    }
}

fn container_details(inspect: ContainerInspectResponse) -> ContainerDetails {
    let health = inspect
        .state
        .and_then(|state| state.health)
        .map(health_report);

    let healthcheck_retries = inspect
        .config
        .and_then(|config| config.healthcheck)
        .and_then(|healthcheck| healthcheck.retries);

    let mounts = inspect
        .mounts
        .unwrap_or_default()
        .into_iter()
        .filter_map(mount_point)
        .collect();

    ContainerDetails {
        id: inspect.id.unwrap_or_default(),
        health,
        healthcheck_retries,
        mounts,
    }
}

fn health_report(health: Health) -> HealthReport {
    let status = match health.status {
        Some(HealthStatusEnum::STARTING) => HealthStatus::Starting,
        Some(HealthStatusEnum::HEALTHY) => HealthStatus::Healthy,
        Some(HealthStatusEnum::UNHEALTHY) => HealthStatus::Unhealthy,
        _ => HealthStatus::None,
    };

    let log = health
        .log
        .unwrap_or_default()
        .into_iter()
        .map(|entry| ProbeResult {
            exit_code: entry.exit_code.unwrap_or_default(),
            output: entry.output.unwrap_or_default(),
        })
        .collect();

    HealthReport { status, log }
}

fn mount_point(mount: DockerMountPoint) -> Option<MountPoint> {
    let destination = mount.destination?;
    let kind = match mount.typ {
        Some(MountPointTypeEnum::BIND) => MountKind::Bind,
        Some(MountPointTypeEnum::VOLUME) => MountKind::Volume,
        Some(MountPointTypeEnum::TMPFS) => MountKind::Tmpfs,
        Some(other) => MountKind::parse(&other.to_string()),
        None => MountKind::Bind,
    };

    Some(MountPoint {
        kind,
        source: mount.source.unwrap_or_default(),
        destination,
        rw: mount.rw.unwrap_or(false),
        propagation: mount.propagation.filter(|p| !p.is_empty()),
    })
}
