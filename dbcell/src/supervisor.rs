//! ContainerSupervisor - the facade used to drive a database container.
//!
//! Bundles the exec gateway, readiness poller and mount resolver around one
//! shared runtime client. Cheap to clone; clones share the client.

use crate::exec::{ExecGateway, ExecOutcome, ExecSpec};
use crate::health::ReadinessPoller;
use crate::mounts::{HostEnvironment, MountResolver, MountSpec};
use crate::options::{DockerOptions, SupervisorOptions};
use crate::runtime::{ContainerRef, DockerRuntime, SharedRuntime};
use dbcell_shared::errors::DbcellResult;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct ContainerSupervisor {
    gateway: ExecGateway,
    poller: ReadinessPoller,
    resolver: MountResolver,
}

impl ContainerSupervisor {
    pub fn new(runtime: SharedRuntime, options: SupervisorOptions) -> Self {
        Self {
            gateway: ExecGateway::new(runtime.clone(), options),
            poller: ReadinessPoller::new(runtime.clone()),
            resolver: MountResolver::new(runtime),
        }
    }

    /// Connect to the Docker daemon described by `docker`.
    pub fn docker(docker: &DockerOptions, options: SupervisorOptions) -> DbcellResult<Self> {
        let runtime = DockerRuntime::connect(docker)?;
        Ok(Self::new(Arc::new(runtime), options))
    }

    pub async fn execute(
        &self,
        container: &ContainerRef,
        spec: ExecSpec,
        cancel: &CancellationToken,
    ) -> DbcellResult<ExecOutcome> {
        self.gateway.execute(container, spec, cancel).await
    }

    pub async fn execute_foreground(
        &self,
        container: &ContainerRef,
        spec: ExecSpec,
        cancel: &CancellationToken,
    ) -> DbcellResult<ExecOutcome> {
        self.gateway.execute_foreground(container, spec, cancel).await
    }

    pub async fn run_detached(
        &self,
        container: &ContainerRef,
        spec: ExecSpec,
        cancel: &CancellationToken,
    ) -> DbcellResult<()> {
        self.gateway.run_detached(container, spec, cancel).await
    }

    pub async fn wait_ready(
        &self,
        container: &ContainerRef,
        cancel: &CancellationToken,
    ) -> DbcellResult<()> {
        self.poller.wait_ready(container, cancel).await
    }

    pub async fn compute_mounts(
        &self,
        data_dir: &Path,
        host: &HostEnvironment,
    ) -> DbcellResult<Vec<MountSpec>> {
        self.resolver.compute_mounts(data_dir, host).await
    }

    /// Container logs over the configured recent window.
    pub async fn recent_logs(
        &self,
        container: &ContainerRef,
        cancel: &CancellationToken,
    ) -> DbcellResult<String> {
        self.gateway.inspector().recent_logs(container, cancel).await
    }
}
