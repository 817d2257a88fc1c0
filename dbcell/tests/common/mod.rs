//! Scripted runtime shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dbcell::exec::ExecSpec;
use dbcell::runtime::{
    ContainerDetails, ContainerRuntime, ExecHandle, ExecStatus, ExecStream, HealthReport,
    HealthStatus, LogStream, MountKind, MountPoint, ProbeResult,
};
use dbcell::{DbcellError, DbcellResult};
use dbcell_shared::frame::{StreamKind, encode_frame};
use std::collections::VecDeque;
use std::sync::Mutex;

/// One scripted exec: frames to stream back and the exit status to report.
pub struct ScriptedExec {
    pub frames: Vec<(StreamKind, Vec<u8>)>,
    pub status: ExecStatus,
}

impl ScriptedExec {
    pub fn exited(exit_code: i64) -> Self {
        Self {
            frames: Vec::new(),
            status: ExecStatus {
                running: false,
                exit_code: Some(exit_code),
            },
        }
    }

    pub fn stdout(mut self, payload: &str) -> Self {
        self.frames.push((StreamKind::Stdout, payload.as_bytes().to_vec()));
        self
    }

    pub fn stderr(mut self, payload: &str) -> Self {
        self.frames.push((StreamKind::Stderr, payload.as_bytes().to_vec()));
        self
    }
}

#[derive(Default)]
pub struct ScriptedRuntime {
    execs: Mutex<VecDeque<ScriptedExec>>,
    statuses: Mutex<Vec<(String, ExecStatus)>>,
    inspections: Mutex<VecDeque<ContainerDetails>>,
    logs: Mutex<String>,
    pub commands: Mutex<Vec<(String, Vec<String>)>>,
}

impl ScriptedRuntime {
    pub fn push_exec(&self, exec: ScriptedExec) {
        self.execs.lock().unwrap().push_back(exec);
    }

    /// Queue container states; the last one repeats.
    pub fn push_details(&self, details: ContainerDetails) {
        self.inspections.lock().unwrap().push_back(details);
    }

    pub fn set_logs(&self, logs: &str) {
        *self.logs.lock().unwrap() = logs.to_string();
    }

    pub fn commands(&self) -> Vec<(String, Vec<String>)> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContainerRuntime for ScriptedRuntime {
    async fn exec_create(&self, container_id: &str, spec: &ExecSpec) -> DbcellResult<ExecHandle> {
        let mut commands = self.commands.lock().unwrap();
        commands.push((container_id.to_string(), spec.command().to_vec()));
        Ok(ExecHandle::new(
            format!("exec-{}", commands.len()),
            spec.is_tty(),
        ))
    }

    async fn exec_attach(&self, exec: &ExecHandle) -> DbcellResult<ExecStream> {
        let scripted = self
            .execs
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| DbcellError::Runtime("no exec scripted".into()))?;

        let mut wire = Vec::new();
        for (kind, payload) in &scripted.frames {
            wire.extend_from_slice(&encode_frame(*kind, payload));
        }
        self.statuses
            .lock()
            .unwrap()
            .push((exec.id().to_string(), scripted.status));
        Ok(Box::pin(std::io::Cursor::new(wire)))
    }

    async fn exec_start_detached(&self, exec: &ExecHandle) -> DbcellResult<()> {
        let scripted = self
            .execs
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| DbcellError::Runtime("no exec scripted".into()))?;
        self.statuses
            .lock()
            .unwrap()
            .push((exec.id().to_string(), scripted.status));
        Ok(())
    }

    async fn exec_inspect(&self, exec: &ExecHandle) -> DbcellResult<ExecStatus> {
        self.statuses
            .lock()
            .unwrap()
            .iter()
            .find(|(id, _)| id == exec.id())
            .map(|(_, status)| *status)
            .ok_or_else(|| DbcellError::Runtime(format!("no such exec: {}", exec.id())))
    }

    async fn container_inspect(&self, container: &str) -> DbcellResult<ContainerDetails> {
        let mut queue = self.inspections.lock().unwrap();
        let details = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        details.ok_or_else(|| DbcellError::Runtime(format!("no such container: {}", container)))
    }

    async fn container_logs(
        &self,
        _container_id: &str,
        _since: DateTime<Utc>,
    ) -> DbcellResult<LogStream> {
        let logs = self.logs.lock().unwrap().clone().into_bytes();
        Ok(Box::pin(std::io::Cursor::new(logs)))
    }
}

pub fn container(status: Option<HealthStatus>, log: &[(i64, &str)]) -> ContainerDetails {
    ContainerDetails {
        id: "pg".into(),
        health: status.map(|status| HealthReport {
            status,
            log: log
                .iter()
                .map(|(exit_code, output)| ProbeResult {
                    exit_code: *exit_code,
                    output: output.to_string(),
                })
                .collect(),
        }),
        healthcheck_retries: Some(3),
        mounts: Vec::new(),
    }
}

pub fn bind(source: &str, destination: &str) -> MountPoint {
    MountPoint {
        kind: MountKind::Bind,
        source: source.into(),
        destination: destination.into(),
        rw: true,
        propagation: None,
    }
}
