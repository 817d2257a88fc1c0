//! Runtime-neutral views of containers and exec sessions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;
use tokio::io::AsyncRead;

/// Multiplexed stdout/stderr byte stream of an attached exec session.
pub type ExecStream = Pin<Box<dyn AsyncRead + Send>>;

/// Plain container log bytes.
pub type LogStream = Pin<Box<dyn AsyncRead + Send>>;

/// Identifies a container created by some other component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerRef {
    id: String,
    name: Option<String>,
}

impl ContainerRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl fmt::Display for ContainerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} ({})", name, self.id),
            None => f.write_str(&self.id),
        }
    }
}

/// Runtime-issued exec session identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecHandle {
    id: String,
    tty: bool,
}

impl ExecHandle {
    pub fn new(id: impl Into<String>, tty: bool) -> Self {
        Self { id: id.into(), tty }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether the session was created with a TTY.
    pub fn tty(&self) -> bool {
        self.tty
    }
}

/// Exec session state from inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecStatus {
    pub running: bool,
    /// Unset while the command is still running.
    pub exit_code: Option<i64>,
}

/// Container health status as reported by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    None,
    Starting,
    Healthy,
    Unhealthy,
}

/// One entry of the health probe log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeResult {
    pub exit_code: i64,
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    pub status: HealthStatus,
    /// Oldest first.
    pub log: Vec<ProbeResult>,
}

impl HealthReport {
    pub fn last_probe(&self) -> Option<&ProbeResult> {
        self.log.last()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MountKind {
    Bind,
    Volume,
    Tmpfs,
    #[serde(untagged)]
    Other(String),
}

impl MountKind {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "bind" => MountKind::Bind,
            "volume" => MountKind::Volume,
            "tmpfs" => MountKind::Tmpfs,
            other => MountKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            MountKind::Bind => "bind",
            MountKind::Volume => "volume",
            MountKind::Tmpfs => "tmpfs",
            MountKind::Other(raw) => raw,
        }
    }
}

impl fmt::Display for MountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A mount as seen from inside an existing container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountPoint {
    pub kind: MountKind,
    pub source: String,
    pub destination: String,
    pub rw: bool,
    pub propagation: Option<String>,
}

/// Container state relevant to readiness and mount resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerDetails {
    pub id: String,
    /// Absent until the runtime has bootstrapped a health check.
    pub health: Option<HealthReport>,
    /// Configured probe retry count, if a health check is configured.
    pub healthcheck_retries: Option<i64>,
    pub mounts: Vec<MountPoint>,
}
