//! Configuration for the supervisor, the Docker client, and logging.

use crate::constants::{env, exec, logs};
use dbcell_shared::errors::{DbcellError, DbcellResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Tunables for exec supervision.
///
/// The readiness poll interval is deliberately absent; it is fixed at
/// [`crate::constants::health::POLL_INTERVAL`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorOptions {
    /// How far back the diagnostic inspector reads container logs.
    pub recent_logs_window_secs: u64,
    /// Grace period for an abandoned demux task before it is aborted.
    pub demux_cleanup_timeout_ms: u64,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            recent_logs_window_secs: logs::RECENT_WINDOW.as_secs(),
            demux_cleanup_timeout_ms: exec::DEMUX_CLEANUP_TIMEOUT.as_millis() as u64,
        }
    }
}

impl SupervisorOptions {
    pub fn recent_logs_window(&self) -> Duration {
        Duration::from_secs(self.recent_logs_window_secs)
    }

    pub fn demux_cleanup_timeout(&self) -> Duration {
        Duration::from_millis(self.demux_cleanup_timeout_ms)
    }
}

/// Docker API connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerOptions {
    /// `unix:///path`, a bare socket path, or `http(s)://host:port`.
    /// Local defaults are used when unset.
    pub host: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for DockerOptions {
    fn default() -> Self {
        Self {
            host: None,
            timeout_secs: 120,
        }
    }
}

impl DockerOptions {
    /// Read overrides from the environment.
    ///
    /// `DBCELL_DOCKER_HOST` wins over `DOCKER_HOST`.
    pub fn from_env() -> DbcellResult<Self> {
        let mut options = Self::default();

        options.host = std::env::var(env::DOCKER_HOST)
            .or_else(|_| std::env::var(env::DOCKER_HOST_FALLBACK))
            .ok()
            .filter(|host| !host.trim().is_empty());

        if let Ok(raw) = std::env::var(env::DOCKER_TIMEOUT) {
            options.timeout_secs = raw.trim().parse().map_err(|e| {
                DbcellError::Config(format!(
                    "{} must be a number of seconds, got {:?}: {}",
                    env::DOCKER_TIMEOUT,
                    raw,
                    e
                ))
            })?;
        }

        Ok(options)
    }
}

/// Logging destination and default filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingOptions {
    /// Write daily-rolling log files here instead of stderr.
    pub log_dir: Option<PathBuf>,
    /// Filter used when `RUST_LOG` is unset.
    pub default_filter: String,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            log_dir: std::env::var_os(env::LOG_DIR).map(PathBuf::from),
            default_filter: "info".to_string(),
        }
    }
}
