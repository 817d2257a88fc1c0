//! Error taxonomy for container exec supervision.
//!
//! Every variant that maps to a runtime interaction carries `op`, the name of
//! the failing operation, so errors read as `"<op>: <detail>"` all the way up
//! to the caller. No variant is ever retried internally.

use thiserror::Error;

/// Result alias used throughout dbcell.
pub type DbcellResult<T> = Result<T, DbcellError>;

#[derive(Debug, Error)]
pub enum DbcellError {
    /// The runtime rejected exec session creation (e.g. container not running).
    #[error("{op}: failed to create exec session: {reason}")]
    Creation { op: String, reason: String },

    /// The runtime rejected the stream attach.
    #[error("{op}: failed to attach to exec session: {reason}")]
    Attach { op: String, reason: String },

    /// Output demultiplexing failed, or the command wrote to stderr.
    #[error("{op}: {reason}")]
    Demux { op: String, reason: String },

    /// The command finished with a non-zero exit code.
    #[error("{op}: exit code: {exit_code}{}", logs_suffix(.logs))]
    NonZeroExit {
        op: String,
        exit_code: i64,
        /// Recent container logs, attached by the diagnostic inspector.
        logs: Option<String>,
    },

    /// Inspecting an exec session or container failed.
    #[error("{op}: {reason}")]
    Inspection { op: String, reason: String },

    /// The caller's cancellation signal fired before the operation finished.
    #[error("{op}: cancelled")]
    Cancelled { op: String },

    /// The health probe itself could not run (probe exit code above 1).
    #[error("{op}: health check failed. Code: {exit_code}, Output: {output}")]
    ProbeExecution {
        op: String,
        exit_code: i64,
        output: String,
    },

    /// The runtime declared the container unhealthy.
    #[error(
        "{op}: container health check failed. The maximum number of attempts has reached: {}{}",
        retries_label(.retries),
        probe_suffix(.last_exit_code, .last_output)
    )]
    Unhealthy {
        op: String,
        retries: Option<i64>,
        last_exit_code: Option<i64>,
        last_output: Option<String>,
    },

    /// Container logs could not be fetched or read.
    #[error("{op}: {reason}")]
    LogFetch { op: String, reason: String },

    /// A frame on the multiplexed stream was malformed.
    #[error("malformed stream frame: {0}")]
    Protocol(String),

    #[error("configuration error: {0}")]
    Config(String),

    /// The runtime API client reported an error.
    #[error("runtime error: {0}")]
    Runtime(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl DbcellError {
    pub fn creation(op: impl Into<String>, reason: impl ToString) -> Self {
        Self::Creation {
            op: op.into(),
            reason: reason.to_string(),
        }
    }

    pub fn attach(op: impl Into<String>, reason: impl ToString) -> Self {
        Self::Attach {
            op: op.into(),
            reason: reason.to_string(),
        }
    }

    pub fn demux(op: impl Into<String>, reason: impl ToString) -> Self {
        Self::Demux {
            op: op.into(),
            reason: reason.to_string(),
        }
    }

    pub fn inspection(op: impl Into<String>, reason: impl ToString) -> Self {
        Self::Inspection {
            op: op.into(),
            reason: reason.to_string(),
        }
    }

    pub fn log_fetch(op: impl Into<String>, reason: impl ToString) -> Self {
        Self::LogFetch {
            op: op.into(),
            reason: reason.to_string(),
        }
    }

    pub fn cancelled(op: impl Into<String>) -> Self {
        Self::Cancelled { op: op.into() }
    }

    /// True when the caller gave up waiting, as opposed to a confirmed failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Exit code reported by the command or the last health probe, if any.
    pub fn exit_code(&self) -> Option<i64> {
        match self {
            Self::NonZeroExit { exit_code, .. } | Self::ProbeExecution { exit_code, .. } => {
                Some(*exit_code)
            }
            Self::Unhealthy { last_exit_code, .. } => *last_exit_code,
            _ => None,
        }
    }
}

fn logs_suffix(logs: &Option<String>) -> String {
    match logs {
        Some(logs) => format!(".\nContainer logs:\n{}", logs),
        None => String::new(),
    }
}

fn retries_label(retries: &Option<i64>) -> String {
    match retries {
        Some(n) => n.to_string(),
        None => "unknown".to_string(),
    }
}

fn probe_suffix(exit_code: &Option<i64>, output: &Option<String>) -> String {
    match (exit_code, output) {
        (Some(code), Some(output)) => format!(". Last probe code: {}, Output: {}", code, output),
        (Some(code), None) => format!(". Last probe code: {}", code),
        _ => String::new(),
    }
}
