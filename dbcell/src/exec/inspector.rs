//! Exec result inspection.
//!
//! Two variants share this type: the plain check used for short commands
//! (exit code only) and the diagnostic one used for long-running foreground
//! commands, which attaches a tail of recent container logs to a failure.

use crate::options::SupervisorOptions;
use crate::runtime::{ContainerRef, ExecHandle, ExecStatus, SharedRuntime, cancellable};
use chrono::Utc;
use dbcell_shared::errors::{DbcellError, DbcellResult};
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct ResultInspector {
    runtime: SharedRuntime,
    options: SupervisorOptions,
}

impl ResultInspector {
    pub fn new(runtime: SharedRuntime, options: SupervisorOptions) -> Self {
        Self { runtime, options }
    }

    /// Current state of the exec session.
    pub async fn status(
        &self,
        op: &str,
        exec: &ExecHandle,
        cancel: &CancellationToken,
    ) -> DbcellResult<ExecStatus> {
        cancellable(op, cancel, async {
            self.runtime.exec_inspect(exec).await.map_err(|e| {
                DbcellError::inspection(op, format!("failed to inspect exec {}: {}", exec.id(), e))
            })
        })
        .await
    }

    /// Exit code of the session; fails on non-zero.
    ///
    /// A session that is still running or has not reported a code yet counts
    /// as exit code 0.
    pub async fn check_exit(
        &self,
        op: &str,
        exec: &ExecHandle,
        cancel: &CancellationToken,
    ) -> DbcellResult<i64> {
        let exit_code = self.exit_code(op, exec, cancel).await?;
        if exit_code != 0 {
            return Err(DbcellError::NonZeroExit {
                op: op.to_string(),
                exit_code,
                logs: None,
            });
        }
        Ok(exit_code)
    }

    /// Like [`check_exit`](Self::check_exit), but a non-zero exit carries the
    /// container's recent logs when they can be read.
    ///
    /// Log retrieval failures are logged and the error falls back to the exit
    /// code alone. Cancellation during retrieval is still reported as such.
    pub async fn check_exit_with_logs(
        &self,
        op: &str,
        container: &ContainerRef,
        exec: &ExecHandle,
        cancel: &CancellationToken,
    ) -> DbcellResult<i64> {
        let exit_code = self.exit_code(op, exec, cancel).await?;
        if exit_code == 0 {
            return Ok(exit_code);
        }

        let logs = match self.recent_logs(container, cancel).await {
            Ok(logs) => Some(logs),
            Err(e) if e.is_cancelled() => return Err(DbcellError::cancelled(op)),
            Err(e) => {
                tracing::warn!(
                    container = %container,
                    exit_code,
                    error = %e,
                    "Could not fetch container logs for failed command"
                );
                None
            }
        };

        Err(DbcellError::NonZeroExit {
            op: op.to_string(),
            exit_code,
            logs,
        })
    }

    /// Container output from the configured recent window.
    ///
    /// Returns once the runtime closes the log stream or `cancel` fires.
    pub async fn recent_logs(
        &self,
        container: &ContainerRef,
        cancel: &CancellationToken,
    ) -> DbcellResult<String> {
        use crate::constants::ops::LOGS;

        let window = self.options.recent_logs_window();
        let since = Utc::now() - chrono::Duration::seconds(window.as_secs() as i64);

        let buf = cancellable(LOGS, cancel, async {
            let mut stream = self
                .runtime
                .container_logs(container.id(), since)
                .await
                .map_err(|e| {
                    DbcellError::log_fetch(
                        LOGS,
                        format!("failed to get logs from container {}: {}", container, e),
                    )
                })?;

            let mut buf = Vec::new();
            stream.read_to_end(&mut buf).await.map_err(|e| {
                DbcellError::log_fetch(
                    LOGS,
                    format!("failed to read logs from container {}: {}", container, e),
                )
            })?;
            Ok::<_, DbcellError>(buf)
        })
        .await?;

        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Emit recent container logs at info level. Failures are logged, not
    /// returned.
    pub async fn log_recent_logs(&self, container: &ContainerRef, cancel: &CancellationToken) {
        match self.recent_logs(container, cancel).await {
            Ok(logs) => tracing::info!(container = %container, "Container logs:\n{}", logs),
            Err(e) => tracing::error!(container = %container, error = %e, "Failed to read container logs"),
        }
    }

    async fn exit_code(
        &self,
        op: &str,
        exec: &ExecHandle,
        cancel: &CancellationToken,
    ) -> DbcellResult<i64> {
        let status = self.status(op, exec, cancel).await?;
        match status.exit_code {
            Some(code) if !status.running => Ok(code),
            _ => {
                tracing::debug!(exec_id = exec.id(), "Command is still running");
                Ok(0)
            }
        }
    }
}
