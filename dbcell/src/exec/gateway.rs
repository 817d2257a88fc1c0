//! Exec Gateway: one exec session in, one outcome out.

use super::demux::{DemuxOutput, demux};
use super::inspector::ResultInspector;
use super::spec::ExecSpec;
use crate::constants::ops;
use crate::options::SupervisorOptions;
use crate::runtime::{ContainerRef, ExecHandle, SharedRuntime, cancellable};
use dbcell_shared::errors::{DbcellError, DbcellResult};
use std::borrow::Cow;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Result of a successful exec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutcome {
    /// Stdout with surrounding whitespace trimmed.
    pub stdout: Vec<u8>,
    pub exit_code: i64,
}

impl ExecOutcome {
    pub fn stdout_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stdout)
    }
}

/// How a non-zero exit is reported.
#[derive(Debug, Clone, Copy)]
enum Escalation {
    ExitCode,
    RecentLogs,
}

/// Runs commands in containers through an injected runtime client.
///
/// Holds no per-call state; every call creates and discards its own exec
/// session.
#[derive(Clone)]
pub struct ExecGateway {
    runtime: SharedRuntime,
    inspector: ResultInspector,
    options: SupervisorOptions,
}

impl ExecGateway {
    pub fn new(runtime: SharedRuntime, options: SupervisorOptions) -> Self {
        let inspector = ResultInspector::new(runtime.clone(), options.clone());
        Self {
            runtime,
            inspector,
            options,
        }
    }

    pub fn inspector(&self) -> &ResultInspector {
        &self.inspector
    }

    /// Run `spec` and collect its output.
    ///
    /// Any stderr output fails the call regardless of exit code. With empty
    /// stderr, a non-zero exit code fails with [`DbcellError::NonZeroExit`].
    /// If `cancel` fires first, returns [`DbcellError::Cancelled`] at once and
    /// leaves the output reader to wind down on its own.
    pub async fn execute(
        &self,
        container: &ContainerRef,
        spec: ExecSpec,
        cancel: &CancellationToken,
    ) -> DbcellResult<ExecOutcome> {
        self.run_attached(ops::EXEC, container, spec, cancel, Escalation::ExitCode)
            .await
    }

    /// Run a long-lived foreground command, such as the database server.
    ///
    /// Same as [`execute`](Self::execute), except a non-zero exit attaches
    /// the container's recent logs to the error, since such commands usually
    /// send their diagnostics to the container log rather than stderr.
    pub async fn execute_foreground(
        &self,
        container: &ContainerRef,
        spec: ExecSpec,
        cancel: &CancellationToken,
    ) -> DbcellResult<ExecOutcome> {
        self.run_attached(
            ops::EXEC_FOREGROUND,
            container,
            spec,
            cancel,
            Escalation::RecentLogs,
        )
        .await
    }

    /// Start `spec` without attaching to its output, then check its exit code.
    ///
    /// A command still running at inspection time counts as started
    /// successfully.
    pub async fn run_detached(
        &self,
        container: &ContainerRef,
        spec: ExecSpec,
        cancel: &CancellationToken,
    ) -> DbcellResult<()> {
        let op = ops::EXEC_DETACHED;
        let exec = self.create(op, container, &spec, cancel).await?;

        cancellable(op, cancel, async {
            self.runtime
                .exec_start_detached(&exec)
                .await
                .map_err(|e| DbcellError::attach(op, format!("failed to start a command: {}", e)))
        })
        .await?;

        let status = self.inspector.status(op, &exec, cancel).await?;
        if status.running {
            tracing::debug!(exec_id = exec.id(), container = %container, "Command is still running");
            return Ok(());
        }

        match status.exit_code {
            Some(0) | None => Ok(()),
            Some(exit_code) => Err(DbcellError::NonZeroExit {
                op: op.to_string(),
                exit_code,
                logs: None,
            }),
        }
    }

    async fn run_attached(
        &self,
        op: &'static str,
        container: &ContainerRef,
        spec: ExecSpec,
        cancel: &CancellationToken,
        escalation: Escalation,
    ) -> DbcellResult<ExecOutcome> {
        let exec = self.create(op, container, &spec, cancel).await?;

        let stream = cancellable(op, cancel, async {
            self.runtime
                .exec_attach(&exec)
                .await
                .map_err(|e| DbcellError::attach(op, e))
        })
        .await?;

        // The demux task owns the stream; dropping it on any exit path
        // releases the connection.
        let mut task = tokio::spawn(demux(stream));

        let output = tokio::select! {
            joined = &mut task => joined
                .map_err(|e| DbcellError::Internal(format!("demux task failed: {}", e)))?
                .map_err(|e| DbcellError::demux(op, format!("failed to copy output: {}", e)))?,
            _ = cancel.cancelled() => {
                tracing::debug!(exec_id = exec.id(), container = %container, "Exec cancelled, abandoning output reader");
                abandon(task, self.options.demux_cleanup_timeout(), exec.id().to_string());
                return Err(DbcellError::cancelled(op));
            }
        };

        let DemuxOutput { stdout, stderr } = output;
        if !stderr.is_empty() {
            let message = String::from_utf8_lossy(&stderr);
            tracing::debug!(
                exec_id = exec.id(),
                container = %container,
                stdout = %String::from_utf8_lossy(&stdout),
                "Command wrote to stderr"
            );
            return Err(DbcellError::demux(op, message.trim()));
        }

        let exit_code = match escalation {
            Escalation::ExitCode => self.inspector.check_exit(op, &exec, cancel).await,
            Escalation::RecentLogs => {
                self.inspector
                    .check_exit_with_logs(op, container, &exec, cancel)
                    .await
            }
        }
        .inspect_err(|_| {
            tracing::debug!(
                exec_id = exec.id(),
                stdout = %String::from_utf8_lossy(&stdout),
                "Command failed"
            )
        })?;

        Ok(ExecOutcome {
            stdout: stdout.trim_ascii().to_vec(),
            exit_code,
        })
    }

    async fn create(
        &self,
        op: &str,
        container: &ContainerRef,
        spec: &ExecSpec,
        cancel: &CancellationToken,
    ) -> DbcellResult<ExecHandle> {
        spec.validate(op)?;

        let exec = cancellable(op, cancel, async {
            self.runtime
                .exec_create(container.id(), spec)
                .await
                .map_err(|e| DbcellError::creation(op, e))
        })
        .await?;

        tracing::debug!(
            exec_id = exec.id(),
            container = %container,
            command = ?spec.command(),
            user = ?spec.user_name(),
            "Created exec session"
        );
        Ok(exec)
    }
}

/// Let an abandoned demux task finish on its own, aborting it after `grace`.
///
/// Never awaited by the caller.
fn abandon(task: JoinHandle<DbcellResult<DemuxOutput>>, grace: Duration, exec_id: String) {
    let abort = task.abort_handle();
    tokio::spawn(async move {
        if tokio::time::timeout(grace, task).await.is_err() {
            abort.abort();
            tracing::warn!(exec_id = %exec_id, "Output reader still busy after cancellation, aborted");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, FakeRuntime};
    use dbcell_shared::frame::StreamKind;
    use std::sync::Arc;

    fn gateway(runtime: &Arc<FakeRuntime>) -> ExecGateway {
        ExecGateway::new(runtime.clone(), SupervisorOptions::default())
    }

    #[tokio::test]
    async fn test_success_trims_stdout() {
        let runtime = Arc::new(FakeRuntime::new());
        runtime.set_output(&[(StreamKind::Stdout, b"\n  16.2\n\n")]);
        runtime.set_exit_code(0);

        let outcome = gateway(&runtime)
            .execute(
                &ContainerRef::new("c1"),
                ExecSpec::new("cat").arg("PG_VERSION"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.stdout, b"16.2");
        assert_eq!(outcome.stdout_str(), "16.2");
        assert_eq!(outcome.exit_code, 0);
        assert_eq!(runtime.created_commands(), vec![vec!["cat", "PG_VERSION"]]);
    }

    #[tokio::test]
    async fn test_stderr_fails_even_with_zero_exit() {
        let runtime = Arc::new(FakeRuntime::new());
        runtime.set_output(&[(StreamKind::Stdout, b"done"), (StreamKind::Stderr, b"warning: x\n")]);
        runtime.set_exit_code(0);

        let err = gateway(&runtime)
            .execute(&ContainerRef::new("c1"), ExecSpec::new("ls"), &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            DbcellError::Demux { reason, .. } => assert_eq!(reason, "warning: x"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(runtime.exec_inspect_calls(), 0);
    }

    #[tokio::test]
    async fn test_non_zero_exit() {
        let runtime = Arc::new(FakeRuntime::new());
        runtime.set_output(&[(StreamKind::Stdout, b"partial")]);
        runtime.set_exit_code(127);

        let err = gateway(&runtime)
            .execute(&ContainerRef::new("c1"), ExecSpec::new("nope"), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "exec: exit code: 127");
    }

    #[tokio::test]
    async fn test_creation_error() {
        let runtime = Arc::new(FakeRuntime::new());
        runtime.fail_exec_create("container c1 is not running");

        let err = gateway(&runtime)
            .execute(&ContainerRef::new("c1"), ExecSpec::new("ls"), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, DbcellError::Creation { .. }));
        assert!(err.to_string().contains("not running"));
    }

    #[tokio::test]
    async fn test_attach_error() {
        let runtime = Arc::new(FakeRuntime::new());
        runtime.fail_exec_attach("connection refused");

        let err = gateway(&runtime)
            .execute(&ContainerRef::new("c1"), ExecSpec::new("ls"), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, DbcellError::Attach { .. }));
    }

    #[tokio::test]
    async fn test_protocol_error_is_demux_error() {
        let runtime = Arc::new(FakeRuntime::new());
        runtime.set_raw_output(vec![5, 0, 0, 0, 0, 0, 0, 1, b'x']);

        let err = gateway(&runtime)
            .execute(&ContainerRef::new("c1"), ExecSpec::new("ls"), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, DbcellError::Demux { .. }));
    }

    #[tokio::test]
    async fn test_cancel_while_stream_open() {
        let runtime = Arc::new(FakeRuntime::new());
        let (_held_open, reader) = tokio::io::duplex(64);
        runtime.set_stream(reader);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            gateway(&runtime).execute(&ContainerRef::new("c1"), ExecSpec::new("sleep").arg("3600"), &cancel),
        )
        .await
        .expect("execute must return promptly after cancellation");

        assert!(result.unwrap_err().is_cancelled());
        assert_eq!(runtime.exec_inspect_calls(), 0);
    }

    #[tokio::test]
    async fn test_already_cancelled_skips_create() {
        let runtime = Arc::new(FakeRuntime::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = gateway(&runtime)
            .execute(&ContainerRef::new("c1"), ExecSpec::new("ls"), &cancel)
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert!(runtime.created_commands().is_empty());
    }

    #[tokio::test]
    async fn test_foreground_failure_carries_logs() {
        let runtime = Arc::new(FakeRuntime::new());
        runtime.set_exit_code(1);
        runtime.set_logs(Ok(b"FATAL: could not bind IPv4 address".to_vec()));

        let err = gateway(&runtime)
            .execute_foreground(&ContainerRef::new("c1"), ExecSpec::new("postgres"), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("could not bind"));
        assert!(err.to_string().starts_with("exec foreground: exit code: 1"));
    }

    #[tokio::test]
    async fn test_detached_running_is_success() {
        let runtime = Arc::new(FakeRuntime::new());
        runtime.set_exec_status(crate::runtime::ExecStatus {
            running: true,
            exit_code: None,
        });

        gateway(&runtime)
            .run_detached(&ContainerRef::new("c1"), ExecSpec::new("postgres"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(runtime.detached_starts(), 1);
    }

    #[tokio::test]
    async fn test_detached_non_zero_exit() {
        let runtime = Arc::new(FakeRuntime::new());
        runtime.set_exit_code(1);

        let err = gateway(&runtime)
            .run_detached(
                &ContainerRef::new("c1"),
                ExecSpec::new("chown").args(["-R", "postgres", "/data"]),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.exit_code(), Some(1));
    }

    fn cancel_soon() -> CancellationToken {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });
        cancel
    }

    async fn execute_stalled(runtime: &Arc<FakeRuntime>, call: Call) -> DbcellError {
        runtime.stall(call);
        tokio::time::timeout(
            Duration::from_secs(5),
            gateway(runtime).execute(&ContainerRef::new("c1"), ExecSpec::new("ls"), &cancel_soon()),
        )
        .await
        .expect("execute must return promptly after cancellation")
        .unwrap_err()
    }

    #[tokio::test]
    async fn test_cancel_while_create_hangs() {
        let runtime = Arc::new(FakeRuntime::new());
        let err = execute_stalled(&runtime, Call::ExecCreate).await;

        assert!(err.is_cancelled());
        assert!(runtime.created_commands().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_while_attach_hangs() {
        let runtime = Arc::new(FakeRuntime::new());
        let err = execute_stalled(&runtime, Call::ExecAttach).await;

        assert!(err.is_cancelled());
        assert_eq!(runtime.created_commands().len(), 1);
        assert_eq!(runtime.exec_inspect_calls(), 0);
    }

    #[tokio::test]
    async fn test_cancel_while_exec_inspect_hangs() {
        let runtime = Arc::new(FakeRuntime::new());
        runtime.set_output(&[(StreamKind::Stdout, b"done")]);
        let err = execute_stalled(&runtime, Call::ExecInspect).await;

        assert!(err.is_cancelled());
        assert_eq!(err.to_string(), "exec: cancelled");
    }

    #[tokio::test]
    async fn test_foreground_cancel_while_log_read_hangs() {
        let runtime = Arc::new(FakeRuntime::new());
        runtime.set_exit_code(1);
        runtime.stall(Call::ContainerLogs);

        let err = tokio::time::timeout(
            Duration::from_secs(5),
            gateway(&runtime).execute_foreground(
                &ContainerRef::new("c1"),
                ExecSpec::new("postgres"),
                &cancel_soon(),
            ),
        )
        .await
        .expect("execute_foreground must return promptly after cancellation")
        .unwrap_err();

        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_detached_cancel_while_start_hangs() {
        let runtime = Arc::new(FakeRuntime::new());
        runtime.stall(Call::ExecStart);

        let err = tokio::time::timeout(
            Duration::from_secs(5),
            gateway(&runtime).run_detached(&ContainerRef::new("c1"), ExecSpec::new("postgres"), &cancel_soon()),
        )
        .await
        .expect("run_detached must return promptly after cancellation")
        .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(runtime.exec_inspect_calls(), 0);
    }

    #[tokio::test]
    async fn test_detached_cancel_while_inspect_hangs() {
        let runtime = Arc::new(FakeRuntime::new());
        runtime.stall(Call::ExecInspect);

        let err = tokio::time::timeout(
            Duration::from_secs(5),
            gateway(&runtime).run_detached(&ContainerRef::new("c1"), ExecSpec::new("postgres"), &cancel_soon()),
        )
        .await
        .expect("run_detached must return promptly after cancellation")
        .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(runtime.detached_starts(), 1);
    }

    #[tokio::test]
    async fn test_running_after_stream_end_counts_as_success() {
        let runtime = Arc::new(FakeRuntime::new());
        runtime.set_output(&[(StreamKind::Stdout, b"ok\n")]);
        runtime.set_exec_status(crate::runtime::ExecStatus {
            running: true,
            exit_code: None,
        });

        let outcome = gateway(&runtime)
            .execute(&ContainerRef::new("c1"), ExecSpec::new("true"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.exit_code, 0);
        assert_eq!(outcome.stdout_str(), "ok");
    }
}
