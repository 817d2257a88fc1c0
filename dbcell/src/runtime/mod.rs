//! Container runtime API seam.
//!
//! The supervision core never talks to a container engine directly. It is
//! handed an `Arc<dyn ContainerRuntime>` by whoever owns the engine
//! connection, which keeps every operation testable against a fake and lets
//! independent calls share one client.
//!
//! - `types`: runtime-neutral views of exec sessions, containers, mounts
//! - `docker`: [`DockerRuntime`], the bollard-backed implementation

mod docker;
mod types;

pub use docker::DockerRuntime;
pub use types::{
    ContainerDetails, ContainerRef, ExecHandle, ExecStatus, ExecStream, HealthReport,
    HealthStatus, LogStream, MountKind, MountPoint, ProbeResult,
};

use crate::exec::ExecSpec;
use chrono::{DateTime, Utc};
use dbcell_shared::errors::{DbcellError, DbcellResult};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Shared handle to a runtime client.
pub type SharedRuntime = Arc<dyn ContainerRuntime>;

/// Calls the supervision core makes against a container engine.
///
/// Implementations must be safe for concurrent independent use; the core
/// holds no locks around them.
#[async_trait::async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Create an exec session in a running container.
    async fn exec_create(&self, container_id: &str, spec: &ExecSpec) -> DbcellResult<ExecHandle>;

    /// Start the session and attach to its output.
    ///
    /// The returned stream is always in the multiplexed frame format, even
    /// for TTY sessions. Dropping it releases the underlying connection.
    async fn exec_attach(&self, exec: &ExecHandle) -> DbcellResult<ExecStream>;

    /// Start the session without attaching to its output.
    async fn exec_start_detached(&self, exec: &ExecHandle) -> DbcellResult<()>;

    /// Point-in-time state of an exec session.
    async fn exec_inspect(&self, exec: &ExecHandle) -> DbcellResult<ExecStatus>;

    /// Point-in-time state of a container, looked up by id or name.
    async fn container_inspect(&self, container: &str) -> DbcellResult<ContainerDetails>;

    /// Container stdout/stderr written since `since`, as plain bytes.
    async fn container_logs(
        &self,
        container_id: &str,
        since: DateTime<Utc>,
    ) -> DbcellResult<LogStream>;
}

/// Await a runtime call unless `cancel` fires first.
///
/// An already-cancelled token wins without polling `call`. The abandoned call
/// is dropped, which releases whatever connection it held.
pub(crate) async fn cancellable<T, F>(op: &str, cancel: &CancellationToken, call: F) -> DbcellResult<T>
where
    F: Future<Output = DbcellResult<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(DbcellError::cancelled(op)),
        result = call => result,
    }
}
