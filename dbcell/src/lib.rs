//! dbcell - run and supervise database processes inside containers.
//!
//! The crate wraps a container runtime (Docker by default) with the pieces a
//! database manager needs: executing commands and collecting their output,
//! waiting for a container's health check to pass, and working out which
//! mounts expose a data directory when the manager itself is containerized.

pub mod constants;
pub mod exec;
pub mod health;
pub mod logging;
pub mod mounts;
pub mod options;
pub mod runtime;
pub mod supervisor;

#[cfg(test)]
mod testing;

pub use dbcell_shared::errors::{DbcellError, DbcellResult};
pub use exec::{ExecGateway, ExecOutcome, ExecSpec};
pub use health::ReadinessPoller;
pub use logging::init_logging;
pub use mounts::{HostEnvironment, MountResolver, MountSpec, VirtualizationRole};
pub use options::{DockerOptions, LoggingOptions, SupervisorOptions};
pub use runtime::{ContainerRef, ContainerRuntime, DockerRuntime, SharedRuntime};
pub use supervisor::ContainerSupervisor;
