//! Command execution inside running containers.
//!
//! ```text
//! ExecGateway::execute
//!   ├─ runtime.exec_create      (ExecSpec → ExecHandle)
//!   ├─ runtime.exec_attach      (multiplexed stream)
//!   ├─ demux task  ─────────────┐ spawned, owns the stream
//!   ├─ select: demux done | cancellation
//!   └─ ResultInspector          (stderr, exit code, optional log tail)
//! ```

mod demux;
mod gateway;
mod inspector;
mod spec;

pub use demux::{DemuxOutput, demux, demux_into};
pub use gateway::{ExecGateway, ExecOutcome};
pub use inspector::ResultInspector;
pub use spec::ExecSpec;
