//! Types shared across dbcell crates.
//!
//! - `errors`: the error taxonomy every dbcell operation reports through
//! - `frame`: the multiplexed stdout/stderr wire framing used by exec attach

pub mod errors;
pub mod frame;

pub use errors::{DbcellError, DbcellResult};
pub use frame::{FrameHeader, HEADER_LEN, StreamKind, encode_frame};
