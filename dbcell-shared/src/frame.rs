//! Multiplexed stream framing.
//!
//! An attached exec stream carries stdout and stderr over one connection as a
//! sequence of frames:
//!
//! ```text
//! [type: u8][reserved: 3 bytes][length: u32 big-endian][payload: length bytes]
//! ```
//!
//! Frames never overlap. A reader consumes a whole payload before parsing the
//! next header.

use crate::errors::{DbcellError, DbcellResult};
use bytes::{BufMut, Bytes, BytesMut};

/// Size of a frame header in bytes.
pub const HEADER_LEN: usize = 8;

/// Logical channel a frame belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// Echoed stdin. Demultiplexed into stdout.
    Stdin,
    Stdout,
    Stderr,
    /// Runtime-side error report; the payload is the message.
    SystemErr,
}

impl StreamKind {
    pub fn as_byte(self) -> u8 {
        match self {
            StreamKind::Stdin => 0,
            StreamKind::Stdout => 1,
            StreamKind::Stderr => 2,
            StreamKind::SystemErr => 3,
        }
    }
}

impl TryFrom<u8> for StreamKind {
    type Error = DbcellError;

    fn try_from(value: u8) -> DbcellResult<Self> {
        match value {
            0 => Ok(StreamKind::Stdin),
            1 => Ok(StreamKind::Stdout),
            2 => Ok(StreamKind::Stderr),
            3 => Ok(StreamKind::SystemErr),
            other => Err(DbcellError::Protocol(format!(
                "unknown stream type byte {}",
                other
            ))),
        }
    }
}

/// Parsed frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub kind: StreamKind,
    pub len: u32,
}

impl FrameHeader {
    /// Parse a header. Reserved bytes are not validated.
    pub fn parse(buf: &[u8; HEADER_LEN]) -> DbcellResult<Self> {
        let kind = StreamKind::try_from(buf[0])?;
        let len = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
        Ok(Self { kind, len })
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let len = self.len.to_be_bytes();
        [
            self.kind.as_byte(),
            0,
            0,
            0,
            len[0],
            len[1],
            len[2],
            len[3],
        ]
    }
}

/// Encode one complete frame (header followed by payload).
///
/// Payloads longer than `u32::MAX` are split across consecutive frames of the
/// same kind.
pub fn encode_frame(kind: StreamKind, payload: &[u8]) -> Bytes {
    let mut out = BytesMut::with_capacity(HEADER_LEN + payload.len());
    let mut chunks = payload.chunks(u32::MAX as usize).peekable();

    if chunks.peek().is_none() {
        out.put_slice(&FrameHeader { kind, len: 0 }.encode());
        return out.freeze();
    }

    for chunk in chunks {
        let header = FrameHeader {
            kind,
            len: chunk.len() as u32,
        };
        out.put_slice(&header.encode());
        out.put_slice(chunk);
    }
    out.freeze()
}
