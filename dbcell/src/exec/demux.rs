//! Stream demultiplexer.
//!
//! Splits a multiplexed exec stream into its stdout and stderr channels.
//! Order is preserved within each channel only; the interleaving between the
//! two is not reconstructible and is not needed by any consumer.

use dbcell_shared::errors::{DbcellError, DbcellResult};
use dbcell_shared::frame::{FrameHeader, HEADER_LEN, StreamKind};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Both channels of a fully drained stream.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DemuxOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Drain `stream` into memory.
///
/// Takes the stream by value so it can run as a detached task that owns (and
/// on completion or abort, releases) the connection.
pub async fn demux<R>(mut stream: R) -> DbcellResult<DemuxOutput>
where
    R: AsyncRead + Unpin,
{
    let mut output = DemuxOutput::default();
    demux_into(&mut stream, &mut output.stdout, &mut output.stderr).await?;
    Ok(output)
}

/// Copy frames from `reader` into the two sinks until end of input.
///
/// Returns the number of payload bytes written. A stream that ends in the
/// middle of a frame is treated as ended; whatever payload bytes of that frame
/// arrived are kept.
pub async fn demux_into<R, O, E>(reader: &mut R, stdout: &mut O, stderr: &mut E) -> DbcellResult<u64>
where
    R: AsyncRead + Unpin,
    O: AsyncWrite + Unpin,
    E: AsyncWrite + Unpin,
{
    let mut written = 0u64;

    loop {
        let header = match read_header(reader).await? {
            HeaderRead::Frame(header) => header,
            HeaderRead::Eof => break,
            HeaderRead::Truncated(got) => {
                tracing::warn!(bytes = got, "Stream ended inside a frame header");
                break;
            }
        };

        let want = u64::from(header.len);
        let mut payload = (&mut *reader).take(want);
        let copied = match header.kind {
            StreamKind::Stdin | StreamKind::Stdout => {
                tokio::io::copy(&mut payload, stdout).await
            }
            StreamKind::Stderr => tokio::io::copy(&mut payload, stderr).await,
            StreamKind::SystemErr => {
                let mut message = Vec::new();
                payload.read_to_end(&mut message).await.map_err(io_err)?;
                return Err(DbcellError::Runtime(format!(
                    "runtime reported an error on the stream: {}",
                    String::from_utf8_lossy(&message).trim()
                )));
            }
        }
        .map_err(io_err)?;

        written += copied;
        if copied < want {
            tracing::warn!(
                expected = want,
                received = copied,
                "Stream ended inside a frame payload"
            );
            break;
        }
    }

    stdout.flush().await.map_err(io_err)?;
    stderr.flush().await.map_err(io_err)?;
    Ok(written)
}

enum HeaderRead {
    Frame(FrameHeader),
    Eof,
    Truncated(usize),
}

async fn read_header<R>(reader: &mut R) -> DbcellResult<HeaderRead>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; HEADER_LEN];
    let mut filled = 0;

    while filled < HEADER_LEN {
        let n = reader.read(&mut buf[filled..]).await.map_err(io_err)?;
        if n == 0 {
            return Ok(if filled == 0 {
                HeaderRead::Eof
            } else {
                HeaderRead::Truncated(filled)
            });
        }
        filled += n;
    }

    FrameHeader::parse(&buf).map(HeaderRead::Frame)
}

fn io_err(e: std::io::Error) -> DbcellError {
    DbcellError::Runtime(format!("stream read failed: {}", e))
}
