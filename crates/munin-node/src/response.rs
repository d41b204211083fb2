//! Writing protocol output to the peer.

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::error::{ServerError, ServerResult, SessionPhase};

/// Terminator appended to every response line.
pub const END_OF_LINE: u8 = b'\n';

/// Joins `lines` into one buffer, each followed by `\n`.
#[must_use]
pub fn encode_lines(lines: &[String]) -> Bytes {
    let len = lines.iter().map(|l| l.len() + 1).sum();
    let mut buf = BytesMut::with_capacity(len);
    for line in lines {
        buf.put_slice(line.as_bytes());
        buf.put_u8(END_OF_LINE);
    }
    buf.freeze()
}

/// Writes `bytes` and flushes, giving up if `cancel` fires first.
///
/// # Errors
///
/// Returns `ServerError::Cancelled` on cancellation and
/// `ServerError::Transport` tagged with `phase` on I/O failure.
pub async fn write_all<W>(
    writer: &mut W,
    bytes: &[u8],
    phase: SessionPhase,
    cancel: &CancellationToken,
) -> ServerResult<()>
where
    W: AsyncWrite + Unpin,
{
    if bytes.is_empty() {
        return Ok(());
    }

    let write = async {
        writer.write_all(bytes).await?;
        writer.flush().await
    };

    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(ServerError::Cancelled),
        written = write => written.map_err(|e| ServerError::transport(phase, e)),
    }
}

/// Writes a command response, one `\n`-terminated line per entry.
///
/// # Errors
///
/// See [`write_all`].
pub async fn write_lines<W>(
    writer: &mut W,
    lines: &[String],
    cancel: &CancellationToken,
) -> ServerResult<()>
where
    W: AsyncWrite + Unpin,
{
    write_all(writer, &encode_lines(lines), SessionPhase::Sending, cancel).await
}
