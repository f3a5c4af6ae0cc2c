//! Outbound frame writer task.
//!
//! Each relay connection owns one writer task. Callers never touch the
//! socket directly: they push [`Frame`]s onto a bounded [`mpsc`] queue and
//! the task encodes and writes them in order. Dropping the write half when
//! the task ends shuts down the sending side of the connection.

use futures_util::SinkExt;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio_util::codec::FramedWrite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::protocol::codec::FrameCodec;
use crate::protocol::frame::{Frame, FrameKind};
use crate::{AppError, Result};

/// Writer task: drains `frame_rx` onto `writer` until cancelled or closed.
///
/// Exits cleanly when `cancel` fires or when every sender is dropped.
///
/// # Errors
///
/// Returns [`AppError::Transport`]`("write failed: …")` when the underlying
/// stream rejects a write (for example, the peer reset the connection).
pub async fn run_writer<W, K>(
    conn: String,
    writer: W,
    mut frame_rx: mpsc::Receiver<Frame<K>>,
    cancel: CancellationToken,
) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
    K: FrameKind,
{
    let mut framed = FramedWrite::new(writer, FrameCodec::new());

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!(conn, "frame writer: cancellation received, stopping");
                break;
            }

            frame = frame_rx.recv() => {
                let Some(frame) = frame else {
                    debug!(conn, "frame writer: queue closed, stopping");
                    break;
                };

                framed.send(frame.encode()).await.map_err(|e| {
                    warn!(conn, error = %e, "frame writer: write failed");
                    AppError::Transport(format!("write failed: {e}"))
                })?;
            }
        }
    }

    Ok(())
}
