//! Per-session receive loop.
//!
//! Reads report frames from one agent connection and forwards recognised
//! reports as [`RelayEvent::Report`]. When the stream ends, fails, or the
//! session is disconnected, the loop closes the session, removes it from
//! the registry and publishes [`RelayEvent::Disconnected`].
//!
//! | Tag                | Effect                                        |
//! |--------------------|-----------------------------------------------|
//! | `DEVICE_CONNECTED` | record label, touch, forward                  |
//! | any other known    | touch, forward                                |
//! | *(unknown)*        | skipped; logged at `DEBUG`                    |

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio_util::codec::FramedRead;
use tracing::{debug, info, warn};

use crate::coordinator::registry::SessionRegistry;
use crate::coordinator::session::Session;
use crate::coordinator::RelayEvent;
use crate::protocol::codec::FrameCodec;
use crate::protocol::{Decoded, Report, ReportKind};

/// Receive loop for one session; returns once the session has ended.
///
/// Exactly one loop may run per session: it owns the read half.
pub async fn run_receive_loop<R>(
    session: Arc<Session>,
    reader: R,
    registry: SessionRegistry,
    events: mpsc::Sender<RelayEvent>,
) where
    R: AsyncRead + Unpin + Send,
{
    let device_id = session.id().clone();
    let cancel = session.cancel_token();
    let mut framed = FramedRead::new(reader, FrameCodec::new());

    let reason = loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!(%device_id, "receive loop: session cancelled");
                break "disconnected by coordinator".to_owned();
            }

            item = framed.next() => {
                match item {
                    None => {
                        debug!(%device_id, "receive loop: EOF detected");
                        break "stream closed".to_owned();
                    }
                    Some(Err(e)) => {
                        warn!(%device_id, error = %e, "receive loop: read failed, stopping");
                        break format!("stream error: {e}");
                    }
                    Some(Ok(line)) => handle_line(&session, &line, &events).await,
                }
            }
        }
    };

    session.disconnect();
    registry.remove(&device_id).await;
    info!(%device_id, peer = %session.peer(), reason, "device disconnected");

    let event = RelayEvent::Disconnected {
        device_id: device_id.clone(),
        reason,
    };
    if events.send(event).await.is_err() {
        debug!(%device_id, "receive loop: event channel closed before disconnect was delivered");
    }
}

async fn handle_line(session: &Session, line: &str, events: &mpsc::Sender<RelayEvent>) {
    let report = match Report::decode(line) {
        Decoded::Frame(report) => report,
        Decoded::Unknown { tag } => {
            debug!(device_id = %session.id(), tag, "receive loop: skipping unknown report tag");
            return;
        }
    };

    session.touch();
    if report.kind() == ReportKind::DeviceConnected {
        let label = report.payload().unwrap_or_default();
        info!(device_id = %session.id(), label, "device identified");
        session.set_label(label);
    }

    let event = RelayEvent::Report {
        device_id: session.id().clone(),
        report,
    };
    if events.send(event).await.is_err() {
        debug!(device_id = %session.id(), "receive loop: event channel closed, report dropped");
    }
}
