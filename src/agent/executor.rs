//! Agent-side command executor.
//!
//! Maps each decoded [`Command`] to its local action and, for data
//! requests, to the [`Report`] the agent sends back.
//!
//! | Command              | Local action         | Reply            |
//! |----------------------|----------------------|------------------|
//! | `SHOW_MESSAGE`       | notify message       | none             |
//! | `FAKE_CALL`          | notify incoming call | none             |
//! | `GET_LOCATION`       | notify               | `LOCATION`       |
//! | `GET_DEVICE_INFO`    | notify               | `DEVICE_INFO`    |
//! | `CAPTURE_SCREENSHOT` | notify               | `SCREENSHOT`     |
//! | `GET_WHATSAPP_CHATS` | notify               | `WHATSAPP_CHATS` |

use tracing::debug;

use crate::agent::notifier::Notifier;
use crate::agent::simulated::SimulatedDevice;
use crate::protocol::{Command, CommandKind, Report, ReportKind};

/// Executes commands against a simulated device.
#[derive(Debug)]
pub struct CommandExecutor<N> {
    device: SimulatedDevice,
    notifier: N,
}

impl<N: Notifier> CommandExecutor<N> {
    /// Create an executor.
    pub fn new(device: SimulatedDevice, notifier: N) -> Self {
        Self { device, notifier }
    }

    /// The notifier used for local actions.
    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Perform `command` locally and return the report to send, if any.
    pub fn execute(&self, command: &Command) -> Option<Report> {
        let payload = command.payload().unwrap_or_default();
        debug!(kind = ?command.kind(), "executing command");

        let (kind, text, notice) = match command.kind() {
            CommandKind::ShowMessage => {
                self.notifier.notify(&format!("💬 Server: {payload}"));
                return None;
            }
            CommandKind::FakeCall => {
                self.notifier.notify(&format!("📞 Incoming call: {payload}"));
                return None;
            }
            CommandKind::GetLocation => (
                ReportKind::Location,
                self.device.location(),
                "📍 Location sent to server",
            ),
            CommandKind::GetDeviceInfo => (
                ReportKind::DeviceInfo,
                self.device.device_info(),
                "📊 Device info sent to server",
            ),
            CommandKind::CaptureScreenshot => (
                ReportKind::Screenshot,
                self.device.screenshot(),
                "📸 Screenshot sent to server",
            ),
            CommandKind::GetWhatsappChats => (
                ReportKind::WhatsappChats,
                self.device.chats(),
                "💬 WhatsApp chats sent to server",
            ),
        };

        self.notifier.notify(notice);
        Some(Report::with_payload(kind, text))
    }
}
