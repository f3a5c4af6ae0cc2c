//! Local notification surface of an agent.
//!
//! The agent tells its own user about received commands and connection
//! changes through a [`Notifier`]. The shipped [`LogNotifier`] writes them
//! to the log; platform front ends plug in their own implementation.

use std::sync::Arc;

use tracing::info;

/// Receives user-facing notifications from the agent.
pub trait Notifier: Send + Sync {
    /// Surface `message` to the agent's user.
    fn notify(&self, message: &str);
}

impl<T: Notifier + ?Sized> Notifier for Arc<T> {
    fn notify(&self, message: &str) {
        (**self).notify(message);
    }
}

/// Notifier that logs every message at `INFO`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str) {
        info!(target: "device_relay::notification", "{message}");
    }
}
