//! Coordinator-side view of one live agent connection.
//!
//! A [`Session`] never owns the socket halves: the read half belongs to the
//! session's receive loop and the write half to its writer task. The
//! session keeps the sending end of the writer queue, the cancellation
//! token both tasks watch, and a little metadata for listings.

use std::fmt::{Display, Formatter};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::protocol::Command;
use crate::{AppError, Result};

/// Identity the coordinator assigns to a connected agent (`Device_<n>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(String);

impl DeviceId {
    /// Wrap an identity typed by the operator or read from a listing.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Identity for the `seq`-th registration.
    #[must_use]
    pub fn from_seq(seq: u64) -> Self {
        Self(format!("Device_{seq}"))
    }

    /// Borrow the identity text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for DeviceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

#[derive(Debug)]
struct SessionMeta {
    label: Option<String>,
    last_seen: DateTime<Utc>,
}

/// One registered agent connection.
#[derive(Debug)]
pub struct Session {
    id: DeviceId,
    seq: u64,
    peer: SocketAddr,
    connected_at: DateTime<Utc>,
    outbound: mpsc::Sender<Command>,
    alive: AtomicBool,
    cancel: CancellationToken,
    meta: Mutex<SessionMeta>,
}

impl Session {
    pub(crate) fn new(seq: u64, peer: SocketAddr, outbound: mpsc::Sender<Command>) -> Self {
        let now = Utc::now();
        Self {
            id: DeviceId::from_seq(seq),
            seq,
            peer,
            connected_at: now,
            outbound,
            alive: AtomicBool::new(true),
            cancel: CancellationToken::new(),
            meta: Mutex::new(SessionMeta {
                label: None,
                last_seen: now,
            }),
        }
    }

    /// Assigned identity.
    #[must_use]
    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    /// Registration sequence number; listings sort on it.
    #[must_use]
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Remote address of the agent.
    #[must_use]
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// When the connection was accepted.
    #[must_use]
    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Label announced by the agent in `DEVICE_CONNECTED`, if received yet.
    #[must_use]
    pub fn label(&self) -> Option<String> {
        self.meta().label.clone()
    }

    /// Time of the most recent recognised report.
    #[must_use]
    pub fn last_seen(&self) -> DateTime<Utc> {
        self.meta().last_seen
    }

    /// Record the label announced by the agent.
    pub fn set_label(&self, label: impl Into<String>) {
        self.meta().label = Some(label.into());
    }

    /// Refresh the last-seen time.
    pub fn touch(&self) {
        self.meta().last_seen = Utc::now();
    }

    /// Whether the session is still live.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// A clone of the token the session's tasks watch.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Close the session: flip liveness and cancel its tasks.
    ///
    /// Returns `true` only for the call that performed the transition;
    /// later calls are no-ops.
    pub fn disconnect(&self) -> bool {
        let was_alive = self.alive.swap(false, Ordering::SeqCst);
        self.cancel.cancel();
        if was_alive {
            debug!(device_id = %self.id, "session marked closed");
        }
        was_alive
    }

    /// Queue `command` for delivery without waiting for the write.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transport`] when the session is closed or its
    /// outbound queue is full.
    pub fn send(&self, command: Command) -> Result<()> {
        if !self.is_alive() {
            return Err(AppError::Transport(format!("session {} is closed", self.id)));
        }

        self.outbound.try_send(command).map_err(|err| match err {
            TrySendError::Full(_) => {
                AppError::Transport(format!("outbound queue full for {}", self.id))
            }
            TrySendError::Closed(_) => {
                AppError::Transport(format!("session {} is closed", self.id))
            }
        })
    }

    fn meta(&self) -> MutexGuard<'_, SessionMeta> {
        self.meta.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
