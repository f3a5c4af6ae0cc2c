//! Operator command dispatch.
//!
//! Resolves a [`Target`] against the registry and queues one command frame
//! per matching session. A missing target is an ordinary outcome
//! ([`DispatchOutcome::TargetNotFound`]), not an error. Broadcasts work on
//! a registry snapshot; a failed send to one session is recorded and the
//! rest still receive the frame.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use tracing::{debug, warn};

use crate::coordinator::registry::SessionRegistry;
use crate::coordinator::session::DeviceId;
use crate::protocol::{Command, CommandKind};
use crate::AppError;

/// Wildcard target text.
pub const ALL_TARGET: &str = "all";

/// Who a command is addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A single session.
    Device(DeviceId),
    /// Every currently registered session.
    All,
}

impl FromStr for Target {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(AppError::Protocol("target must not be empty".into()));
        }
        if raw.eq_ignore_ascii_case(ALL_TARGET) {
            return Ok(Self::All);
        }
        Ok(Self::Device(DeviceId::new(raw)))
    }
}

impl Display for Target {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Device(id) => write!(f, "{id}"),
            Self::All => f.write_str(ALL_TARGET),
        }
    }
}

/// Result of one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The target resolved; `delivered` were queued, `failed` were not.
    Sent {
        /// Sessions the frame was queued for.
        delivered: Vec<DeviceId>,
        /// Sessions whose send failed, with the reason.
        failed: Vec<(DeviceId, String)>,
    },
    /// The requested identity is not registered; nothing was sent.
    TargetNotFound(DeviceId),
}

impl DispatchOutcome {
    /// Number of sessions the frame was queued for.
    #[must_use]
    pub fn delivered_count(&self) -> usize {
        match self {
            Self::Sent { delivered, .. } => delivered.len(),
            Self::TargetNotFound(_) => 0,
        }
    }
}

/// Sends operator commands through the registry.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: SessionRegistry,
}

impl Dispatcher {
    /// Create a dispatcher over `registry`.
    #[must_use]
    pub fn new(registry: SessionRegistry) -> Self {
        Self { registry }
    }

    /// Build a command from `kind` and `arg`, then dispatch it.
    pub async fn dispatch_kind(
        &self,
        target: &Target,
        kind: CommandKind,
        arg: Option<String>,
    ) -> DispatchOutcome {
        self.dispatch(target, &Command::new(kind, arg)).await
    }

    /// Queue `command` for every session matching `target`.
    pub async fn dispatch(&self, target: &Target, command: &Command) -> DispatchOutcome {
        let sessions = match target {
            Target::Device(device_id) => match self.registry.lookup(device_id).await {
                Some(session) => vec![session],
                None => {
                    debug!(%device_id, kind = ?command.kind(), "dispatch: target not found");
                    return DispatchOutcome::TargetNotFound(device_id.clone());
                }
            },
            Target::All => self
                .registry
                .snapshot()
                .await
                .into_iter()
                .map(|(_, session)| session)
                .collect(),
        };

        let mut delivered = Vec::with_capacity(sessions.len());
        let mut failed = Vec::new();

        for session in sessions {
            if *target == Target::All && !session.is_alive() {
                debug!(device_id = %session.id(), "dispatch: skipping session closed mid-broadcast");
                continue;
            }
            match session.send(command.clone()) {
                Ok(()) => delivered.push(session.id().clone()),
                Err(err) => {
                    warn!(device_id = %session.id(), %err, "dispatch: send failed");
                    failed.push((session.id().clone(), err.to_string()));
                }
            }
        }

        debug!(
            %target,
            kind = ?command.kind(),
            delivered = delivered.len(),
            failed = failed.len(),
            "dispatch complete"
        );

        DispatchOutcome::Sent { delivered, failed }
    }
}
