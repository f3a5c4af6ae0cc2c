//! Coordinator side of the relay.
//!
//! The acceptor registers every inbound agent connection and spawns a
//! receive loop and a writer task for it. Receive loops publish
//! [`RelayEvent`]s; the interpreter renders them for the operator. The
//! dispatcher sends operator commands to one session or to all of them.

pub mod acceptor;
pub mod console;
pub mod dispatcher;
pub mod interpreter;
pub mod receiver;
pub mod registry;
pub mod session;

use std::net::SocketAddr;

use crate::protocol::Report;

pub use registry::SessionRegistry;
pub use session::{DeviceId, Session};

/// Events published by the acceptor and receive loops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    /// A new agent connection was registered.
    Connected {
        /// Identity assigned to the connection.
        device_id: DeviceId,
        /// Remote address of the agent.
        peer: SocketAddr,
    },
    /// An agent sent a recognised report.
    Report {
        /// Session the report arrived on.
        device_id: DeviceId,
        /// Decoded report.
        report: Report,
    },
    /// A session ended and was removed from the registry.
    Disconnected {
        /// Session that ended.
        device_id: DeviceId,
        /// Human-readable reason.
        reason: String,
    },
}
