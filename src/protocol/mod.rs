//! Relay wire protocol.
//!
//! Both directions of a relay connection carry newline-delimited UTF-8
//! text frames of the form `TAG` or `TAG:payload`. The coordinator sends
//! [`Command`]s; agents answer with [`Report`]s.
//!
//! - `codec`: newline framing with a bounded line length.
//! - `frame`: the tag tables and the tagged-variant encode/decode step.
//! - `writer`: per-connection task draining an outbound frame queue.

pub mod codec;
pub mod frame;
pub mod writer;

pub use frame::{Command, CommandKind, Decoded, Frame, FrameKind, Report, ReportKind};
