#![forbid(unsafe_code)]

//! Line-oriented TCP relay between an operator console and remote agents.

pub mod agent;
pub mod config;
pub mod coordinator;
pub mod errors;
pub mod protocol;

pub use config::RelayConfig;
pub use errors::{AppError, Result};
