//! Relay configuration parsing and validation.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::{AppError, Result};

fn default_bind_addr() -> String {
    "0.0.0.0:8080".into()
}

fn default_queue_capacity() -> usize {
    64
}

fn default_server_addr() -> String {
    "127.0.0.1:8080".into()
}

fn default_label() -> String {
    "Android Device".into()
}

fn default_heartbeat_seconds() -> u64 {
    30
}

fn default_model() -> String {
    "Pixel 7".into()
}

fn default_os_release() -> String {
    "14".into()
}

/// Coordinator-side settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct CoordinatorConfig {
    /// Listen address in `host:port` form.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Capacity of each session's outbound frame queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// Agent-side settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct AgentConfig {
    /// Coordinator address in `host:port` form.
    #[serde(default = "default_server_addr")]
    pub server_addr: String,
    /// Label announced in `DEVICE_CONNECTED` and heartbeat frames.
    #[serde(default = "default_label")]
    pub label: String,
    /// Heartbeat interval; 0 disables heartbeats.
    #[serde(default = "default_heartbeat_seconds")]
    pub heartbeat_seconds: u64,
    /// Device model reported by the simulated device-info producer.
    #[serde(default = "default_model")]
    pub model: String,
    /// OS release reported by the simulated device-info producer.
    #[serde(default = "default_os_release")]
    pub os_release: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            server_addr: default_server_addr(),
            label: default_label(),
            heartbeat_seconds: default_heartbeat_seconds(),
            model: default_model(),
            os_release: default_os_release(),
        }
    }
}

/// Top-level configuration parsed from `relay.toml`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct RelayConfig {
    /// Coordinator settings.
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
    /// Agent settings.
    #[serde(default)]
    pub agent: AgentConfig,
}

impl RelayConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Re-run validation after CLI overrides have been applied.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.coordinator.queue_capacity == 0 {
            return Err(AppError::Config(
                "queue_capacity must be greater than zero".into(),
            ));
        }

        validate_host_port("bind_addr", &self.coordinator.bind_addr)?;
        validate_host_port("server_addr", &self.agent.server_addr)?;

        if self.agent.label.trim().is_empty() {
            return Err(AppError::Config("label must not be empty".into()));
        }

        Ok(())
    }
}

/// Check that `value` looks like `host:port` with a numeric port.
///
/// Host names are resolved at bind/connect time, so only the shape is
/// checked here.
fn validate_host_port(field: &str, value: &str) -> Result<()> {
    let Some((host, port)) = value.rsplit_once(':') else {
        return Err(AppError::Config(format!(
            "{field} must be of the form host:port, got '{value}'"
        )));
    };

    if host.is_empty() {
        return Err(AppError::Config(format!("{field} has an empty host")));
    }

    port.parse::<u16>()
        .map_err(|err| AppError::Config(format!("{field} has an invalid port '{port}': {err}")))?;

    Ok(())
}
