//! Fabricated report payloads.
//!
//! Nothing here reads real device state; every value is a fixed string or
//! comes from configuration.

use chrono::Utc;

use crate::config::AgentConfig;

/// Canned location text.
pub const SIMULATED_LOCATION: &str = "Lat:-6.2088,Lng:106.8456 (Jakarta)";

const SIMULATED_CHATS: &[&str] = &[
    "👤 Mom (2:30 PM): Dinner ready?",
    "👤 Boss (1:15 PM): Meeting at 3 PM",
    "👤 John (12:45 PM): Let's hang out tonight",
    "👤 Sarah (11:20 AM): Did you see my message?",
    "👤 Group Family (10:05 AM): Happy Birthday!",
];

/// Producer of simulated report payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedDevice {
    model: String,
    os_release: String,
}

impl SimulatedDevice {
    /// Device with an explicit model and OS release.
    #[must_use]
    pub fn new(model: impl Into<String>, os_release: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            os_release: os_release.into(),
        }
    }

    /// Device described by the agent configuration.
    #[must_use]
    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(config.model.clone(), config.os_release.clone())
    }

    /// Payload for `LOCATION`.
    #[must_use]
    pub fn location(&self) -> String {
        SIMULATED_LOCATION.to_owned()
    }

    /// Payload for `DEVICE_INFO`.
    #[must_use]
    pub fn device_info(&self) -> String {
        format!(
            "Android {}, Model: {}, Battery: 85%, Storage: 64GB",
            self.os_release, self.model
        )
    }

    /// Payload for `SCREENSHOT`.
    #[must_use]
    pub fn screenshot(&self) -> String {
        format!("Screenshot captured at {}", Utc::now().timestamp_millis())
    }

    /// Payload for `WHATSAPP_CHATS`; one chat per line.
    #[must_use]
    pub fn chats(&self) -> String {
        SIMULATED_CHATS.join("\n")
    }
}
