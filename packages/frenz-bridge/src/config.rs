use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Credentials delivered by the parent as the first control line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub device_id: String,
    pub product_key: String,
}

impl BridgeConfig {
    /// Parse one control line (`{"device_id":"...","product_key":"..."}`).
    ///
    /// Unknown fields are ignored; both known fields must be present and non-blank.
    pub fn from_line(line: &str) -> ConfigResult<Self> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::Empty);
        }

        let config: BridgeConfig =
            serde_json::from_str(trimmed).map_err(|e| ConfigError::Invalid(e.to_string()))?;

        if config.device_id.trim().is_empty() {
            return Err(ConfigError::Invalid("device_id must not be blank".to_string()));
        }
        if config.product_key.trim().is_empty() {
            return Err(ConfigError::Invalid("product_key must not be blank".to_string()));
        }

        Ok(config)
    }
}

/// Timing knobs for the session lifecycle and streaming loop.
#[derive(Debug, Clone)]
pub struct BridgeSettings {
    /// Upper bound on the wait for the first raw EEG row.
    pub data_timeout: Duration,
    /// Interval between readiness checks while waiting for data.
    pub data_poll_interval: Duration,
    /// Minimum spacing between periodic `streaming` status lines.
    pub heartbeat_interval: Duration,
    /// Pause between streaming iterations.
    pub poll_interval: Duration,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            data_timeout: Duration::from_secs(30),
            data_poll_interval: Duration::from_millis(500),
            heartbeat_interval: Duration::from_secs(5),
            poll_interval: Duration::from_millis(8),
        }
    }
}

impl BridgeSettings {
    // Waits must observe cancellation at least once a second.
    const MAX_WAIT_SLICE: Duration = Duration::from_secs(1);
    // The streaming pause only avoids busy-spinning.
    const MAX_LOOP_PAUSE: Duration = Duration::from_millis(19);

    /// Clamp user supplied intervals into the ranges the lifecycle relies on.
    pub fn normalized(mut self) -> Self {
        self.data_poll_interval = self
            .data_poll_interval
            .clamp(Duration::from_millis(1), Self::MAX_WAIT_SLICE);
        self.poll_interval = self.poll_interval.min(Self::MAX_LOOP_PAUSE);
        self
    }
}
