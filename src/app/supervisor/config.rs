//! Configuration structures for the transfer supervisor

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::supervisor;
use crate::errors::ConfigError;

/// Configuration for the transfer supervisor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Period between progress polls
    #[serde(with = "humantime_serde")]
    pub tick_interval: Duration,
    /// Text of the banner above the gauges
    pub banner: String,
    /// Install OS signal listeners while running
    pub handle_signals: bool,
    /// Request shutdown once every transfer has finished
    pub exit_on_completion: bool,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            tick_interval: supervisor::TICK_INTERVAL,
            banner: supervisor::BANNER_TEXT.to_string(),
            handle_signals: true,
            exit_on_completion: true,
        }
    }
}

impl SupervisorConfig {
    /// Set the polling period
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Enable or disable OS signal listeners
    pub fn with_signal_handling(mut self, enabled: bool) -> Self {
        self.handle_signals = enabled;
        self
    }

    /// Enable or disable shutdown on completion
    pub fn with_exit_on_completion(mut self, enabled: bool) -> Self {
        self.exit_on_completion = enabled;
        self
    }

    /// Set the banner text
    pub fn with_banner(mut self, banner: impl Into<String>) -> Self {
        self.banner = banner.into();
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "supervisor.tick_interval".to_string(),
                value: format!("{:?}", self.tick_interval),
                reason: "Tick interval cannot be zero".to_string(),
            });
        }

        Ok(())
    }
}
