//! Counter configuration: immutable for the lifetime of a counter.

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterConfig {
    /// Number of events within one window that fires a pick.
    #[serde(default = "default_threshold")]
    pub threshold: u32,
    /// Length of the fixed reset window in seconds.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

fn default_threshold() -> u32 {
    4
}

fn default_window_secs() -> u64 {
    5
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            window_secs: default_window_secs(),
        }
    }
}

impl CounterConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threshold == 0 {
            return Err(ConfigError::Invalid(
                "threshold must be at least 1".to_string(),
            ));
        }
        if self.window_secs == 0 {
            return Err(ConfigError::Invalid(
                "window_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
