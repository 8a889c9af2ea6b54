//! Harness configuration
//!
//! Budgets and constants for the cycle drivers, loadable from a JSON file.
//! Defaults mirror the constants the procedures were written against:
//! ten iterations and a 10 ms advertising hold.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Settings shared by both test roles and the harness runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Number of enable/operate/disable cycles per role
    pub iterations: usize,
    /// How long the advertiser holds each advertising session
    pub adv_hold: Duration,
    /// Wakeup period for waits and the watchdog
    pub tick: Duration,
    /// Budget for one wait on the completion flag
    pub wait_budget: Duration,
    /// Budget for a whole test instance before the watchdog fails it
    pub watchdog_budget: Duration,
    /// Name the simulated devices advertise under
    pub device_name: String,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            iterations: 10,
            adv_hold: Duration::from_millis(10),
            tick: Duration::from_millis(50),
            wait_budget: Duration::from_secs(5),
            watchdog_budget: Duration::from_secs(30),
            device_name: "blecycle-sim".to_string(),
        }
    }
}

impl HarnessConfig {
    /// Load settings from a JSON file and validate them.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Persist settings to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.iterations == 0 {
            return Err(ConfigError::Invalid(
                "iterations must be at least 1".to_string(),
            ));
        }
        if self.tick.is_zero() {
            return Err(ConfigError::Invalid("tick must be non-zero".to_string()));
        }
        if self.wait_budget < self.tick {
            return Err(ConfigError::Invalid(
                "wait_budget must be at least one tick".to_string(),
            ));
        }
        Ok(())
    }
}
