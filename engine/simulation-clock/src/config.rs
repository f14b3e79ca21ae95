//! Configuration for SimulationClock

use crate::error::ClockError;
use crate::{DEFAULT_INITIAL_MULTIPLIER, DEFAULT_MAX_MULTIPLIER, DEFAULT_MIN_MULTIPLIER};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Configuration for the SimulationClock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Smallest accepted multiplier; lower requests are clamped up (default: 0.1)
    pub min_multiplier: f64,

    /// Largest accepted multiplier; higher requests are clamped down (default: 10000)
    pub max_multiplier: f64,

    /// Multiplier at startup
    pub initial_multiplier: f64,

    /// Whether the clock starts paused (default: true)
    pub start_paused: bool,

    /// Simulated time at startup, process start instant when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            min_multiplier: DEFAULT_MIN_MULTIPLIER,
            max_multiplier: DEFAULT_MAX_MULTIPLIER,
            initial_multiplier: DEFAULT_INITIAL_MULTIPLIER,
            start_paused: true,
            start_time: None,
        }
    }
}

impl ClockConfig {
    /// Check the multiplier bounds
    pub fn validate(&self) -> Result<(), ClockError> {
        if !self.min_multiplier.is_finite() || !self.max_multiplier.is_finite() {
            return Err(ClockError::Config("multiplier bounds must be finite".to_string()));
        }

        if self.min_multiplier <= 0.0 {
            return Err(ClockError::Config(format!(
                "min_multiplier must be positive, got {}",
                self.min_multiplier
            )));
        }

        if self.min_multiplier > self.max_multiplier {
            return Err(ClockError::Config(format!(
                "min_multiplier {} exceeds max_multiplier {}",
                self.min_multiplier, self.max_multiplier
            )));
        }

        if !self.initial_multiplier.is_finite() || self.initial_multiplier <= 0.0 {
            return Err(ClockError::Config(format!(
                "initial_multiplier must be a positive finite number, got {}",
                self.initial_multiplier
            )));
        }

        Ok(())
    }

    /// Clamp a multiplier into the configured range
    pub fn clamp(&self, multiplier: f64) -> f64 {
        multiplier.clamp(self.min_multiplier, self.max_multiplier)
    }

    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: ClockConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file(&self, path: &str) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
