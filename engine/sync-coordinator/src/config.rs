//! Configuration for the SyncCoordinator

use crate::error::CoordinatorError;
use crate::{
    DEFAULT_COMMAND_QUEUE_CAPACITY, DEFAULT_METRICS_INTERVAL_MS, DEFAULT_SESSION_QUEUE_CAPACITY,
    DEFAULT_TICK_PERIOD_MS,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the SyncCoordinator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Real time between ticks in milliseconds (default: 200ms)
    pub tick_period_ms: u64,

    /// Events buffered per session before it is considered lagging
    pub session_queue_capacity: usize,

    /// Accepted commands buffered between ticks
    pub command_queue_capacity: usize,

    /// Catalog size at which bodies are solved on the rayon pool
    pub parallel_solve_threshold: usize,

    /// Number of tick durations kept for percentile metrics
    pub metrics_history: usize,

    /// Metrics log interval in milliseconds
    pub metrics_interval_ms: u64,

    /// Ticks slower than this are logged as warnings
    pub max_tick_duration_ms: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: DEFAULT_TICK_PERIOD_MS,
            session_queue_capacity: DEFAULT_SESSION_QUEUE_CAPACITY,
            command_queue_capacity: DEFAULT_COMMAND_QUEUE_CAPACITY,
            parallel_solve_threshold: orbital_mechanics::DEFAULT_PARALLEL_THRESHOLD,
            metrics_history: 1000,
            metrics_interval_ms: DEFAULT_METRICS_INTERVAL_MS,
            max_tick_duration_ms: 50,
        }
    }
}

impl CoordinatorConfig {
    /// Get tick period as Duration
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }

    /// Get metrics interval as Duration
    pub fn metrics_interval(&self) -> Duration {
        Duration::from_millis(self.metrics_interval_ms)
    }

    /// Get max tick duration as Duration
    pub fn max_tick_duration(&self) -> Duration {
        Duration::from_millis(self.max_tick_duration_ms)
    }

    pub fn validate(&self) -> Result<(), CoordinatorError> {
        if self.tick_period_ms == 0 {
            return Err(CoordinatorError::Config("tick_period_ms must be positive".to_string()));
        }
        if self.session_queue_capacity == 0 || self.command_queue_capacity == 0 {
            return Err(CoordinatorError::Config("queue capacities must be positive".to_string()));
        }
        if self.metrics_history == 0 {
            return Err(CoordinatorError::Config("metrics_history must be positive".to_string()));
        }
        Ok(())
    }

    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: CoordinatorConfig = toml::from_str(&content)?;
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
