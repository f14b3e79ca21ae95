//! Error types for SimulationClock

use thiserror::Error;

/// Errors that can occur in the SimulationClock
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClockError {
    #[error("Invalid time multiplier {0}: must be a finite number greater than zero")]
    InvalidMultiplier(f64),

    #[error("Configuration error: {0}")]
    Config(String),
}
