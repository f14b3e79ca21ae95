//! Core SimulationClock implementation

use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::ClockConfig;
use crate::error::ClockError;

/// Consistent view of the clock's three fields, taken under one lock acquisition
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockSnapshot {
    pub time: DateTime<Utc>,
    pub multiplier: f64,
    pub paused: bool,
}

/// The SimulationClock - single owner of simulated time, rate and pause state
///
/// All three fields sit behind one mutex so readers never observe a torn update. Mutations are
/// applied in lock-acquisition order; the last write wins.
pub struct SimulationClock {
    state: Mutex<ClockSnapshot>,
    config: ClockConfig,
}

impl SimulationClock {
    /// Create a new SimulationClock. Simulated time starts at the configured start time, or now.
    pub fn new(config: ClockConfig) -> Result<Self, ClockError> {
        let start = config.start_time.unwrap_or_else(Utc::now);
        Self::with_start_time(config, start)
    }

    /// Create a new SimulationClock at a specific simulated instant
    pub fn with_start_time(config: ClockConfig, start: DateTime<Utc>) -> Result<Self, ClockError> {
        config.validate()?;

        let snapshot = ClockSnapshot {
            time: start,
            multiplier: config.clamp(config.initial_multiplier),
            paused: config.start_paused,
        };

        tracing::info!(
            time = %snapshot.time,
            multiplier = snapshot.multiplier,
            paused = snapshot.paused,
            "Creating SimulationClock"
        );

        Ok(Self { state: Mutex::new(snapshot), config })
    }

    pub fn config(&self) -> &ClockConfig {
        &self.config
    }

    /// Current `(time, multiplier, paused)` triple
    pub fn snapshot(&self) -> ClockSnapshot {
        *self.state.lock()
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.state.lock().time
    }

    pub fn multiplier(&self) -> f64 {
        self.state.lock().multiplier
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    /// Advance simulated time by `real_elapsed × multiplier` unless paused.
    ///
    /// Returns the state after the advance. An advance that would leave chrono's representable
    /// range leaves the time where it is.
    pub fn advance(&self, real_elapsed: Duration) -> ClockSnapshot {
        let mut state = self.state.lock();
        if state.paused {
            return *state;
        }

        let simulated_us = real_elapsed.as_secs_f64() * state.multiplier * 1e6;
        let delta = chrono::Duration::microseconds(simulated_us.round() as i64);

        match state.time.checked_add_signed(delta) {
            Some(time) => state.time = time,
            None => {
                tracing::warn!(time = %state.time, delta = %delta, "Simulated time would overflow, holding");
            }
        }

        *state
    }

    /// Reject values no clamp can make sense of: NaN, infinities, zero and negatives
    pub fn validate_multiplier(&self, value: f64) -> Result<f64, ClockError> {
        if !value.is_finite() || value <= 0.0 {
            return Err(ClockError::InvalidMultiplier(value));
        }
        Ok(self.config.clamp(value))
    }

    /// Set the multiplier, clamped to the configured bounds. Returns the value applied.
    pub fn set_multiplier(&self, value: f64) -> Result<f64, ClockError> {
        let effective = self.validate_multiplier(value)?;
        self.state.lock().multiplier = effective;

        if effective != value {
            tracing::debug!(requested = value, effective, "Clamped time multiplier");
        }
        Ok(effective)
    }

    pub fn set_paused(&self, paused: bool) {
        self.state.lock().paused = paused;
    }

    /// Jump to an absolute simulated instant
    pub fn set_time(&self, time: DateTime<Utc>) {
        self.state.lock().time = time;
    }
}
