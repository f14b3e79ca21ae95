//! # SimulationClock
//!
//! The authoritative simulated time for the Orrery engine.
//!
//! The clock holds one absolute UTC instant, a rate multiplier and a pause flag behind a single
//! lock. It never advances on its own: the sync coordinator calls [`SimulationClock::advance`]
//! once per tick with the real time that tick represents, and applies queued viewer commands
//! between ticks so rate and pause changes land on tick boundaries.

pub mod clock;
pub mod config;
pub mod error;

#[cfg(test)]
mod tests;

pub use clock::{ClockSnapshot, SimulationClock};
pub use config::ClockConfig;
pub use error::ClockError;

/// Current version of the SimulationClock
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default lower bound for the time multiplier
pub const DEFAULT_MIN_MULTIPLIER: f64 = 0.1;

/// Default upper bound for the time multiplier
pub const DEFAULT_MAX_MULTIPLIER: f64 = 10_000.0;

/// Default multiplier: simulated time runs at wall-clock speed
pub const DEFAULT_INITIAL_MULTIPLIER: f64 = 1.0;
