//! # SyncCoordinator
//!
//! Keeps every connected viewer on the same simulated instant.
//!
//! The coordinator owns the tick loop. Each tick drains the control commands viewers submitted
//! since the last one, applies them to the [`SimulationClock`](simulation_clock::SimulationClock)
//! in arrival order, advances the clock by one tick period, solves the body catalog at the new
//! instant and fans the resulting [`PositionSnapshot`] out through the [`SessionRegistry`].
//!
//! Delivery never waits on a viewer. Every session has a bounded queue; a viewer that stops
//! draining it is dropped rather than allowed to stall the loop.

pub mod commands;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod metrics;
pub mod registry;
pub mod snapshot;


pub use commands::ControlCommand;
pub use config::CoordinatorConfig;
pub use coordinator::{SyncCoordinator, TickReport};
pub use error::{CommandError, CoordinatorError, SessionDeliveryError};
pub use events::{ServerEvent, StateSync};
pub use metrics::{CoordinatorMetrics, MetricsCollector};
pub use registry::{BroadcastReport, SessionHandle, SessionId, SessionRegistry};
pub use snapshot::PositionSnapshot;

/// Default tick period (200ms = 5Hz)
pub const DEFAULT_TICK_PERIOD_MS: u64 = 200;

/// Default per-session delivery queue capacity
pub const DEFAULT_SESSION_QUEUE_CAPACITY: usize = 64;

/// Default capacity of the pending command queue
pub const DEFAULT_COMMAND_QUEUE_CAPACITY: usize = 256;

/// Default metrics emission interval
pub const DEFAULT_METRICS_INTERVAL_MS: u64 = 5000;
