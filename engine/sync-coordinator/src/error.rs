//! Error types for the sync coordinator

use simulation_clock::ClockError;
use thiserror::Error;

/// Why an event could not be handed to a session
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionDeliveryError {
    #[error("Session queue is closed")]
    Closed,

    #[error("Session queue is full, consumer is lagging")]
    Lagging,

    #[error("Session is not registered")]
    UnknownSession,
}

/// A control command that was refused. The clock is never touched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    #[error(transparent)]
    Clock(#[from] ClockError),

    #[error("Command queue is full, try again")]
    QueueFull,

    #[error("Command queue is closed")]
    QueueClosed,

    #[error("Session is not registered")]
    UnknownSession,
}

/// Errors from coordinator construction and lifecycle
#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Coordinator is already running")]
    AlreadyRunning,
}
