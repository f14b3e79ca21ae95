//! Error types for the SimGateway

use simulation_clock::ClockError;
use sync_coordinator::CommandError;
use thiserror::Error;

/// Errors that can occur in the SimGateway
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Command rejected: {0}")]
    Command(#[from] CommandError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection error: {0}")]
    Connection(String),
}

impl GatewayError {
    /// Numeric code reported to clients in error responses
    pub fn code(&self) -> u32 {
        match self {
            GatewayError::Serialization(_) => 40000,
            GatewayError::InvalidParams(_) => 40001,
            GatewayError::UnknownMethod(_) => 40400,
            GatewayError::Command(CommandError::Clock(ClockError::InvalidMultiplier(_))) => 42200,
            GatewayError::Command(CommandError::UnknownSession) => 41000,
            GatewayError::Command(CommandError::QueueFull) => 42900,
            _ => 50000,
        }
    }
}

/// Result type for SimGateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;
