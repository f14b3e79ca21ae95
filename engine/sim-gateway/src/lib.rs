//! SimGateway - WebSocket API for the Orrery simulation
//!
//! Each connection becomes one coordinator session. Requests use the `{id, method, params}`
//! envelope and are answered with `{id, result}` or `{id, error}`; simulation events are pushed
//! as `{stream, data}` frames in the order the coordinator produced them.

pub mod config;
pub mod error;
pub mod gateway;
pub mod messages;
pub mod websocket_handler;

pub use config::GatewayConfig;
pub use error::{GatewayError, GatewayResult};
pub use gateway::SimGateway;

/// Version of the SimGateway API
pub const VERSION: &str = "0.1.0";

/// Default WebSocket port
pub const DEFAULT_PORT: u16 = 8080;

/// Default maximum connections
pub const DEFAULT_MAX_CONNECTIONS: usize = 1000;

/// Default number of replies queued per connection
pub const DEFAULT_REPLY_QUEUE_CAPACITY: usize = 64;
