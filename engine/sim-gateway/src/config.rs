//! Configuration for the SimGateway

use crate::{DEFAULT_MAX_CONNECTIONS, DEFAULT_PORT, DEFAULT_REPLY_QUEUE_CAPACITY};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Configuration for the SimGateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Maximum number of concurrent connections
    pub max_connections: usize,

    /// Replies a connection may have queued before it is closed as too slow
    pub reply_queue_capacity: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            reply_queue_capacity: DEFAULT_REPLY_QUEUE_CAPACITY,
        }
    }
}

impl GatewayConfig {
    /// Get the server address
    pub fn server_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    /// Load configuration from file
    pub fn load_from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: GatewayConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: &str) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_addr() {
        let config = GatewayConfig { host: "127.0.0.1".into(), port: 9001, ..Default::default() };
        assert_eq!(config.server_addr().unwrap().port(), 9001);

        let config = GatewayConfig { host: "not a host".into(), ..Default::default() };
        assert!(config.server_addr().is_err());
    }

    #[test]
    fn test_partial_toml() {
        let config: GatewayConfig = toml::from_str("port = 9100").unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert_eq!(config.reply_queue_capacity, DEFAULT_REPLY_QUEUE_CAPACITY);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.toml");
        let path = path.to_str().unwrap();

        let config = GatewayConfig {
            host: "127.0.0.1".into(),
            port: 9200,
            max_connections: 8,
            reply_queue_capacity: 16,
        };
        config.save_to_file(path).unwrap();
        assert_eq!(GatewayConfig::load_from_file(path).unwrap(), config);

        assert!(GatewayConfig::load_from_file(dir.path().join("missing.toml").to_str().unwrap())
            .is_err());
    }
}
