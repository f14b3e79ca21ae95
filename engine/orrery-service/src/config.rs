//! Service configuration management

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use sim_gateway::GatewayConfig;
use simulation_clock::ClockConfig;
use sync_coordinator::CoordinatorConfig;

/// Prefix of environment overrides, e.g. `ORRERY__GATEWAY__PORT=9000`
pub const ENV_PREFIX: &str = "ORRERY";
pub const ENV_SEPARATOR: &str = "__";

/// Main service configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub clock: ClockConfig,

    pub coordinator: CoordinatorConfig,

    pub gateway: GatewayConfig,

    /// Service-level configuration
    pub service: ServiceSettings,

    pub logging: LoggingConfig,

    pub metrics: MetricsConfig,
}

/// Service-level settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Body catalog loaded at startup
    pub catalog_path: PathBuf,

    /// Threads in the rayon pool used for large catalogs
    pub solver_threads: usize,

    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` wins when set
    pub level: String,

    /// Log format (json, pretty)
    pub format: String,
}

/// Prometheus exporter configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,

    pub listen_addr: String,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            catalog_path: PathBuf::from("data/solar_system.json"),
            solver_threads: num_cpus::get(),
            shutdown_timeout_secs: 10,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string() }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true, listen_addr: "0.0.0.0:9090".to_string() }
    }
}

impl MetricsConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.listen_addr
            .parse()
            .with_context(|| format!("Invalid metrics listen address: {}", self.listen_addr))
    }
}

/// Load configuration from an optional TOML file layered with `ORRERY__*` environment variables
pub fn load_config(path: Option<&Path>) -> Result<ServiceConfig> {
    let mut builder = Config::builder();

    if let Some(path) = path {
        tracing::debug!(path = %path.display(), "Loading configuration file");
        builder = builder.add_source(File::from(path).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX).separator(ENV_SEPARATOR).try_parsing(true),
    );

    let config: ServiceConfig = builder
        .build()
        .context("Failed to read configuration sources")?
        .try_deserialize()
        .context("Failed to parse configuration")?;

    validate_config(&config)?;
    Ok(config)
}

/// Validate configuration
pub fn validate_config(config: &ServiceConfig) -> Result<()> {
    config.clock.validate().context("Invalid clock configuration")?;
    config.coordinator.validate().context("Invalid coordinator configuration")?;

    config.gateway.server_addr().with_context(|| {
        format!("Invalid gateway address: {}:{}", config.gateway.host, config.gateway.port)
    })?;
    if config.gateway.max_connections == 0 {
        anyhow::bail!("Gateway max_connections must be positive");
    }
    if config.gateway.reply_queue_capacity == 0 {
        anyhow::bail!("Gateway reply_queue_capacity must be positive");
    }

    if config.service.solver_threads == 0 {
        anyhow::bail!("Solver thread count must be positive");
    }

    match config.logging.level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => anyhow::bail!("Invalid log level: {}", config.logging.level),
    }

    match config.logging.format.as_str() {
        "json" | "pretty" => {}
        _ => anyhow::bail!("Invalid log format: {}", config.logging.format),
    }

    if config.metrics.enabled {
        config.metrics.socket_addr()?;
    }

    Ok(())
}

/// Save configuration to a TOML file
pub fn save_config(config: &ServiceConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config).context("Failed to serialize configuration")?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write configuration to {}", path.display()))?;
    Ok(())
}
