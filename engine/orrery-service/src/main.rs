//! Orrery service
//!
//! Loads the body catalog, starts the tick loop and the WebSocket gateway, and shuts both down
//! gracefully on Ctrl+C or SIGTERM.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use orrery_service::{
    graceful_shutdown, initialize_logging, install_metrics_exporter, load_configuration,
    setup_signal_handlers, ServiceState,
};

#[derive(Debug, Parser)]
#[command(name = "orrery", version, about = "Real-time solar-system simulation server")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Body catalog, overriding `service.catalog_path`
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Gateway port, overriding `gateway.port`
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_configuration(cli.config.as_deref())?;
    if let Some(catalog) = cli.catalog {
        config.service.catalog_path = catalog;
    }
    if let Some(port) = cli.port {
        config.gateway.port = port;
    }

    initialize_logging(&config.logging)?;
    info!("Starting Orrery v{}", env!("CARGO_PKG_VERSION"));

    install_metrics_exporter(&config.metrics)?;

    let service_state =
        Arc::new(ServiceState::new(config).await.context("Failed to initialize service")?);

    let mut shutdown_signal = setup_signal_handlers()?;
    info!("Signal handlers configured");

    let coordinator_handle = {
        let state = Arc::clone(&service_state);
        tokio::spawn(async move {
            if let Err(e) = state.start_coordinator().await {
                error!("SyncCoordinator failed: {:#}", e);
            }
        })
    };

    let gateway_handle = {
        let state = Arc::clone(&service_state);
        tokio::spawn(async move {
            if let Err(e) = state.start_gateway().await {
                error!("SimGateway failed: {:#}", e);
            }
        })
    };

    info!("Orrery is running. Press Ctrl+C to shutdown gracefully.");
    let _ = shutdown_signal.recv().await;

    info!("Shutdown signal received. Initiating graceful shutdown...");
    graceful_shutdown(service_state, coordinator_handle, gateway_handle).await?;

    info!("Orrery shutdown complete");
    Ok(())
}
