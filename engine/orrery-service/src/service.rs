//! Service state management and component initialization

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::{MetricsConfig, ServiceConfig};
use orbital_mechanics::BodyCatalog;
use sim_gateway::SimGateway;
use simulation_clock::SimulationClock;
use sync_coordinator::SyncCoordinator;

/// Service state containing all initialized components
pub struct ServiceState {
    pub config: ServiceConfig,

    /// Shared by the coordinator; nothing else mutates it
    pub clock: Arc<SimulationClock>,

    pub coordinator: Arc<SyncCoordinator>,

    pub gateway: Arc<SimGateway>,

    /// Service running state
    pub is_running: Arc<RwLock<bool>>,
}

impl ServiceState {
    /// Load the catalog and build every component. Nothing runs until the start methods are called.
    pub async fn new(config: ServiceConfig) -> Result<Self> {
        info!("Initializing service components...");

        init_solver_pool(config.service.solver_threads);

        let catalog_path = &config.service.catalog_path;
        info!(path = %catalog_path.display(), "Loading body catalog...");
        let catalog = BodyCatalog::load_from_file(catalog_path)
            .await
            .with_context(|| format!("Failed to load body catalog {}", catalog_path.display()))?;
        if catalog.is_empty() {
            warn!("Body catalog has no valid bodies, only the clock will advance");
        }
        info!(
            bodies = catalog.len(),
            rejected = catalog.rejected().len(),
            epoch = %catalog.epoch(),
            "Body catalog loaded"
        );

        let clock = Arc::new(
            SimulationClock::new(config.clock.clone()).context("Failed to create SimulationClock")?,
        );
        let snapshot = clock.snapshot();
        info!(
            time = %snapshot.time,
            multiplier = snapshot.multiplier,
            paused = snapshot.paused,
            "SimulationClock initialized"
        );

        let coordinator = Arc::new(
            SyncCoordinator::new(Arc::clone(&clock), catalog, config.coordinator.clone())
                .context("Failed to create SyncCoordinator")?,
        );

        let gateway = Arc::new(SimGateway::new(config.gateway.clone(), Arc::clone(&coordinator)));

        info!("Service components initialized successfully");
        Ok(Self { config, clock, coordinator, gateway, is_running: Arc::new(RwLock::new(false)) })
    }

    /// Run the tick loop until [`ServiceState::stop_coordinator`] is called
    pub async fn start_coordinator(&self) -> Result<()> {
        info!("Starting SyncCoordinator...");
        *self.is_running.write().await = true;

        let result = self.coordinator.run().await;
        *self.is_running.write().await = false;

        result.context("SyncCoordinator failed")?;
        info!("SyncCoordinator stopped");
        Ok(())
    }

    pub fn stop_coordinator(&self) {
        info!("Stopping SyncCoordinator...");
        self.coordinator.stop();
    }

    /// Serve viewers until [`ServiceState::stop_gateway`] is called
    pub async fn start_gateway(&self) -> Result<()> {
        info!(
            host = %self.config.gateway.host,
            port = self.config.gateway.port,
            "Starting SimGateway..."
        );
        self.gateway.start().await.context("SimGateway failed")
    }

    pub fn stop_gateway(&self) {
        info!("Stopping SimGateway...");
        self.gateway.stop();
    }

    /// Check if the service is running
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    /// Get service health status
    pub async fn health_check(&self) -> ServiceHealth {
        match (self.is_running().await, self.gateway.is_running()) {
            (true, true) => ServiceHealth::Healthy,
            (true, false) | (false, true) => ServiceHealth::Degraded,
            (false, false) => ServiceHealth::Unhealthy,
        }
    }

    /// Final bookkeeping once both loops have exited
    pub async fn shutdown(&self) {
        *self.is_running.write().await = false;

        let metrics = self.coordinator.metrics().get_metrics();
        info!(
            ticks = metrics.total_ticks_processed,
            sessions = metrics.total_sessions_registered,
            commands_applied = metrics.total_commands_applied,
            commands_rejected = metrics.total_commands_rejected,
            final_time = %self.clock.time(),
            "Service shut down"
        );
    }
}

/// Service health status
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceHealth {
    Healthy,
    Unhealthy,
    Degraded,
}

impl ServiceHealth {
    pub fn is_healthy(&self) -> bool {
        matches!(self, ServiceHealth::Healthy)
    }
}

/// Size the global rayon pool used by the catalog for parallel solving
fn init_solver_pool(threads: usize) {
    match rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|index| format!("orrery-solver-{index}"))
        .build_global()
    {
        Ok(()) => info!(threads, "Solver thread pool initialized"),
        Err(e) => warn!(error = %e, "Solver thread pool already initialized"),
    }
}

/// Install the Prometheus exporter. Must be called from within the tokio runtime.
pub fn install_metrics_exporter(config: &MetricsConfig) -> Result<()> {
    if !config.enabled {
        info!("Metrics exporter disabled");
        return Ok(());
    }

    let addr = config.socket_addr()?;
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to install Prometheus exporter")?;

    info!(%addr, "Prometheus exporter listening");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    const CATALOG: &str = r#"{
        "bodies": [
            {"id": 10, "name": "Sun"},
            {"id": 399, "name": "Earth", "parentId": 10,
             "semiMajorAxisKm": 149598023.0, "eccentricity": 0.0167, "inclinationDeg": 0.0,
             "argOfPeriapsisDeg": 102.9, "longAscNodeDeg": 0.0, "meanAnomalyDeg": 358.6,
             "periodDays": 365.256},
            {"id": 301, "name": "Stray", "parentId": 9999,
             "semiMajorAxisKm": 384400.0, "eccentricity": 0.05, "inclinationDeg": 5.1,
             "argOfPeriapsisDeg": 318.1, "longAscNodeDeg": 125.1, "meanAnomalyDeg": 135.3,
             "periodDays": 27.32}
        ]
    }"#;

    fn test_config(dir: &std::path::Path) -> ServiceConfig {
        let catalog_path = dir.join("bodies.json");
        std::fs::write(&catalog_path, CATALOG).unwrap();

        let mut config = ServiceConfig::default();
        config.service.catalog_path = catalog_path;
        config.service.solver_threads = 2;
        config.gateway.host = "127.0.0.1".to_string();
        config.gateway.port = 0;
        config.coordinator.tick_period_ms = 10;
        config.metrics.enabled = false;
        config
    }

    #[tokio::test]
    async fn test_service_builds_components() {
        let dir = tempdir().unwrap();
        let state = ServiceState::new(test_config(dir.path())).await.unwrap();

        assert_eq!(state.coordinator.catalog().len(), 2);
        assert_eq!(state.coordinator.catalog().rejected().len(), 1);
        assert!(state.clock.is_paused());
        assert_eq!(state.health_check().await, ServiceHealth::Unhealthy);
        assert!(!state.is_running().await);
    }

    #[tokio::test]
    async fn test_missing_catalog_fails_startup() {
        let dir = tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.service.catalog_path = dir.path().join("missing.json");

        assert!(ServiceState::new(config).await.is_err());
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let dir = tempdir().unwrap();
        let state = Arc::new(ServiceState::new(test_config(dir.path())).await.unwrap());

        let coordinator_task = {
            let state = Arc::clone(&state);
            tokio::spawn(async move { state.start_coordinator().await })
        };
        let gateway_task = {
            let state = Arc::clone(&state);
            tokio::spawn(async move { state.start_gateway().await })
        };

        for _ in 0..100 {
            if state.health_check().await.is_healthy() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(state.health_check().await, ServiceHealth::Healthy);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(state.coordinator.latest_snapshot().tick > 0);

        state.stop_gateway();
        state.stop_coordinator();
        gateway_task.await.unwrap().unwrap();
        coordinator_task.await.unwrap().unwrap();

        state.shutdown().await;
        assert_eq!(state.health_check().await, ServiceHealth::Unhealthy);
    }

    #[tokio::test]
    async fn test_disabled_metrics_exporter_is_a_no_op() {
        let config = MetricsConfig { enabled: false, listen_addr: "invalid".to_string() };
        assert!(install_metrics_exporter(&config).is_ok());
    }
}
