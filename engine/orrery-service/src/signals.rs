//! Signal handling for graceful shutdown

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::service::ServiceState;

/// Resolve the returned receiver on Ctrl+C or SIGTERM, whichever comes first
pub fn setup_signal_handlers() -> Result<mpsc::Receiver<()>> {
    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

    let ctrl_c_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C signal");
            return;
        }

        info!("Ctrl+C signal received");
        let _ = ctrl_c_tx.try_send(());
    });

    #[cfg(unix)]
    {
        use signal_hook::consts::SIGTERM;
        use std::sync::atomic::{AtomicBool, Ordering};

        let term_flag = Arc::new(AtomicBool::new(false));
        signal_hook::flag::register(SIGTERM, Arc::clone(&term_flag))?;

        tokio::spawn(async move {
            while !term_flag.load(Ordering::Relaxed) {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            info!("SIGTERM signal received");
            let _ = shutdown_tx.try_send(());
        });
    }

    Ok(shutdown_rx)
}

/// Stop every component and wait for their tasks, each bounded by the shutdown timeout
pub async fn graceful_shutdown(
    service_state: Arc<ServiceState>,
    coordinator_handle: JoinHandle<()>,
    gateway_handle: JoinHandle<()>,
) -> Result<()> {
    info!("Starting graceful shutdown...");

    // Stop accepting viewers first so no session registers after the queues close
    service_state.stop_gateway();
    service_state.stop_coordinator();

    let shutdown_timeout = Duration::from_secs(service_state.config.service.shutdown_timeout_secs);
    wait_for("SimGateway", gateway_handle, shutdown_timeout).await;
    wait_for("SyncCoordinator", coordinator_handle, shutdown_timeout).await;

    service_state.shutdown().await;
    info!("Graceful shutdown complete");
    Ok(())
}

async fn wait_for(component: &str, handle: JoinHandle<()>, limit: Duration) {
    match timeout(limit, handle).await {
        Ok(Ok(())) => info!(component, "Stopped gracefully"),
        Ok(Err(e)) => error!(component, error = %e, "Task failed"),
        Err(_) => warn!(component, "Did not stop within timeout, forcing shutdown"),
    }
}
