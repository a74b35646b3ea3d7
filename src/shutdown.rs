use std::sync::Arc;
use std::time::Duration;

use tokio::signal;

use crate::server::AppState;

/// Wait for a shutdown signal (SIGINT or SIGTERM).
pub async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown...");
        }
    }
}

/// Give in-flight units of work the configured grace period to finish.
///
/// Units still running afterwards are abandoned with the runtime; their
/// labels were never advanced, so re-delivery picks them up again.
pub async fn graceful_shutdown(state: &Arc<AppState>) {
    let in_flight = state.dispatcher.in_flight();
    if in_flight == 0 {
        tracing::info!("No in-flight units of work");
        return;
    }

    let grace = Duration::from_secs(state.config.agent.shutdown_grace_secs);
    tracing::info!(
        count = in_flight,
        grace_secs = grace.as_secs(),
        "Waiting for in-flight units of work"
    );

    if state.dispatcher.drain(grace).await {
        tracing::info!("Graceful shutdown complete");
    } else {
        tracing::warn!(
            remaining = state.dispatcher.in_flight(),
            "Grace period elapsed with units of work still running"
        );
    }
}
