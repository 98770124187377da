//! hf-server: HTTP surface of the hlsforge job engine.
//!
//! - Axum API with API-key authentication and request ids
//! - Background retention sweep
//! - Graceful shutdown via signal handling

pub mod context;
pub mod error;
pub mod middleware;
pub mod router;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hf_av::ToolRegistry;
use hf_core::config::Config;
use hf_jobs::run_retention_sweep;
use tokio_util::sync::CancellationToken;

use crate::context::AppContext;

/// Start the hlsforge server.
///
/// Discovers tools, builds the job engine and serves HTTP until a shutdown
/// signal arrives. On the way out every unfinished job is cancelled and its
/// process killed.
pub async fn start(config: Config) -> hf_core::Result<()> {
    for warning in config.validate() {
        tracing::warn!("Config warning: {warning}");
    }

    let tools = Arc::new(ToolRegistry::discover(&config.tools));
    for info in tools.check_all() {
        if info.available {
            tracing::info!(
                "Tool found: {} ({})",
                info.name,
                info.version.as_deref().unwrap_or("unknown version")
            );
        } else {
            tracing::warn!("Tool not found: {}", info.name);
        }
    }

    let orchestrator = context::build_orchestrator(&config, &tools)?;
    let ctx = AppContext::new(config.clone(), tools, orchestrator.clone());

    let cancel = CancellationToken::new();

    let sweep_handle = tokio::spawn(run_retention_sweep(
        orchestrator.clone(),
        Duration::from_secs(config.jobs.retention_hours.saturating_mul(3600)),
        Duration::from_secs(config.jobs.cleanup_interval_secs.max(1)),
        cancel.clone(),
    ));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| hf_core::Error::Internal(format!("Invalid server address: {e}")))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| hf_core::Error::Internal(format!("Failed to bind to {addr}: {e}")))?;

    tracing::info!(
        "Starting server on {addr} (max concurrent jobs: {}, hw accel: {})",
        config.jobs.ceiling(),
        config.jobs.hw_accel
    );

    let app = router::build_router(ctx);
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await
        .map_err(|e| hf_core::Error::Internal(format!("Server error: {e}")));

    cancel.cancel();
    orchestrator.shutdown();
    let _ = sweep_handle.await;

    tracing::info!("Server shutdown complete");
    served
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = cancel.cancelled() => {}
    }

    tracing::info!("Shutdown signal received");
}
