//! Edusight server binary
//!
//! Wires configuration, storage, the generation provider and the HTTP
//! surface together, then serves until a shutdown signal arrives.

use anyhow::Result;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::limit::ConcurrencyLimitLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use edusight::config::ServerConfig;
use edusight::handlers::{build_protected_routes, build_public_routes, ServiceState};
use edusight::{metrics, middleware};

/// Max time to flush the embedded store during shutdown
const STORAGE_FLUSH_TIMEOUT_SECS: u64 = 10;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = metrics::register_metrics() {
        tracing::warn!("metrics registration failed: {e}");
    }

    let config = ServerConfig::from_env()?;
    let port = config.port;
    let cors = config.cors.to_layer();
    let max_concurrent = config.max_concurrent_requests;

    let state = Arc::new(ServiceState::from_config(config)?);
    // Keep a reference for shutdown cleanup (clone BEFORE moving into router)
    let state_for_shutdown = Arc::clone(&state);

    let public = build_public_routes(state.clone());
    let protected = build_protected_routes(state);

    let app = Router::new()
        .merge(public)
        .merge(protected)
        .layer(axum::middleware::from_fn(middleware::track_metrics))
        .layer(ConcurrencyLimitLayer::new(max_concurrent))
        .layer(cors);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    info!("edusight listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutdown signal received, flushing storage");

    let flush_future = async { state_for_shutdown.flush_storage() };
    match tokio::time::timeout(
        std::time::Duration::from_secs(STORAGE_FLUSH_TIMEOUT_SECS),
        flush_future,
    )
    .await
    {
        Ok(Ok(())) => info!("storage flushed"),
        Ok(Err(e)) => tracing::error!("failed to flush storage: {e}"),
        Err(_) => tracing::error!(
            "storage flush timed out after {}s",
            STORAGE_FLUSH_TIMEOUT_SECS
        ),
    }

    info!("server shutdown complete");
    Ok(())
}

/// Handle graceful shutdown on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
