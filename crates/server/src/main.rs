//! linkpeek server entry point.
//!
//! Loads configuration, opens the preview cache and serves the HTTP API
//! until Ctrl-C. Logs are JSON on stdout; filter with `RUST_LOG`.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use linkpeek_client::PreviewService;
use linkpeek_core::{AppConfig, CacheDb, CacheGateway};

mod error;
mod handler;
mod rate_limit;
mod routes;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    let config = AppConfig::load().context("loading configuration")?;

    let db = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("opening cache at {}", config.db_path.display()))?;
    let cache = Arc::new(CacheGateway::new(db, &config));
    let service = PreviewService::from_config(&config, cache)?;

    let state = handler::AppState::new(service, &config);
    let pruner = state.limiter.spawn_pruner();
    let app = handler::router(state, &config);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        render = config.render_enabled,
        static_dir = ?config.static_dir,
        "linkpeek listening"
    );

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pruner.abort();
    tracing::info!("linkpeek stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
