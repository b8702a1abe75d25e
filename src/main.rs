use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use consentd::api::{self, AppState};
use consentd::clock::SystemClock;
use consentd::config::{Config, StoreBackend};
use consentd::storage;

const EXPIRY_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("consentd=info,tower_http=info")),
        )
        .init();

    // Load configuration
    let config = Arc::new(Config::from_env()?);
    info!(
        "Loaded configuration (rate limit: {} requests / {}s)",
        config.rate_limit.max_requests, config.rate_limit.window_secs
    );

    if config.admin.token.is_none() {
        warn!("ADMIN_TOKEN is not set; analytics reports will answer 500");
    }

    // Initialize store
    let store = storage::connect(&config.store).await?;
    if config.store.backend != StoreBackend::Memory {
        storage::spawn_expiry_sweeper(Arc::clone(&store), EXPIRY_SWEEP_INTERVAL);
    }

    let state = Arc::new(AppState::new(
        store,
        Arc::new(SystemClock),
        Arc::clone(&config),
    ));
    let app = api::create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🚀 consentd listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
