// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;
mod rendering;

use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::application::access_service::AccessService;
use crate::application::dashboard_registry::{viewer_options, DashboardRegistry};
use crate::application::dashboard_service::DashboardService;
use crate::application::polling_service::PollingConfig;
use crate::application::telemetry_source::SystemClock;
use crate::infrastructure::api_client::ApiClient;
use crate::infrastructure::config::load_app_config;
use crate::presentation::app_state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = load_app_config()?;

    // Create API client (infrastructure layer)
    let client = Arc::new(ApiClient::new(&config.api)?);

    // Create services (application layer)
    let registry = Arc::new(DashboardRegistry::new(
        client.clone(),
        Arc::new(SystemClock),
        PollingConfig::from(&config.polling),
        viewer_options(&config.viewer),
        config.server.max_dashboards,
        Duration::from_secs(config.server.idle_ttl_secs.max(1)),
    ));
    let sweeper = DashboardRegistry::spawn_sweeper(
        &registry,
        Duration::from_secs(config.server.sweep_interval_secs.max(1)),
    );
    let dashboard_service = DashboardService::new(&config.charts, &config.display);
    let access_service = AccessService::new(client);

    // Create application state
    let state = Arc::new(AppState {
        registry: registry.clone(),
        dashboard_service,
        access_service,
    });

    // Build router (presentation layer)
    let router = presentation::router(state)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr: SocketAddr = config.server.bind.parse()?;
    tracing::info!("Starting structure-telemetry service on {} (upstream {})", addr, config.api.base_url);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    tracing::info!("Stopping {} live dashboards", registry.len());
    registry.shutdown_all().await;
    tracing::info!("All dashboards stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Could not listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
