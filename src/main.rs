// Main entry point - Dependency injection and server setup
mod domain;
mod application;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc};
use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::application::control_panel::PanelSettings;
use crate::application::panel_registry::PanelRegistry;
use crate::infrastructure::config::load_app_config;
use crate::infrastructure::http_gateway::HttpControlGateway;
use crate::infrastructure::session_store::SettingsSessionStore;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    close_panel, decrease_volume, get_panel, health_check, increase_volume, reset, save,
    set_volume, toggle, volume_input, volume_preset,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = load_app_config().context("Failed to load configuration")?;

    // Create gateway and session store (infrastructure layer)
    let gateway = Arc::new(HttpControlGateway::new(&config.api)?);
    let store = Arc::new(SettingsSessionStore::from_settings(&config.session));

    // Create panel registry (application layer)
    let registry = PanelRegistry::new(gateway, store, PanelSettings::from(&config));

    let state = Arc::new(AppState {
        registry: registry.clone(),
    });

    // Build router (presentation layer)
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/panels/:id", get(get_panel).delete(close_panel))
        .route("/panels/:id/toggle", post(toggle))
        .route("/panels/:id/volume", post(set_volume))
        .route("/panels/:id/volume/input", post(volume_input))
        .route("/panels/:id/volume/increase", post(increase_volume))
        .route("/panels/:id/volume/decrease", post(decrease_volume))
        .route("/panels/:id/volume/preset/:value", post(volume_preset))
        .route("/panels/:id/save", post(save))
        .route("/panels/:id/reset", post(reset))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.server.bind))?;
    tracing::info!(
        "Starting speaker-control service on {} (backend {})",
        addr,
        config.api.base_url
    );

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    registry.shutdown().await;
    tracing::info!("speaker-control service stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
