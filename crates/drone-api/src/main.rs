//! # Drone API Server
//!
//! Main entry point for the drone fleet mission console backend.
//! Serves the REST API and runs the WebSocket event stream next to
//! the flight engine.

mod config;
mod error;
mod handlers;
mod routes;
mod state;

use crate::config::ApiConfig;
use crate::routes::create_router;
use crate::state::AppState;

use std::net::SocketAddr;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    init_logging();

    info!("🚁 Starting Drone Fleet Mission Server v{}", env!("CARGO_PKG_VERSION"));
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // Load configuration
    let config = ApiConfig::from_env();
    config.simulation.validate()?;
    info!("Configuration loaded");
    info!("   API Port: {}", config.api_port);
    info!("   WebSocket Port: {}", config.ws_port);
    info!("   Map center: {:.6}, {:.6}", config.map_center.lat, config.map_center.lng);
    info!("   Tick interval: {:?}", config.simulation.tick_interval);

    // Initialize application state
    let state = AppState::new(config.clone())?;
    info!("Application state initialized");

    // Fan fleet events out to sockets and metrics
    let forwarder = state.spawn_event_forwarder();

    // Create router
    let app = create_router(state.clone());
    info!("Routes configured");

    // Start WebSocket server in background
    let ws_hub = state.ws_hub.clone();
    let ws_port = config.ws_port;
    tokio::spawn(async move {
        info!("Starting WebSocket server on port {}...", ws_port);
        if let Err(e) = drone_websocket::start_server(ws_hub, ws_port).await {
            error!("WebSocket server error: {}", e);
        }
    });

    // Start API server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.api_port));
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("🚀 API server listening on http://{}", addr);
    info!("WebSocket server on ws://0.0.0.0:{}", config.ws_port);
    info!("Metrics available at http://{}/metrics", addr);
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // No flight timer may outlive the server
    state.fleet.halt();
    forwarder.abort();

    info!("🛑 Server shutdown complete");
    Ok(())
}

/// Initialize logging with tracing
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,drone_api=debug,drone_tracker=debug,drone_websocket=debug")
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(filter)
        .init();
}

/// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            info!("Received terminate signal, shutting down...");
        }
    }
}
