//! API route definitions

use crate::handlers;
use crate::state::AppState;

use axum::{
    Router,
    http::HeaderValue,
    routing::{delete, get, post, put},
};
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = if state.config.cors_permissive {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
            .max_age(Duration::from_secs(3600))
    } else {
        CorsLayer::new()
            .allow_origin(HeaderValue::from_static("http://localhost:8080"))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        // Health & Status
        .route("/health", get(handlers::health_check))
        .route("/status", get(handlers::system_status))

        // Metrics (Prometheus format)
        .route("/metrics", get(handlers::metrics))

        // Drones API
        .route("/api/v1/drones", get(handlers::list_drones))
        .route("/api/v1/drones/{id}", get(handlers::get_drone))
        .route("/api/v1/drones/{id}/place", post(handlers::place_drone))
        .route("/api/v1/drones/{id}/remove", post(handlers::remove_drone))
        .route("/api/v1/drones/{id}/position", put(handlers::reposition_drone))

        // Route editing
        .route("/api/v1/drones/{id}/route", delete(handlers::clear_route))
        .route("/api/v1/drones/{id}/route/waypoints", post(handlers::append_waypoint))
        .route("/api/v1/drones/{id}/route/waypoints/last", delete(handlers::undo_waypoint))

        // Mission & flight control
        .route("/api/v1/drones/{id}/mission", get(handlers::get_mission))
        .route("/api/v1/drones/{id}/flight/{action}", post(handlers::flight_command))
        .route("/api/v1/plan", post(handlers::plan_route))

        // Mission log
        .route(
            "/api/v1/log",
            get(handlers::get_mission_log).delete(handlers::clear_mission_log),
        )

        // WebSocket info
        .route("/api/v1/ws/info", get(handlers::websocket_info))

        // State snapshot (for frontend initialization)
        .route("/api/v1/state", get(handlers::get_full_state))

        // Apply middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .with_state(state)
}

// ============================================================================
// TESTS
// ============================================================================
