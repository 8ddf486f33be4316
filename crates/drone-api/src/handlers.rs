//! API request handlers

use crate::error::ApiError;
use crate::state::AppState;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use chrono::Utc;
use drone_core::{DroneId, DroneSnapshot, EventType, GeoPoint, LogEntry, MissionParameters};
use drone_tracker::{FleetState, FleetStats, TrackerResult, plan_mission};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Default number of log entries returned when no limit is given
const DEFAULT_LOG_LIMIT: usize = 100;

// ============================================================================
// REQUEST / RESPONSE TYPES
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub api: String,
    pub uptime_seconds: i64,
    pub websocket_clients: usize,
    pub events_published: u64,
    pub fleet: FleetStats,
}

#[derive(Serialize)]
pub struct DroneListResponse {
    pub drones: Vec<DroneSnapshot>,
    pub total: usize,
}

#[derive(Serialize)]
pub struct WebSocketInfoResponse {
    pub url: String,
    pub connected_clients: usize,
    pub supported_events: Vec<EventType>,
}

/// Route planning request: either a drone's own limits or explicit ones
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRequest {
    pub path: Vec<GeoPoint>,
    #[serde(default)]
    pub drone_id: Option<DroneId>,
    #[serde(default)]
    pub max_speed: Option<f64>,
    #[serde(default)]
    pub battery: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct LogQuery {
    pub limit: Option<usize>,
}

/// Convert an engine result, counting refusals in the metrics
fn engine<T>(state: &AppState, result: TrackerResult<T>) -> Result<T, ApiError> {
    result.map_err(|e| {
        state.note_error(&e);
        ApiError::from(e)
    })
}

// ============================================================================
// HEALTH & STATUS HANDLERS
// ============================================================================

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// System status overview
pub async fn system_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(StatusResponse {
        api: "running".into(),
        uptime_seconds: (Utc::now() - state.started_at).num_seconds(),
        websocket_clients: state.ws_client_count(),
        events_published: state.fleet.event_bus().get_event_count(),
        fleet: FleetStats::from_drones(&state.fleet.drones()),
    })
}

/// Prometheus metrics endpoint
pub async fn metrics(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    state.metrics.update_fleet(&state.fleet.drones());
    state.metrics.set_ws_connections(state.ws_client_count() as i64);
    state.metrics.sync_flight_ticks(state.fleet.tick_count());

    let body = state.metrics.export()?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}

// ============================================================================
// DRONE HANDLERS
// ============================================================================

/// List all drones in roster order
pub async fn list_drones(State(state): State<AppState>) -> impl IntoResponse {
    let drones = state.fleet.drones();
    let total = drones.len();
    Json(DroneListResponse { drones, total })
}

/// Get single drone by ID
pub async fn get_drone(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DroneSnapshot>, ApiError> {
    let drone = engine(&state, state.fleet.drone(&DroneId::new(id)))?;
    Ok(Json(drone))
}

/// Place a drone on the map at a `{lat,lng}` body. An empty or `null` body
/// parks it at its home spot.
pub async fn place_drone(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<DroneSnapshot>, ApiError> {
    let position: Option<GeoPoint> = if body.is_empty() {
        None
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::bad_request(e.to_string()))?
    };

    let drone_id = DroneId::new(id);
    info!("Placing drone {} at {:?}", drone_id, position);
    let drone = engine(&state, state.fleet.place_drone(&drone_id, position))?;
    Ok(Json(drone))
}

/// Take a drone off the map
pub async fn remove_drone(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DroneSnapshot>, ApiError> {
    let drone = engine(&state, state.fleet.remove_drone(&DroneId::new(id)))?;
    Ok(Json(drone))
}

/// Move a grounded drone
pub async fn reposition_drone(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(position): Json<GeoPoint>,
) -> Result<Json<DroneSnapshot>, ApiError> {
    let drone = engine(&state, state.fleet.reposition_drone(&DroneId::new(id), position))?;
    Ok(Json(drone))
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

pub async fn append_waypoint(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(point): Json<GeoPoint>,
) -> Result<Json<DroneSnapshot>, ApiError> {
    let drone = engine(&state, state.fleet.append_waypoint(&DroneId::new(id), point))?;
    Ok(Json(drone))
}

pub async fn undo_waypoint(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DroneSnapshot>, ApiError> {
    let drone = engine(&state, state.fleet.undo_waypoint(&DroneId::new(id)))?;
    Ok(Json(drone))
}

pub async fn clear_route(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DroneSnapshot>, ApiError> {
    let drone = engine(&state, state.fleet.clear_route(&DroneId::new(id)))?;
    Ok(Json(drone))
}

/// Mission parameters for the drone's current route, `null` if unplannable
pub async fn get_mission(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Option<MissionParameters>>, ApiError> {
    let drone = engine(&state, state.fleet.drone(&DroneId::new(id)))?;
    Ok(Json(drone.state.mission_parameters))
}

/// Plan a route without changing any drone
pub async fn plan_route(
    State(state): State<AppState>,
    Json(request): Json<PlanRequest>,
) -> Result<Json<Option<MissionParameters>>, ApiError> {
    if let Some(drone_id) = request.drone_id {
        let plan = engine(&state, state.fleet.preview_mission(&drone_id, &request.path))?;
        return Ok(Json(plan));
    }

    let max_speed = request
        .max_speed
        .ok_or_else(|| ApiError::bad_request("maxSpeed or droneId is required"))?;
    for point in &request.path {
        point
            .validate()
            .map_err(|e| ApiError::bad_request(e.to_string()))?;
    }

    let battery = request.battery.unwrap_or(100.0);
    debug!("Planning {} points at {} km/h with {}% battery", request.path.len(), max_speed, battery);
    Ok(Json(plan_mission(&request.path, max_speed, battery)))
}

// ============================================================================
// FLIGHT HANDLERS
// ============================================================================

/// Drive a flight transition: start, pause, resume or stop
pub async fn flight_command(
    State(state): State<AppState>,
    Path((id, action)): Path<(String, String)>,
) -> Result<Json<DroneSnapshot>, ApiError> {
    let drone_id = DroneId::new(id);
    info!("Flight command {} for drone {}", action, drone_id);

    let result = match action.as_str() {
        "start" => state.fleet.start_flight(&drone_id),
        "pause" => state.fleet.pause_flight(&drone_id),
        "resume" => state.fleet.resume_flight(&drone_id),
        "stop" => state.fleet.stop_flight(&drone_id),
        other => return Err(ApiError::bad_request(format!("Unknown flight command: {}", other))),
    };

    Ok(Json(engine(&state, result)?))
}

// ============================================================================
// MISSION LOG HANDLERS
// ============================================================================

/// Newest entries first
pub async fn get_mission_log(
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> Json<Vec<LogEntry>> {
    Json(state.fleet.mission_log(query.limit.unwrap_or(DEFAULT_LOG_LIMIT)))
}

pub async fn clear_mission_log(State(state): State<AppState>) -> StatusCode {
    state.fleet.clear_mission_log();
    StatusCode::NO_CONTENT
}

// ============================================================================
// STATE HANDLERS
// ============================================================================

/// WebSocket connection info
pub async fn websocket_info(State(state): State<AppState>) -> impl IntoResponse {
    Json(WebSocketInfoResponse {
        url: format!("ws://localhost:{}", state.config.ws_port),
        connected_clients: state.ws_client_count(),
        supported_events: EventType::ALL.to_vec(),
    })
}

/// Full state snapshot for frontend initialization
pub async fn get_full_state(State(state): State<AppState>) -> Json<FleetState> {
    Json(state.fleet.state())
}
