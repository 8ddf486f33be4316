//! Application state management

use crate::config::ApiConfig;
use drone_telemetry::MetricsCollector;
use drone_tracker::{FleetController, TrackerError};
use drone_websocket::{WebSocketHub, WsError};

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration
    pub config: ApiConfig,
    /// Flight engine and fleet store
    pub fleet: FleetController,
    /// WebSocket hub for real-time updates
    pub ws_hub: Arc<WebSocketHub>,
    /// Prometheus metrics
    pub metrics: Arc<MetricsCollector>,
    /// Server start time
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Create new application state with all components
    pub fn new(config: ApiConfig) -> anyhow::Result<Self> {
        let fleet = FleetController::with_default_roster(config.simulation.clone(), config.map_center)?;
        info!("Fleet initialized with {} drones", fleet.drone_count());

        let metrics = Arc::new(MetricsCollector::new()?);
        metrics.update_fleet(&fleet.drones());

        let ws_hub = Arc::new(WebSocketHub::new());

        // Commands arriving over the socket go straight to the engine
        let command_fleet = fleet.clone();
        let command_metrics = metrics.clone();
        ws_hub.set_command_handler(move |command| {
            command_fleet
                .apply(&command)
                .map(|_| ())
                .map_err(|e| {
                    if let Some(reason) = e.rejection() {
                        command_metrics.record_rejection(reason.kind());
                    }
                    to_ws_error(e)
                })
        });

        let state_fleet = fleet.clone();
        ws_hub.set_state_provider(move || state_fleet.state().into());

        Ok(Self {
            config,
            fleet,
            ws_hub,
            metrics,
            started_at: Utc::now(),
        })
    }

    /// Forward fleet events to WebSocket clients and metrics
    pub fn spawn_event_forwarder(&self) -> JoinHandle<()> {
        let mut events = self.fleet.subscribe();
        let hub = self.ws_hub.clone();
        let metrics = self.metrics.clone();

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        metrics.record_event(&event);
                        hub.broadcast(event);
                    }
                    Err(RecvError::Lagged(n)) => {
                        warn!("Event forwarder lagged by {} events", n);
                    }
                    Err(RecvError::Closed) => {
                        debug!("Fleet event bus closed");
                        break;
                    }
                }
            }
        })
    }

    /// Get WebSocket client count
    pub fn ws_client_count(&self) -> usize {
        self.ws_hub.client_count()
    }

    /// Count a refused command in the metrics
    pub fn note_error(&self, err: &TrackerError) {
        if let Some(reason) = err.rejection() {
            self.metrics.record_rejection(reason.kind());
        }
    }
}

fn to_ws_error(err: TrackerError) -> WsError {
    let code = match &err {
        TrackerError::DroneNotFound(_) => "not_found",
        TrackerError::Rejected(reason) => reason.kind(),
        TrackerError::Core(_) => "bad_request",
    };
    WsError::rejected(code, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use drone_core::{DroneId, FlightCommand, FlightCommandType, GeoPoint, ServerMessage};

    fn command(id: &str, command: FlightCommandType) -> FlightCommand {
        FlightCommand {
            drone_id: DroneId::new(id),
            command,
        }
    }

    #[test]
    fn test_socket_commands_reach_fleet() {
        let state = AppState::new(ApiConfig::default()).unwrap();

        let reply = state.ws_hub.handle_command(command("1", FlightCommandType::Place { position: None }));
        assert!(matches!(reply, ServerMessage::CommandAccepted { .. }));
        assert!(state.fleet.drone(&DroneId::new("1")).unwrap().state.is_visible);

        match state.ws_hub.handle_command(command("1", FlightCommandType::Start)) {
            ServerMessage::Error { code, .. } => assert_eq!(code, "insufficient_route"),
            other => panic!("unexpected reply: {:?}", other),
        }

        match state.ws_hub.handle_command(command(
            "nope",
            FlightCommandType::AppendWaypoint {
                point: GeoPoint::new(1.0, 1.0),
            },
        )) {
            ServerMessage::Error { code, .. } => assert_eq!(code, "not_found"),
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[test]
    fn test_state_provider_reflects_fleet() {
        let state = AppState::new(ApiConfig::default()).unwrap();
        let snapshot = state.ws_hub.initial_state();
        assert_eq!(snapshot.drones.len(), 5);
        assert!(snapshot.mission_log.is_empty());
    }

    #[tokio::test]
    async fn test_forwarder_feeds_hub() {
        let state = AppState::new(ApiConfig::default()).unwrap();
        let forwarder = state.spawn_event_forwarder();

        state.fleet.place_drone(&DroneId::new("2"), None).unwrap();

        for _ in 0..50 {
            if state.ws_hub.message_count() >= 2 {
                break;
            }
            tokio::task::yield_now().await;
        }
        // Placement publishes a log entry and the placement itself
        assert!(state.ws_hub.message_count() >= 2);

        forwarder.abort();
    }
}
