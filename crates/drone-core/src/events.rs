//! Event types for the drone fleet console
//!
//! These events are used for real-time communication via WebSocket:
//! the engine publishes them on every state change and the hub fans
//! them out to subscribed UI clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CoreResult, DroneId, DroneSnapshot, FlightStatus, GeoPoint, LogEntry};

/// Event envelope for all system events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(event_type: EventType, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event_type,
            payload,
        }
    }

    pub fn drone_placed(snapshot: DroneSnapshot) -> Self {
        Self::new(EventType::DronePlaced, EventPayload::Drone(Box::new(snapshot)))
    }

    /// Grounded drone dragged to a new spot; flight state is kept
    pub fn drone_moved(snapshot: DroneSnapshot) -> Self {
        Self::new(EventType::DroneMoved, EventPayload::Drone(Box::new(snapshot)))
    }

    pub fn drone_removed(snapshot: DroneSnapshot) -> Self {
        Self::new(EventType::DroneRemoved, EventPayload::Drone(Box::new(snapshot)))
    }

    pub fn route_updated(snapshot: DroneSnapshot) -> Self {
        Self::new(EventType::RouteUpdated, EventPayload::Drone(Box::new(snapshot)))
    }

    pub fn flight_progress(snapshot: DroneSnapshot) -> Self {
        Self::new(EventType::FlightProgress, EventPayload::Drone(Box::new(snapshot)))
    }

    pub fn flight_status_changed(drone_id: DroneId, old_status: FlightStatus, new_status: FlightStatus) -> Self {
        Self::new(
            EventType::FlightStatusChanged,
            EventPayload::FlightStatus(FlightStatusEvent {
                drone_id,
                old_status,
                new_status,
            }),
        )
    }

    pub fn log_appended(entry: LogEntry) -> Self {
        Self::new(EventType::LogAppended, EventPayload::Log(entry))
    }

    pub fn log_cleared() -> Self {
        Self::new(EventType::LogCleared, EventPayload::Empty)
    }

    /// Drone this event concerns, if any
    pub fn drone_id(&self) -> Option<&DroneId> {
        match &self.payload {
            EventPayload::Drone(snapshot) => Some(snapshot.id()),
            EventPayload::FlightStatus(e) => Some(&e.drone_id),
            EventPayload::Log(entry) => Some(&entry.drone_id),
            EventPayload::Empty => None,
        }
    }
}

/// Type of event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    // Map placement events
    DronePlaced,
    DroneMoved,
    DroneRemoved,

    // Route editing events
    RouteUpdated,

    // Flight events
    FlightStatusChanged,
    FlightProgress,

    // Mission log events
    LogAppended,
    LogCleared,
}

impl EventType {
    pub const ALL: [EventType; 8] = [
        EventType::DronePlaced,
        EventType::DroneMoved,
        EventType::DroneRemoved,
        EventType::RouteUpdated,
        EventType::FlightStatusChanged,
        EventType::FlightProgress,
        EventType::LogAppended,
        EventType::LogCleared,
    ];
}

/// Event payload variants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum EventPayload {
    Drone(Box<DroneSnapshot>),
    FlightStatus(FlightStatusEvent),
    Log(LogEntry),
    Empty,
}

/// Flight phase transition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightStatusEvent {
    pub drone_id: DroneId,
    pub old_status: FlightStatus,
    pub new_status: FlightStatus,
}

/// Full fleet snapshot (sent on connection and on request)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullStateEvent {
    pub drones: Vec<DroneSnapshot>,
    pub mission_log: Vec<LogEntry>,
}

// ============================================================================
// WEBSOCKET MESSAGE TYPES
// ============================================================================

/// Message sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerMessage {
    /// Full state on connection or request
    InitialState(FullStateEvent),
    /// Event update
    Event(Event),
    /// Command outcome
    CommandAccepted { drone_id: DroneId },
    /// Error message
    Error { code: String, message: String },
    /// Heartbeat/ping
    Ping { timestamp: i64 },
}

impl ServerMessage {
    pub fn to_json(&self) -> CoreResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Message sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientMessage {
    /// Subscribe to specific drone updates
    Subscribe { drone_ids: Option<Vec<DroneId>> },
    /// Unsubscribe from updates
    Unsubscribe { drone_ids: Option<Vec<DroneId>> },
    /// Request current state
    RequestState,
    /// Operate a drone
    FlightCommand(FlightCommand),
    /// Heartbeat/pong
    Pong { timestamp: i64 },
}

/// Command addressed to a single drone
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightCommand {
    pub drone_id: DroneId,
    pub command: FlightCommandType,
}

/// Engine operations reachable from the UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params")]
pub enum FlightCommandType {
    /// Put the drone on the map (parking spot when no position is given)
    Place { position: Option<GeoPoint> },
    /// Take the drone off the map
    Remove,
    /// Drag a grounded drone
    Reposition { position: GeoPoint },
    /// Extend the route
    AppendWaypoint { point: GeoPoint },
    /// Drop the last route point
    UndoWaypoint,
    /// Empty the route
    ClearRoute,
    Start,
    Pause,
    Resume,
    Stop,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_creation() {
        let event = Event::flight_status_changed(
            DroneId::new("1"),
            FlightStatus::Idle,
            FlightStatus::Takeoff,
        );

        assert_eq!(event.event_type, EventType::FlightStatusChanged);
        assert_eq!(event.drone_id(), Some(&DroneId::new("1")));
        assert!(Event::log_cleared().drone_id().is_none());
    }

    #[test]
    fn test_server_message_serialization() {
        let msg = ServerMessage::Ping { timestamp: 12345 };
        let json = msg.to_json().unwrap();
        assert!(json.contains("Ping"));
    }

    #[test]
    fn test_client_command_parsing() {
        let json = r#"{"type":"FlightCommand","payload":{"drone_id":"3","command":{"type":"AppendWaypoint","params":{"point":{"lat":44.6,"lng":33.5}}}}}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();

        match msg {
            ClientMessage::FlightCommand(cmd) => {
                assert_eq!(cmd.drone_id.as_str(), "3");
                assert_eq!(
                    cmd.command,
                    FlightCommandType::AppendWaypoint { point: GeoPoint::new(44.6, 33.5) }
                );
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_unit_command_parsing() {
        let json = r#"{"drone_id":"1","command":{"type":"Start"}}"#;
        let cmd: FlightCommand = serde_json::from_str(json).unwrap();
        assert_eq!(cmd.command, FlightCommandType::Start);
    }
}
