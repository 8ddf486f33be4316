//! WebSocket connection hub
//!
//! Manages all connected WebSocket clients, fans fleet events out to them
//! and routes their flight commands to the engine.

use crate::error::{WsError, WsResult};
use drone_core::{DroneId, Event, FlightCommand, FullStateEvent, ServerMessage};

use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Broadcast channel capacity
const BROADCAST_CAPACITY: usize = 1024;

type CommandHandler = Box<dyn Fn(FlightCommand) -> WsResult<()> + Send + Sync>;
type StateProvider = Box<dyn Fn() -> FullStateEvent + Send + Sync>;

/// WebSocket connection hub
pub struct WebSocketHub {
    /// Broadcast sender for events
    broadcast_tx: broadcast::Sender<Event>,
    /// Connected clients
    clients: DashMap<Uuid, ClientState>,
    /// Total message count
    message_count: AtomicUsize,
    /// Command handler callback
    command_handler: RwLock<Option<CommandHandler>>,
    /// Full-state callback for new connections and refresh requests
    state_provider: RwLock<Option<StateProvider>>,
}

/// State for a connected client
#[derive(Debug)]
struct ClientState {
    /// Subscribed drone IDs (None = all)
    subscriptions: Option<HashSet<DroneId>>,
    /// Connection timestamp
    connected_at: chrono::DateTime<chrono::Utc>,
}

impl WebSocketHub {
    /// Create a new WebSocket hub
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);

        Self {
            broadcast_tx,
            clients: DashMap::new(),
            message_count: AtomicUsize::new(0),
            command_handler: RwLock::new(None),
            state_provider: RwLock::new(None),
        }
    }

    /// Register a new client and return a broadcast receiver
    pub fn register_client(&self, client_id: Uuid) -> broadcast::Receiver<Event> {
        let state = ClientState {
            subscriptions: None, // Subscribe to all by default
            connected_at: chrono::Utc::now(),
        };

        self.clients.insert(client_id, state);
        info!("Client {} registered ({} total)", client_id, self.clients.len());

        self.broadcast_tx.subscribe()
    }

    /// Unregister a client
    pub fn unregister_client(&self, client_id: Uuid) {
        if let Some((_, state)) = self.clients.remove(&client_id) {
            let session = chrono::Utc::now() - state.connected_at;
            info!(
                "Client {} unregistered after {}s ({} remaining)",
                client_id,
                session.num_seconds(),
                self.clients.len()
            );
        }
    }

    /// Get number of connected clients
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Broadcast an event to all clients
    pub fn broadcast(&self, event: Event) {
        self.message_count.fetch_add(1, Ordering::Relaxed);

        // Send to broadcast channel (drops if no receivers)
        let _ = self.broadcast_tx.send(event);
    }

    /// Whether `event` should reach this client given its subscriptions.
    /// Fleet-wide events always pass.
    pub fn wants(&self, client_id: Uuid, event: &Event) -> bool {
        let Some(drone_id) = event.drone_id() else {
            return true;
        };
        self.clients
            .get(&client_id)
            .map(|client| match &client.subscriptions {
                Some(ids) => ids.contains(drone_id),
                None => true,
            })
            .unwrap_or(false)
    }

    /// Subscribe client to specific drones
    pub fn subscribe(&self, client_id: Uuid, drone_ids: Option<Vec<DroneId>>) {
        if let Some(mut client) = self.clients.get_mut(&client_id) {
            client.subscriptions = drone_ids.map(|ids| ids.into_iter().collect());
            debug!("Client {} subscriptions updated", client_id);
        }
    }

    /// Unsubscribe client from specific drones
    pub fn unsubscribe(&self, client_id: Uuid, drone_ids: Option<Vec<DroneId>>) {
        if let Some(mut client) = self.clients.get_mut(&client_id) {
            if let Some(ref ids) = drone_ids {
                if let Some(ref mut subs) = client.subscriptions {
                    for id in ids {
                        subs.remove(id);
                    }
                }
            } else {
                // Unsubscribe from all
                client.subscriptions = Some(HashSet::new());
            }
            debug!("Client {} unsubscribed", client_id);
        }
    }

    /// Set command handler callback
    pub fn set_command_handler<F>(&self, handler: F)
    where
        F: Fn(FlightCommand) -> WsResult<()> + Send + Sync + 'static,
    {
        *self.command_handler.write() = Some(Box::new(handler));
    }

    /// Set the callback that produces the full fleet state
    pub fn set_state_provider<F>(&self, provider: F)
    where
        F: Fn() -> FullStateEvent + Send + Sync + 'static,
    {
        *self.state_provider.write() = Some(Box::new(provider));
    }

    /// Run a command from a client and build the reply
    pub fn handle_command(&self, command: FlightCommand) -> ServerMessage {
        let drone_id = command.drone_id.clone();
        let result = match *self.command_handler.read() {
            Some(ref handler) => handler(command),
            None => {
                warn!("No command handler registered");
                Err(WsError::NoCommandHandler)
            }
        };

        match result {
            Ok(()) => ServerMessage::CommandAccepted { drone_id },
            Err(e) => ServerMessage::Error {
                code: e.code().to_string(),
                message: e.to_string(),
            },
        }
    }

    /// Current fleet state, empty until a provider is registered
    pub fn initial_state(&self) -> FullStateEvent {
        match *self.state_provider.read() {
            Some(ref provider) => provider(),
            None => FullStateEvent::default(),
        }
    }

    /// Get total messages broadcast
    pub fn message_count(&self) -> usize {
        self.message_count.load(Ordering::Relaxed)
    }

    /// Check if a specific client is connected
    pub fn is_client_connected(&self, client_id: Uuid) -> bool {
        self.clients.contains_key(&client_id)
    }
}

impl Default for WebSocketHub {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use drone_core::{FlightCommandType, FlightStatus};

    fn status_event(id: &str) -> Event {
        Event::flight_status_changed(DroneId::new(id), FlightStatus::Idle, FlightStatus::Takeoff)
    }

    #[test]
    fn test_client_registration() {
        let hub = WebSocketHub::new();
        let id = Uuid::new_v4();

        let _rx = hub.register_client(id);
        assert_eq!(hub.client_count(), 1);
        assert!(hub.is_client_connected(id));

        hub.unregister_client(id);
        assert_eq!(hub.client_count(), 0);
        assert!(!hub.is_client_connected(id));
    }

    #[test]
    fn test_subscriptions_filter_events() {
        let hub = WebSocketHub::new();
        let id = Uuid::new_v4();
        let _rx = hub.register_client(id);

        assert!(hub.wants(id, &status_event("1")));

        hub.subscribe(id, Some(vec![DroneId::new("1"), DroneId::new("2")]));
        hub.unsubscribe(id, Some(vec![DroneId::new("1")]));

        assert!(!hub.wants(id, &status_event("1")));
        assert!(hub.wants(id, &status_event("2")));
        assert!(hub.wants(id, &Event::log_cleared()));

        hub.unsubscribe(id, None);
        assert!(!hub.wants(id, &status_event("2")));
    }

    #[tokio::test]
    async fn test_broadcast_message_count() {
        let hub = WebSocketHub::new();
        let mut rx = hub.register_client(Uuid::new_v4());

        hub.broadcast(status_event("3"));

        assert_eq!(hub.message_count(), 1);
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn test_command_replies() {
        let hub = WebSocketHub::new();
        let command = FlightCommand {
            drone_id: DroneId::new("1"),
            command: FlightCommandType::Start,
        };

        match hub.handle_command(command.clone()) {
            ServerMessage::Error { code, .. } => assert_eq!(code, "unavailable"),
            other => panic!("unexpected reply: {:?}", other),
        }

        hub.set_command_handler(|cmd| match cmd.command {
            FlightCommandType::Start => Ok(()),
            _ => Err(WsError::rejected("invalid_transition", "nope")),
        });

        assert!(matches!(
            hub.handle_command(command),
            ServerMessage::CommandAccepted { .. }
        ));
        match hub.handle_command(FlightCommand {
            drone_id: DroneId::new("1"),
            command: FlightCommandType::Pause,
        }) {
            ServerMessage::Error { code, message } => {
                assert_eq!(code, "invalid_transition");
                assert_eq!(message, "nope");
            }
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[test]
    fn test_state_provider() {
        let hub = WebSocketHub::new();
        assert!(hub.initial_state().drones.is_empty());

        hub.set_state_provider(FullStateEvent::default);
        assert!(hub.initial_state().mission_log.is_empty());
    }
}
