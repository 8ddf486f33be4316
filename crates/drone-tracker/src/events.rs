//! Event bus for system-wide event distribution

use drone_core::Event;

use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::trace;

/// Event bus for distributing fleet events to the API, WebSocket hub and metrics
pub struct EventBus {
    /// Broadcast sender for events
    sender: broadcast::Sender<Event>,
    /// Event counter
    event_count: Arc<RwLock<u64>>,
}

impl EventBus {
    /// Create a new event bus
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));

        Self {
            sender,
            event_count: Arc::new(RwLock::new(0)),
        }
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Publish an event; delivery is best effort when nobody listens
    pub fn publish(&self, event: Event) {
        *self.event_count.write() += 1;

        let event_type = event.event_type;
        let _ = self.sender.send(event);

        trace!("Event {:?} published, total: {}", event_type, self.get_event_count());
    }

    /// Get event count
    pub fn get_event_count(&self) -> u64 {
        *self.event_count.read()
    }

    /// Get subscriber count (approximate)
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            event_count: self.event_count.clone(),
        }
    }
}
