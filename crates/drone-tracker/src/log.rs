//! Two-tier mission log: a per-drone ring inside each flight state and a
//! fleet-wide ring shared by all drones. Both are most-recent-first.

use crate::events::EventBus;
use chrono::Utc;
use drone_core::{Drone, DroneFlightState, Event, LogData, LogEntry};

use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::info;

/// Newest-first entries plus the id the next entry gets. Ids are handed
/// out under the same lock as the insert, so ring order is id order.
#[derive(Debug)]
struct Ring {
    entries: VecDeque<LogEntry>,
    next_id: u64,
}

/// Fleet-wide mission log
#[derive(Clone)]
pub struct MissionLog {
    ring: Arc<RwLock<Ring>>,
    capacity: usize,
    drone_capacity: usize,
    bus: EventBus,
}

impl MissionLog {
    pub fn new(capacity: usize, drone_capacity: usize, bus: EventBus) -> Self {
        Self {
            ring: Arc::new(RwLock::new(Ring {
                entries: VecDeque::with_capacity(capacity),
                next_id: 1,
            })),
            capacity,
            drone_capacity,
            bus,
        }
    }

    /// Append an entry to both tiers and announce it
    pub fn record(
        &self,
        drone: &Drone,
        state: &mut DroneFlightState,
        message: impl Into<String>,
        data: LogData,
    ) -> LogEntry {
        let entry = {
            let mut ring = self.ring.write();
            let entry = LogEntry {
                id: ring.next_id,
                drone_id: drone.id.clone(),
                drone_name: drone.name.clone(),
                timestamp: Utc::now(),
                message: message.into(),
                data,
            };
            ring.next_id += 1;
            ring.entries.push_front(entry.clone());
            ring.entries.truncate(self.capacity);
            entry
        };

        info!(drone = %drone.id, "{}", entry.message);

        state.push_log(entry.clone(), self.drone_capacity);

        self.bus.publish(Event::log_appended(entry.clone()));
        entry
    }

    /// Up to `limit` most recent entries, newest first
    pub fn recent(&self, limit: usize) -> Vec<LogEntry> {
        self.ring.read().entries.iter().take(limit).cloned().collect()
    }

    pub fn all(&self) -> Vec<LogEntry> {
        self.ring.read().entries.iter().cloned().collect()
    }

    /// Empty the fleet-wide log. Per-drone logs are untouched.
    pub fn clear(&self) {
        self.ring.write().entries.clear();
        self.bus.publish(Event::log_cleared());
    }

    pub fn len(&self) -> usize {
        self.ring.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.read().entries.is_empty()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use drone_core::EventType;

    fn log(capacity: usize, drone_capacity: usize) -> (MissionLog, EventBus) {
        let bus = EventBus::new(256);
        (MissionLog::new(capacity, drone_capacity, bus.clone()), bus)
    }

    #[test]
    fn test_record_writes_both_tiers() {
        let (log, _bus) = log(100, 20);
        let drone = Drone::new("1", "Drone-1", 70.0);
        let mut state = DroneFlightState::default();

        let entry = log.record(&drone, &mut state, "Placed on map", LogData::new().with("battery", 100u8));

        assert_eq!(entry.drone_name, "Drone-1");
        assert_eq!(log.len(), 1);
        assert_eq!(state.flight_log.len(), 1);
        assert_eq!(state.flight_log[0].id, entry.id);
    }

    #[test]
    fn test_capacities_and_order() {
        let (log, _bus) = log(5, 3);
        let drone = Drone::new("1", "Drone-1", 70.0);
        let mut state = DroneFlightState::default();

        for i in 0..8 {
            log.record(&drone, &mut state, format!("event {}", i), LogData::new());
        }

        assert_eq!(log.len(), 5);
        assert_eq!(state.flight_log.len(), 3);

        let recent = log.recent(2);
        assert_eq!(recent[0].message, "event 7");
        assert_eq!(recent[1].message, "event 6");
        assert!(recent[0].id > recent[1].id);
    }

    #[test]
    fn test_concurrent_writers_keep_id_order() {
        let (log, _bus) = log(1000, 20);

        std::thread::scope(|scope| {
            for n in 1..=4 {
                let log = log.clone();
                scope.spawn(move || {
                    let drone = Drone::new(n.to_string(), format!("Drone-{}", n), 70.0);
                    let mut state = DroneFlightState::default();
                    for i in 0..100 {
                        log.record(&drone, &mut state, format!("event {}", i), LogData::new());
                    }
                });
            }
        });

        let ids: Vec<u64> = log.all().iter().map(|e| e.id).collect();
        assert_eq!(ids.len(), 400);
        assert!(ids.windows(2).all(|pair| pair[0] == pair[1] + 1));
        assert_eq!(ids.last(), Some(&1));
    }

    #[tokio::test]
    async fn test_events_published() {
        let (log, bus) = log(10, 10);
        let mut rx = bus.subscribe();
        let drone = Drone::new("4", "Drone-4", 72.0);
        let mut state = DroneFlightState::default();

        log.record(&drone, &mut state, "Takeoff", LogData::new());
        log.clear();

        assert_eq!(rx.try_recv().unwrap().event_type, EventType::LogAppended);
        assert_eq!(rx.try_recv().unwrap().event_type, EventType::LogCleared);
        assert!(log.is_empty());
        assert_eq!(state.flight_log.len(), 1);
    }
}
