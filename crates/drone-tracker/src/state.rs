//! Fleet state snapshots

use drone_core::{DroneSnapshot, FlightStatus, FullStateEvent, LogEntry};
use serde::{Deserialize, Serialize};

/// Complete fleet state snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetState {
    /// All drones in roster order
    pub drones: Vec<DroneSnapshot>,
    /// Fleet-wide log, newest first
    pub mission_log: Vec<LogEntry>,
    /// Timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Statistics
    pub stats: FleetStats,
}

impl FleetState {
    /// Create empty state
    pub fn empty() -> Self {
        Self::from_data(Vec::new(), Vec::new())
    }

    /// Create from drone snapshots and log entries
    pub fn from_data(drones: Vec<DroneSnapshot>, mission_log: Vec<LogEntry>) -> Self {
        let stats = FleetStats::from_drones(&drones);

        Self {
            drones,
            mission_log,
            timestamp: chrono::Utc::now(),
            stats,
        }
    }
}

impl From<FleetState> for FullStateEvent {
    fn from(state: FleetState) -> Self {
        Self {
            drones: state.drones,
            mission_log: state.mission_log,
        }
    }
}

/// Fleet statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetStats {
    pub drone_count: usize,
    pub visible_count: usize,
    pub airborne_count: usize,
    pub paused_count: usize,
    pub completed_count: usize,
}

impl FleetStats {
    pub fn from_drones(drones: &[DroneSnapshot]) -> Self {
        let with_status = |status: FlightStatus| {
            drones
                .iter()
                .filter(|d| d.state.flight_status == status)
                .count()
        };

        Self {
            drone_count: drones.len(),
            visible_count: drones.iter().filter(|d| d.state.is_visible).count(),
            airborne_count: drones.iter().filter(|d| d.is_flying).count(),
            paused_count: with_status(FlightStatus::Paused),
            completed_count: with_status(FlightStatus::Completed),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
