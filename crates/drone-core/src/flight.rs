//! Flight phases, mission parameters and per-drone mutable flight state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

use crate::{GeoPoint, LogEntry};

/// Battery margin (percent) that must remain after a planned mission
pub const BATTERY_RESERVE_PERCENT: f64 = 10.0;

/// Remaining battery (percent) at or below which the drone lands immediately
pub const EMERGENCY_BATTERY_PERCENT: f64 = 1.0;

/// Battery cost model: one percent per this many meters flown
pub const METERS_PER_BATTERY_PERCENT: f64 = 100.0;

/// Shortest simulated duration of a single route segment
pub const MIN_SEGMENT_TIME_MS: f64 = 1000.0;

/// Last-segment progress treated as arrival
pub const COMPLETION_THRESHOLD: f64 = 0.99;

/// Phase of the flight state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlightStatus {
    /// On the ground, ready for a new mission
    #[default]
    Idle,
    /// Climbing to cruise altitude
    Takeoff,
    /// Following the route; the tick loop is running
    Flying,
    /// Descending at the end of the mission
    Landing,
    /// Airborne with the tick loop suspended
    Paused,
    /// Mission finished; a new flight may be started
    Completed,
}

impl FlightStatus {
    /// Any phase in which the drone is off the ground
    pub fn is_airborne(&self) -> bool {
        matches!(
            self,
            FlightStatus::Takeoff | FlightStatus::Flying | FlightStatus::Landing | FlightStatus::Paused
        )
    }

    /// Phases from which a new flight may be launched
    pub fn can_launch(&self) -> bool {
        matches!(self, FlightStatus::Idle | FlightStatus::Completed)
    }
}

impl fmt::Display for FlightStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlightStatus::Idle => write!(f, "IDLE"),
            FlightStatus::Takeoff => write!(f, "TAKEOFF"),
            FlightStatus::Flying => write!(f, "FLYING"),
            FlightStatus::Landing => write!(f, "LANDING"),
            FlightStatus::Paused => write!(f, "PAUSED"),
            FlightStatus::Completed => write!(f, "COMPLETED"),
        }
    }
}

/// Why a flight went into its landing phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LandingReason {
    /// The route was flown to the end
    RouteComplete,
    /// Battery dropped to the emergency floor
    BatteryCritical,
}

impl fmt::Display for LandingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LandingReason::RouteComplete => write!(f, "ROUTE_COMPLETE"),
            LandingReason::BatteryCritical => write!(f, "BATTERY_CRITICAL"),
        }
    }
}

/// Flight plan derived from a path.
///
/// Always replaced wholesale, never edited in place. `total_time` (ms) paces
/// the simulation; `estimated_time` (s) is for display only and can be
/// shorter because segment times are floored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionParameters {
    /// Route length in meters, rounded
    pub total_distance: f64,
    /// Cruise speed in km/h, rounded
    pub optimal_speed: f64,
    /// Display flight time in seconds, rounded
    pub estimated_time: f64,
    /// Battery cost in percent, capped so the reserve is never touched
    pub battery_consumption: f64,
    /// Uncapped battery cost in percent for the full route
    pub battery_required: f64,
    /// Number of points in the path
    pub waypoints: usize,
    /// Per-segment distances in meters
    pub distances: Vec<f64>,
    /// Per-segment durations in milliseconds
    pub segment_times: Vec<f64>,
    /// Sum of `segment_times` in milliseconds
    pub total_time: f64,
}

impl MissionParameters {
    /// Cumulative segment end times in milliseconds
    pub fn segment_end_times(&self) -> impl Iterator<Item = f64> + '_ {
        self.segment_times.iter().scan(0.0, |acc, t| {
            *acc += t;
            Some(*acc)
        })
    }

    /// Whether `battery` covers the full route plus the reserve floor
    pub fn is_affordable(&self, battery: f64) -> bool {
        battery >= self.battery_required + BATTERY_RESERVE_PERCENT
    }
}

/// Mutable flight state, one per drone, owned by the fleet store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DroneFlightState {
    /// Current interpolated position; `None` while parked off the map
    pub position: Option<GeoPoint>,
    /// Route for the next or current mission
    pub path: Vec<GeoPoint>,
    pub is_visible: bool,
    /// Battery percentage (0-100)
    pub battery: u8,
    pub flight_status: FlightStatus,
    pub mission_parameters: Option<MissionParameters>,
    /// Simulated flight time accumulated so far, survives pause/resume
    pub mission_elapsed_time: f64,
    pub current_waypoint_index: usize,
    /// Route progress percentage (0-100)
    pub flight_progress: f64,
    /// Current speed in km/h
    pub speed: f64,
    /// Current altitude in meters
    pub altitude: f64,
    /// Heading in degrees (0-360)
    pub heading: f64,
    /// Battery at the moment the current flight was launched
    pub launch_battery: u8,
    pub landing_reason: Option<LandingReason>,
    pub mission_started_at: Option<DateTime<Utc>>,
    pub mission_ended_at: Option<DateTime<Utc>>,
    /// Most recent first
    pub flight_log: VecDeque<LogEntry>,
}

impl Default for DroneFlightState {
    fn default() -> Self {
        Self {
            position: None,
            path: Vec::new(),
            is_visible: false,
            battery: 100,
            flight_status: FlightStatus::default(),
            mission_parameters: None,
            mission_elapsed_time: 0.0,
            current_waypoint_index: 0,
            flight_progress: 0.0,
            speed: 0.0,
            altitude: 0.0,
            heading: 0.0,
            launch_battery: 100,
            landing_reason: None,
            mission_started_at: None,
            mission_ended_at: None,
            flight_log: VecDeque::new(),
        }
    }
}

impl DroneFlightState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derived from the phase: TAKEOFF, FLYING, LANDING and PAUSED count as flying
    pub fn is_flying(&self) -> bool {
        self.flight_status.is_airborne()
    }

    /// Reset to ground defaults. The per-drone log is kept.
    pub fn reset(&mut self, position: Option<GeoPoint>) {
        let flight_log = std::mem::take(&mut self.flight_log);
        *self = Self {
            is_visible: position.is_some(),
            position,
            flight_log,
            ..Self::default()
        };
    }

    /// Zero out motion fields after a forced stop
    pub fn clear_motion(&mut self) {
        self.speed = 0.0;
        self.altitude = 0.0;
        self.flight_progress = 0.0;
        self.current_waypoint_index = 0;
        self.mission_elapsed_time = 0.0;
    }

    /// Prepend a log entry, keeping at most `capacity` entries
    pub fn push_log(&mut self, entry: LogEntry, capacity: usize) {
        self.flight_log.push_front(entry);
        self.flight_log.truncate(capacity);
    }
}

// ============================================================================
// TESTS
// ============================================================================
