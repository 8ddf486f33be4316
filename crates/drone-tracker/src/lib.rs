//! # Drone Tracker - Fleet Simulation Engine
//!
//! Owns the flight state of every drone in the fleet and drives simulated
//! missions: route editing, mission planning, the per-drone flight state
//! machine and the mission log.
//!
//! ## Features
//! - Mission planning from waypoint paths
//! - Timer-driven flight simulation with pause/resume
//! - Battery drain with emergency landing
//! - Fleet-wide and per-drone mission logs
//! - Event broadcasting for real-time clients

pub mod engine;
pub mod error;
pub mod events;
pub mod log;
pub mod mission;
pub mod roster;
mod scheduler;
pub mod state;

pub use engine::{FlightSample, TickOutcome, advance};
pub use error::{FlightRejection, TrackerError, TrackerResult};
pub use events::EventBus;
pub use log::MissionLog;
pub use mission::plan_mission;
pub use roster::{DEFAULT_MAP_CENTER, default_roster, parking_position};
pub use state::{FleetState, FleetStats};

use drone_core::{
    BATTERY_RESERVE_PERCENT, CoreError, CoreResult, Drone, DroneFlightState, DroneId, DroneSnapshot,
    Event, FlightCommand, FlightCommandType, FlightStatus, GeoPoint, LogData, LogEntry,
    MissionParameters,
};
use scheduler::FlightTimer;

use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Simulation configuration
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Cadence of the flight tick loop
    pub tick_interval: Duration,
    /// Time spent in TAKEOFF before cruising
    pub takeoff_delay: Duration,
    /// Time spent in LANDING before the mission completes
    pub landing_delay: Duration,
    pub takeoff_altitude_m: f64,
    pub cruise_altitude_m: f64,
    pub landing_altitude_m: f64,
    pub descent_speed_kmh: f64,
    /// Per-drone log ring size
    pub drone_log_capacity: usize,
    /// Fleet-wide log ring size
    pub global_log_capacity: usize,
    /// Event bus buffer
    pub event_capacity: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(100),
            takeoff_delay: Duration::from_millis(2000),
            landing_delay: Duration::from_millis(3000),
            takeoff_altitude_m: 10.0,
            cruise_altitude_m: 100.0,
            landing_altitude_m: 20.0,
            descent_speed_kmh: 10.0,
            drone_log_capacity: 20,
            global_log_capacity: 100,
            event_capacity: 1024,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> CoreResult<()> {
        if self.tick_interval.is_zero() {
            return Err(CoreError::configuration("tick interval must be positive"));
        }
        if self.drone_log_capacity == 0 || self.global_log_capacity == 0 {
            return Err(CoreError::configuration("log capacities must be positive"));
        }
        if self.event_capacity == 0 {
            return Err(CoreError::configuration("event capacity must be positive"));
        }
        Ok(())
    }
}

/// One drone as held by the fleet store
#[derive(Debug)]
pub struct TrackedDrone {
    /// Static capability
    pub drone: Drone,
    /// Mutable flight state
    pub state: DroneFlightState,
    /// Where `place` puts the drone when no position is given
    pub parking: GeoPoint,
    order: usize,
    timer: FlightTimer,
}

impl TrackedDrone {
    fn new(drone: Drone, parking: GeoPoint, order: usize) -> Self {
        Self {
            drone,
            state: DroneFlightState::default(),
            parking,
            order,
            timer: FlightTimer::default(),
        }
    }

    pub fn snapshot(&self) -> DroneSnapshot {
        DroneSnapshot::new(self.drone.clone(), self.state.clone())
    }

    /// Whether a takeoff, tick or landing timer is pending
    pub fn has_pending_timer(&self) -> bool {
        self.timer.is_armed()
    }
}

/// Shared fleet store; timer tasks hold an `Arc` to it
struct Fleet {
    config: SimulationConfig,
    drones: DashMap<DroneId, TrackedDrone>,
    log: MissionLog,
    bus: EventBus,
    /// Cruise ticks applied across the fleet
    ticks: AtomicU64,
}

impl Fleet {
    fn set_status(&self, tracked: &mut TrackedDrone, status: FlightStatus) {
        let old = tracked.state.flight_status;
        if old == status {
            return;
        }
        tracked.state.flight_status = status;
        debug!(drone = %tracked.drone.id, "Flight status {} -> {}", old, status);
        self.bus
            .publish(Event::flight_status_changed(tracked.drone.id.clone(), old, status));
    }

    fn record(&self, tracked: &mut TrackedDrone, message: &str, data: LogData) -> LogEntry {
        self.log.record(&tracked.drone, &mut tracked.state, message, data)
    }

    /// Recompute the mission preview after a route edit on the ground
    fn refresh_plan(&self, tracked: &mut TrackedDrone) {
        tracked.state.mission_parameters = plan_mission(
            &tracked.state.path,
            tracked.drone.max_speed,
            f64::from(tracked.state.battery),
        );
    }
}

/// Main fleet coordinator
#[derive(Clone)]
pub struct FleetController {
    fleet: Arc<Fleet>,
}

impl FleetController {
    /// Create a controller for `roster`, parking drones diagonally off `map_center`
    pub fn new(config: SimulationConfig, roster: Vec<Drone>, map_center: GeoPoint) -> TrackerResult<Self> {
        config.validate()?;
        map_center.validate()?;

        let bus = EventBus::new(config.event_capacity);
        let log = MissionLog::new(config.global_log_capacity, config.drone_log_capacity, bus.clone());

        let drones = DashMap::new();
        for (order, drone) in roster.into_iter().enumerate() {
            let parking = parking_position(map_center, order);
            drones.insert(drone.id.clone(), TrackedDrone::new(drone, parking, order));
        }

        info!("Fleet controller ready with {} drones", drones.len());

        Ok(Self {
            fleet: Arc::new(Fleet {
                config,
                drones,
                log,
                bus,
                ticks: AtomicU64::new(0),
            }),
        })
    }

    /// Controller for the built-in five-drone fleet
    pub fn with_default_roster(config: SimulationConfig, map_center: GeoPoint) -> TrackerResult<Self> {
        Self::new(config, default_roster(), map_center)
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.fleet.config
    }

    /// Subscribe to fleet events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.fleet.bus.subscribe()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.fleet.bus
    }

    fn with_drone<T>(
        &self,
        id: &DroneId,
        op: impl FnOnce(&Arc<Fleet>, &mut TrackedDrone) -> TrackerResult<T>,
    ) -> TrackerResult<T> {
        let mut entry = self
            .fleet
            .drones
            .get_mut(id)
            .ok_or_else(|| TrackerError::DroneNotFound(id.clone()))?;

        let result = op(&self.fleet, entry.value_mut());
        if let Err(TrackerError::Rejected(reason)) = &result {
            warn!(drone = %id, "Command rejected: {}", reason);
        }
        result
    }

    // ------------------------------------------------------------------------
    // Map placement
    // ------------------------------------------------------------------------

    /// Put a drone on the map, at its parking spot when no position is given.
    /// Any flight in progress is cancelled and the flight state reset.
    pub fn place_drone(&self, id: &DroneId, position: Option<GeoPoint>) -> TrackerResult<DroneSnapshot> {
        self.with_drone(id, |fleet, tracked| {
            let position = position.unwrap_or(tracked.parking);
            position.validate()?;

            tracked.timer.cancel();
            fleet.set_status(tracked, FlightStatus::Idle);
            tracked.state.reset(Some(position));

            let data = LogData::new()
                .with("position", position)
                .with("battery", tracked.state.battery);
            fleet.record(tracked, "Placed on map", data);

            let snapshot = tracked.snapshot();
            fleet.bus.publish(Event::drone_placed(snapshot.clone()));
            Ok(snapshot)
        })
    }

    /// Take a drone off the map, cancelling any flight and clearing its route
    pub fn remove_drone(&self, id: &DroneId) -> TrackerResult<DroneSnapshot> {
        self.with_drone(id, |fleet, tracked| {
            tracked.timer.cancel();
            let was_flying = tracked.state.is_flying();
            fleet.set_status(tracked, FlightStatus::Idle);
            tracked.state.reset(None);

            let data = LogData::new().with("wasFlying", was_flying);
            fleet.record(tracked, "Removed from map", data);

            let snapshot = tracked.snapshot();
            fleet.bus.publish(Event::drone_removed(snapshot.clone()));
            Ok(snapshot)
        })
    }

    /// Move a grounded drone to a new spot
    pub fn reposition_drone(&self, id: &DroneId, position: GeoPoint) -> TrackerResult<DroneSnapshot> {
        self.with_drone(id, |fleet, tracked| {
            position.validate()?;
            let status = tracked.state.flight_status;
            if !tracked.state.is_visible {
                return Err(FlightRejection::NotPlaced.into());
            }
            if !status.can_launch() {
                return Err(FlightRejection::InvalidTransition {
                    action: "reposition",
                    status,
                }
                .into());
            }

            tracked.state.position = Some(position);

            let snapshot = tracked.snapshot();
            fleet.bus.publish(Event::drone_moved(snapshot.clone()));
            Ok(snapshot)
        })
    }

    // ------------------------------------------------------------------------
    // Route editing
    // ------------------------------------------------------------------------

    /// Append a waypoint to the route of a grounded drone
    pub fn append_waypoint(&self, id: &DroneId, point: GeoPoint) -> TrackerResult<DroneSnapshot> {
        self.edit_route(id, |path| {
            point.validate()?;
            path.push(point);
            Ok(())
        })
    }

    /// Drop the last waypoint; an empty route is left as is
    pub fn undo_waypoint(&self, id: &DroneId) -> TrackerResult<DroneSnapshot> {
        self.edit_route(id, |path| {
            path.pop();
            Ok(())
        })
    }

    pub fn clear_route(&self, id: &DroneId) -> TrackerResult<DroneSnapshot> {
        self.edit_route(id, |path| {
            path.clear();
            Ok(())
        })
    }

    fn edit_route(
        &self,
        id: &DroneId,
        edit: impl FnOnce(&mut Vec<GeoPoint>) -> CoreResult<()>,
    ) -> TrackerResult<DroneSnapshot> {
        self.with_drone(id, |fleet, tracked| {
            let status = tracked.state.flight_status;
            if status.is_airborne() {
                return Err(FlightRejection::RouteLocked { status }.into());
            }

            edit(&mut tracked.state.path)?;
            fleet.refresh_plan(tracked);

            let snapshot = tracked.snapshot();
            fleet.bus.publish(Event::route_updated(snapshot.clone()));
            Ok(snapshot)
        })
    }

    /// Plan `path` for a drone without touching its state
    pub fn preview_mission(&self, id: &DroneId, path: &[GeoPoint]) -> TrackerResult<Option<MissionParameters>> {
        for point in path {
            point.validate()?;
        }
        let entry = self
            .fleet
            .drones
            .get(id)
            .ok_or_else(|| TrackerError::DroneNotFound(id.clone()))?;

        Ok(plan_mission(
            path,
            entry.drone.max_speed,
            f64::from(entry.state.battery),
        ))
    }

    // ------------------------------------------------------------------------
    // Flight control
    // ------------------------------------------------------------------------

    /// Plan the current route and launch
    pub fn start_flight(&self, id: &DroneId) -> TrackerResult<DroneSnapshot> {
        self.with_drone(id, |fleet, tracked| {
            let status = tracked.state.flight_status;
            if status.is_airborne() {
                return Err(FlightRejection::AlreadyFlying { status }.into());
            }
            if !tracked.state.is_visible || tracked.state.position.is_none() {
                return Err(FlightRejection::NotPlaced.into());
            }

            let waypoints = tracked.state.path.len();
            let battery = tracked.state.battery;
            let params = plan_mission(&tracked.state.path, tracked.drone.max_speed, f64::from(battery))
                .ok_or(FlightRejection::InsufficientRoute { waypoints })?;

            if !params.is_affordable(f64::from(battery)) {
                return Err(FlightRejection::InsufficientBattery {
                    available: battery,
                    required: params.battery_required + BATTERY_RESERVE_PERCENT,
                }
                .into());
            }

            fleet.launch(tracked, params);
            fleet.publish_progress(tracked);
            Ok(tracked.snapshot())
        })
    }

    /// Suspend the tick loop, keeping accumulated flight time
    pub fn pause_flight(&self, id: &DroneId) -> TrackerResult<DroneSnapshot> {
        self.with_drone(id, |fleet, tracked| {
            let status = tracked.state.flight_status;
            if status != FlightStatus::Flying {
                return Err(FlightRejection::InvalidTransition { action: "pause", status }.into());
            }

            tracked.timer.cancel();
            fleet.set_status(tracked, FlightStatus::Paused);

            let data = LogData::new()
                .with_rounded("progress", tracked.state.flight_progress)
                .with("battery", tracked.state.battery);
            fleet.record(tracked, "Flight paused", data);
            fleet.publish_progress(tracked);
            Ok(tracked.snapshot())
        })
    }

    pub fn resume_flight(&self, id: &DroneId) -> TrackerResult<DroneSnapshot> {
        self.with_drone(id, |fleet, tracked| {
            let status = tracked.state.flight_status;
            if status != FlightStatus::Paused {
                return Err(FlightRejection::InvalidTransition { action: "resume", status }.into());
            }

            fleet.set_status(tracked, FlightStatus::Flying);

            let data = LogData::new().with_rounded("progress", tracked.state.flight_progress);
            fleet.record(tracked, "Flight resumed", data);
            fleet.arm_cruise(tracked);
            fleet.publish_progress(tracked);
            Ok(tracked.snapshot())
        })
    }

    /// Abort an active flight and return to IDLE without completing the mission
    pub fn stop_flight(&self, id: &DroneId) -> TrackerResult<DroneSnapshot> {
        self.with_drone(id, |fleet, tracked| {
            let status = tracked.state.flight_status;
            if !status.is_airborne() {
                return Err(FlightRejection::InvalidTransition { action: "stop", status }.into());
            }

            tracked.timer.cancel();

            let data = LogData::new()
                .with_rounded("progress", tracked.state.flight_progress)
                .with("battery", tracked.state.battery)
                .with("phase", status.to_string());

            let state = &mut tracked.state;
            state.clear_motion();
            state.mission_parameters = None;
            state.landing_reason = None;
            state.mission_ended_at = Some(Utc::now());

            fleet.set_status(tracked, FlightStatus::Idle);
            fleet.record(tracked, "Flight stopped", data);
            fleet.publish_progress(tracked);
            Ok(tracked.snapshot())
        })
    }

    /// Dispatch a command received from a client
    pub fn apply(&self, command: &FlightCommand) -> TrackerResult<DroneSnapshot> {
        let id = &command.drone_id;
        match &command.command {
            FlightCommandType::Place { position } => self.place_drone(id, *position),
            FlightCommandType::Remove => self.remove_drone(id),
            FlightCommandType::Reposition { position } => self.reposition_drone(id, *position),
            FlightCommandType::AppendWaypoint { point } => self.append_waypoint(id, *point),
            FlightCommandType::UndoWaypoint => self.undo_waypoint(id),
            FlightCommandType::ClearRoute => self.clear_route(id),
            FlightCommandType::Start => self.start_flight(id),
            FlightCommandType::Pause => self.pause_flight(id),
            FlightCommandType::Resume => self.resume_flight(id),
            FlightCommandType::Stop => self.stop_flight(id),
        }
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    pub fn drone(&self, id: &DroneId) -> TrackerResult<DroneSnapshot> {
        self.fleet
            .drones
            .get(id)
            .map(|entry| entry.snapshot())
            .ok_or_else(|| TrackerError::DroneNotFound(id.clone()))
    }

    /// All drones in roster order
    pub fn drones(&self) -> Vec<DroneSnapshot> {
        let mut drones: Vec<(usize, DroneSnapshot)> = self
            .fleet
            .drones
            .iter()
            .map(|entry| (entry.order, entry.snapshot()))
            .collect();
        drones.sort_by_key(|(order, _)| *order);
        drones.into_iter().map(|(_, snapshot)| snapshot).collect()
    }

    pub fn drone_count(&self) -> usize {
        self.fleet.drones.len()
    }

    /// Total cruise ticks applied since the controller was created
    pub fn tick_count(&self) -> u64 {
        self.fleet.ticks.load(Ordering::Relaxed)
    }

    /// Whether any timer is still pending for the drone
    pub fn has_pending_timer(&self, id: &DroneId) -> TrackerResult<bool> {
        self.fleet
            .drones
            .get(id)
            .map(|entry| entry.has_pending_timer())
            .ok_or_else(|| TrackerError::DroneNotFound(id.clone()))
    }

    pub fn state(&self) -> FleetState {
        FleetState::from_data(self.drones(), self.fleet.log.all())
    }

    /// Newest-first fleet log, at most `limit` entries
    pub fn mission_log(&self, limit: usize) -> Vec<LogEntry> {
        self.fleet.log.recent(limit)
    }

    pub fn clear_mission_log(&self) {
        self.fleet.log.clear();
        info!("Mission log cleared");
    }

    /// Cancel every pending timer, e.g. on shutdown
    pub fn halt(&self) {
        for mut entry in self.fleet.drones.iter_mut() {
            entry.timer.cancel();
        }
        info!("All flight timers cancelled");
    }
}

// ============================================================================
// TESTS
// ============================================================================
