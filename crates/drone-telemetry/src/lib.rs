//! # Drone Telemetry - Metrics & Observability
//!
//! Prometheus metrics exporter for the drone fleet console.
//! Provides real-time metrics for:
//! - Drone flight phase, battery and progress
//! - Flight outcomes and rejected commands
//! - WebSocket connections

use drone_core::{DroneSnapshot, Event, EventPayload, EventType, FlightStatus, LandingReason};
use prometheus::{GaugeVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry};
use tracing::info;

const FLIGHT_STATUSES: [FlightStatus; 6] = [
    FlightStatus::Idle,
    FlightStatus::Takeoff,
    FlightStatus::Flying,
    FlightStatus::Landing,
    FlightStatus::Paused,
    FlightStatus::Completed,
];

/// Metrics collector for the drone fleet
pub struct MetricsCollector {
    registry: Registry,

    // Fleet metrics
    drone_count: IntGauge,
    drones_visible: IntGauge,
    drones_airborne: IntGauge,

    // Drone metrics
    drone_status: IntGaugeVec,
    drone_battery: GaugeVec,
    drone_progress: GaugeVec,
    drone_speed: GaugeVec,
    drone_altitude: GaugeVec,

    // Flight metrics
    flights_started: IntCounter,
    flights_completed: IntCounterVec,
    flights_stopped: IntCounter,
    flight_ticks: IntCounter,
    commands_rejected: IntCounterVec,
    log_entries: IntCounter,

    // WebSocket metrics
    ws_connections: IntGauge,
}

impl MetricsCollector {
    /// Create a new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        // Fleet metrics
        let drone_count = IntGauge::new("drone_fleet_drones_total", "Total number of drones in the roster")?;
        registry.register(Box::new(drone_count.clone()))?;

        let drones_visible = IntGauge::new("drone_fleet_drones_visible", "Drones placed on the map")?;
        registry.register(Box::new(drones_visible.clone()))?;

        let drones_airborne = IntGauge::new("drone_fleet_drones_airborne", "Drones in an airborne phase")?;
        registry.register(Box::new(drones_airborne.clone()))?;

        // Drone metrics
        let drone_status = IntGaugeVec::new(
            Opts::new("drone_fleet_drone_status", "Current flight phase by drone (1 = active)"),
            &["drone_id", "status"],
        )?;
        registry.register(Box::new(drone_status.clone()))?;

        let drone_battery = GaugeVec::new(
            Opts::new("drone_fleet_drone_battery_percent", "Drone battery level"),
            &["drone_id"],
        )?;
        registry.register(Box::new(drone_battery.clone()))?;

        let drone_progress = GaugeVec::new(
            Opts::new("drone_fleet_drone_progress_percent", "Route progress of the current flight"),
            &["drone_id"],
        )?;
        registry.register(Box::new(drone_progress.clone()))?;

        let drone_speed = GaugeVec::new(
            Opts::new("drone_fleet_drone_speed_kmh", "Drone speed in km/h"),
            &["drone_id"],
        )?;
        registry.register(Box::new(drone_speed.clone()))?;

        let drone_altitude = GaugeVec::new(
            Opts::new("drone_fleet_drone_altitude_meters", "Drone altitude in meters"),
            &["drone_id"],
        )?;
        registry.register(Box::new(drone_altitude.clone()))?;

        // Flight metrics
        let flights_started = IntCounter::new("drone_fleet_flights_started_total", "Flights launched")?;
        registry.register(Box::new(flights_started.clone()))?;

        let flights_completed = IntCounterVec::new(
            Opts::new("drone_fleet_flights_completed_total", "Flights completed by landing reason"),
            &["reason"],
        )?;
        registry.register(Box::new(flights_completed.clone()))?;

        let flights_stopped = IntCounter::new("drone_fleet_flights_stopped_total", "Flights aborted by the operator")?;
        registry.register(Box::new(flights_stopped.clone()))?;

        let flight_ticks = IntCounter::new("drone_fleet_flight_ticks_total", "Cruise ticks applied by the engine")?;
        registry.register(Box::new(flight_ticks.clone()))?;

        let commands_rejected = IntCounterVec::new(
            Opts::new("drone_fleet_commands_rejected_total", "Commands refused by the engine"),
            &["kind"],
        )?;
        registry.register(Box::new(commands_rejected.clone()))?;

        let log_entries = IntCounter::new("drone_fleet_log_entries_total", "Mission log entries written")?;
        registry.register(Box::new(log_entries.clone()))?;

        // WebSocket metrics
        let ws_connections = IntGauge::new("drone_fleet_ws_connections", "Active WebSocket connections")?;
        registry.register(Box::new(ws_connections.clone()))?;

        info!("Metrics collector initialized");

        Ok(Self {
            registry,
            drone_count,
            drones_visible,
            drones_airborne,
            drone_status,
            drone_battery,
            drone_progress,
            drone_speed,
            drone_altitude,
            flights_started,
            flights_completed,
            flights_stopped,
            flight_ticks,
            commands_rejected,
            log_entries,
            ws_connections,
        })
    }

    /// Get Prometheus registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Export metrics in Prometheus text format
    pub fn export(&self) -> prometheus::Result<String> {
        use prometheus::Encoder;

        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    // ========================================================================
    // FLEET METRICS
    // ========================================================================

    /// Refresh fleet-wide gauges and every drone's gauges
    pub fn update_fleet(&self, drones: &[DroneSnapshot]) {
        self.drone_count.set(drones.len() as i64);
        self.drones_visible
            .set(drones.iter().filter(|d| d.state.is_visible).count() as i64);
        self.drones_airborne
            .set(drones.iter().filter(|d| d.is_flying).count() as i64);

        for drone in drones {
            self.update_drone(drone);
        }
    }

    /// Update one drone's gauges
    pub fn update_drone(&self, drone: &DroneSnapshot) {
        let id = drone.id().as_str();

        for status in FLIGHT_STATUSES {
            let active = drone.state.flight_status == status;
            let label = status.to_string();
            self.drone_status
                .with_label_values(&[id, label.as_str()])
                .set(i64::from(active));
        }

        self.drone_battery
            .with_label_values(&[id])
            .set(f64::from(drone.state.battery));

        self.drone_progress
            .with_label_values(&[id])
            .set(drone.state.flight_progress);

        self.drone_speed
            .with_label_values(&[id])
            .set(drone.state.speed);

        self.drone_altitude
            .with_label_values(&[id])
            .set(drone.state.altitude);
    }

    // ========================================================================
    // FLIGHT METRICS
    // ========================================================================

    /// Fold one fleet event into the counters and gauges
    pub fn record_event(&self, event: &Event) {
        match (&event.event_type, &event.payload) {
            (EventType::FlightStatusChanged, EventPayload::FlightStatus(change)) => {
                match change.new_status {
                    FlightStatus::Takeoff => self.flights_started.inc(),
                    FlightStatus::Idle if change.old_status.is_airborne() => self.flights_stopped.inc(),
                    _ => {}
                }
            }
            (EventType::FlightProgress, EventPayload::Drone(snapshot)) => {
                if snapshot.state.flight_status == FlightStatus::Completed {
                    let reason = match snapshot.state.landing_reason {
                        Some(LandingReason::BatteryCritical) => "battery_critical",
                        _ => "route_complete",
                    };
                    self.flights_completed.with_label_values(&[reason]).inc();
                }
                self.update_drone(snapshot);
            }
            (_, EventPayload::Drone(snapshot)) => self.update_drone(snapshot),
            (EventType::LogAppended, _) => self.log_entries.inc(),
            _ => {}
        }
    }

    /// Catch the tick counter up with the engine's running total
    pub fn sync_flight_ticks(&self, total: u64) {
        let seen = self.flight_ticks.get();
        if total > seen {
            self.flight_ticks.inc_by(total - seen);
        }
    }

    /// Record a command refused by the engine
    pub fn record_rejection(&self, kind: &str) {
        self.commands_rejected.with_label_values(&[kind]).inc();
    }

    // ========================================================================
    // WEBSOCKET METRICS
    // ========================================================================

    /// Set WebSocket connection count
    pub fn set_ws_connections(&self, count: i64) {
        self.ws_connections.set(count);
    }
}

// ============================================================================
// TESTS
// ============================================================================
