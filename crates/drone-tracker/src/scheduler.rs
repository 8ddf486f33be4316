//! Per-drone flight timers and the phase transitions they drive
//!
//! Every drone owns a [`FlightTimer`]. Arming a timer cancels the previous
//! one and bumps the drone's generation; a task that wakes up with an old
//! generation discards itself without touching state.

use crate::engine;
use crate::{Fleet, TrackedDrone};
use chrono::Utc;
use drone_core::{DroneId, Event, FlightStatus, LandingReason, LogData, MissionParameters};

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep};
use tracing::{debug, warn};

/// The single pending timer of one drone
#[derive(Debug, Default)]
pub(crate) struct FlightTimer {
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

impl FlightTimer {
    /// Invalidate and abort whatever is pending
    pub(crate) fn cancel(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    fn arm<F>(&mut self, task: impl FnOnce(u64) -> F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        let token = self.generation;
        self.handle = Some(tokio::spawn(task(token)));
    }

    fn is_current(&self, token: u64) -> bool {
        self.generation == token
    }

    /// Forget the handle of the task that is running right now, so re-arming
    /// from inside it does not abort the caller
    fn detach(&mut self) {
        self.handle.take();
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.handle.is_some()
    }
}

impl Fleet {
    /// Validated launch: enter TAKEOFF and schedule the climb
    pub(crate) fn launch(self: &Arc<Self>, tracked: &mut TrackedDrone, params: MissionParameters) {
        let state = &mut tracked.state;
        state.speed = params.optimal_speed;
        state.altitude = self.config.takeoff_altitude_m;
        state.mission_elapsed_time = 0.0;
        state.current_waypoint_index = 0;
        state.flight_progress = 0.0;
        state.launch_battery = state.battery;
        state.landing_reason = None;
        state.mission_started_at = Some(Utc::now());
        state.mission_ended_at = None;
        if let [first, second, ..] = state.path.as_slice() {
            state.heading = first.bearing_to(second);
        }

        let data = LogData::new()
            .with_rounded("distance", params.total_distance)
            .with("waypoints", params.waypoints)
            .with_rounded("speed", params.optimal_speed)
            .with_rounded("estimatedTime", params.estimated_time)
            .with_rounded("batteryConsumption", params.battery_consumption);
        state.mission_parameters = Some(params);

        self.set_status(tracked, FlightStatus::Takeoff);
        self.record(tracked, "Takeoff started", data);
        self.arm_takeoff(tracked);
    }

    fn arm_takeoff(self: &Arc<Self>, tracked: &mut TrackedDrone) {
        let fleet = Arc::clone(self);
        let id = tracked.drone.id.clone();
        tracked.timer.arm(move |token| takeoff_timer(fleet, id, token));
    }

    /// Start or restart the tick loop from the accumulated flight time
    pub(crate) fn arm_cruise(self: &Arc<Self>, tracked: &mut TrackedDrone) {
        let fleet = Arc::clone(self);
        let id = tracked.drone.id.clone();
        let flown = Duration::from_secs_f64(tracked.state.mission_elapsed_time.max(0.0) / 1000.0);
        tracked.timer.arm(move |token| cruise_timer(fleet, id, token, flown));
    }

    fn arm_landing(self: &Arc<Self>, tracked: &mut TrackedDrone) {
        let fleet = Arc::clone(self);
        let id = tracked.drone.id.clone();
        tracked.timer.arm(move |token| landing_timer(fleet, id, token));
    }

    fn finish_takeoff(self: &Arc<Self>, tracked: &mut TrackedDrone) {
        tracked.state.altitude = self.config.cruise_altitude_m.min(tracked.drone.max_altitude);

        let data = LogData::new().with_rounded("altitude", tracked.state.altitude);
        self.set_status(tracked, FlightStatus::Flying);
        self.record(tracked, "Cruise altitude reached", data);
        self.publish_progress(tracked);
        self.arm_cruise(tracked);
    }

    /// Write one simulation step. Returns false once the tick loop must end.
    fn apply_tick(self: &Arc<Self>, tracked: &mut TrackedDrone, elapsed: Duration) -> bool {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        let state = &tracked.state;
        let outcome = state.mission_parameters.as_ref().and_then(|params| {
            engine::advance(params, &state.path, f64::from(state.launch_battery), elapsed_ms)
        });

        let Some(outcome) = outcome else {
            warn!(drone = %tracked.drone.id, "No flyable plan while FLYING, landing in place");
            self.begin_landing(tracked, LandingReason::RouteComplete);
            self.publish_progress(tracked);
            return false;
        };

        let sample = outcome.sample;
        let state = &mut tracked.state;
        state.position = Some(sample.position);
        state.heading = sample.heading;
        state.current_waypoint_index = sample.segment_index;
        state.flight_progress = sample.flight_progress;
        state.battery = state.battery.min(battery_percent(sample.battery));
        state.mission_elapsed_time = sample.elapsed;

        if let Some(reason) = outcome.landing {
            self.begin_landing(tracked, reason);
        }
        self.publish_progress(tracked);

        outcome.landing.is_none()
    }

    fn begin_landing(self: &Arc<Self>, tracked: &mut TrackedDrone, reason: LandingReason) {
        tracked.timer.detach();

        let state = &mut tracked.state;
        state.landing_reason = Some(reason);
        state.speed = self.config.descent_speed_kmh;
        state.altitude = self.config.landing_altitude_m;

        let data = LogData::new()
            .with_rounded("progress", state.flight_progress)
            .with("battery", state.battery)
            .with("reason", reason.to_string());
        let message = match reason {
            LandingReason::RouteComplete => "Route complete, landing",
            LandingReason::BatteryCritical => "Battery critical, emergency landing",
        };

        self.set_status(tracked, FlightStatus::Landing);
        self.record(tracked, message, data);
        self.arm_landing(tracked);
    }

    fn finish_landing(self: &Arc<Self>, tracked: &mut TrackedDrone) {
        let state = &mut tracked.state;
        if state.landing_reason == Some(LandingReason::RouteComplete) {
            if let Some(last) = state.path.last() {
                state.position = Some(*last);
            }
        }
        state.speed = 0.0;
        state.altitude = 0.0;
        state.current_waypoint_index = 0;
        state.flight_progress = 100.0;
        state.mission_ended_at = Some(Utc::now());

        let distance = state
            .mission_parameters
            .take()
            .map(|p| p.total_distance)
            .unwrap_or_default();
        let data = LogData::new()
            .with_rounded("distance", distance)
            .with_rounded("flightTime", state.mission_elapsed_time / 1000.0)
            .with("battery", state.battery)
            .with("emergency", state.landing_reason == Some(LandingReason::BatteryCritical));

        self.set_status(tracked, FlightStatus::Completed);
        self.record(tracked, "Mission completed", data);
        self.publish_progress(tracked);
    }

    pub(crate) fn publish_progress(&self, tracked: &TrackedDrone) {
        self.bus.publish(Event::flight_progress(tracked.snapshot()));
    }
}

fn battery_percent(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}

async fn takeoff_timer(fleet: Arc<Fleet>, id: DroneId, token: u64) {
    sleep(fleet.config.takeoff_delay).await;

    let Some(mut entry) = fleet.drones.get_mut(&id) else {
        return;
    };
    let tracked = entry.value_mut();
    if !tracked.timer.is_current(token) {
        debug!(drone = %id, "Discarding stale takeoff timer");
        return;
    }
    tracked.timer.detach();
    fleet.finish_takeoff(tracked);
}

async fn cruise_timer(fleet: Arc<Fleet>, id: DroneId, token: u64, flown: Duration) {
    let period = fleet.config.tick_interval;
    let started = Instant::now();
    let mut ticker = interval_at(started + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let elapsed = flown + started.elapsed();

        let Some(mut entry) = fleet.drones.get_mut(&id) else {
            return;
        };
        let tracked = entry.value_mut();
        if !tracked.timer.is_current(token) {
            debug!(drone = %id, "Discarding stale flight tick");
            return;
        }
        if !fleet.apply_tick(tracked, elapsed) {
            return;
        }
    }
}

async fn landing_timer(fleet: Arc<Fleet>, id: DroneId, token: u64) {
    sleep(fleet.config.landing_delay).await;

    let Some(mut entry) = fleet.drones.get_mut(&id) else {
        return;
    };
    let tracked = entry.value_mut();
    if !tracked.timer.is_current(token) {
        debug!(drone = %id, "Discarding stale landing timer");
        return;
    }
    tracked.timer.detach();
    fleet.finish_landing(tracked);
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DEFAULT_MAP_CENTER, FleetController, SimulationConfig, plan_mission};
    use drone_core::{GeoPoint, LogValue};

    /// Launch drone 1 along the equator with a battery budget the planner
    /// would never hand out
    fn launch_with_budget(fleet: &FleetController, battery: u8, consumption: f64) -> DroneId {
        let id = DroneId::new("1");
        let route = [
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(0.0, 0.001),
            GeoPoint::new(0.0, 0.002),
        ];
        fleet.place_drone(&id, Some(route[0])).unwrap();
        for point in route {
            fleet.append_waypoint(&id, point).unwrap();
        }

        let mut params = plan_mission(&route, 70.0, 100.0).unwrap();
        params.battery_consumption = consumption;

        let mut entry = fleet.fleet.drones.get_mut(&id).unwrap();
        entry.state.battery = battery;
        fleet.fleet.launch(entry.value_mut(), params);
        id
    }

    #[tokio::test(start_paused = true)]
    async fn test_battery_critical_lands_in_place() {
        let fleet = FleetController::with_default_roster(SimulationConfig::default(), DEFAULT_MAP_CENTER).unwrap();
        // Draining 60% from 20% hits the floor about a third of the way along
        let id = launch_with_budget(&fleet, 20, 60.0);

        sleep(Duration::from_secs(20)).await;

        let done = fleet.drone(&id).unwrap();
        assert_eq!(done.state.flight_status, FlightStatus::Completed);
        assert_eq!(done.state.landing_reason, Some(LandingReason::BatteryCritical));
        assert!(done.state.battery <= 1);
        assert_eq!(done.state.altitude, 0.0);
        assert!(!fleet.has_pending_timer(&id).unwrap());

        // Stays where the battery gave out, short of the first waypoint
        let position = done.state.position.unwrap();
        assert!(position.lng > 0.0 && position.lng < 0.001);

        let log = fleet.mission_log(2);
        assert_eq!(log[0].message, "Mission completed");
        assert_eq!(log[0].data.get("emergency"), Some(&LogValue::Flag(true)));
        assert_eq!(log[1].message, "Battery critical, emergency landing");
        assert_eq!(
            log[1].data.get("reason"),
            Some(&LogValue::Text("BATTERY_CRITICAL".into()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_counted_while_cruising() {
        let fleet = FleetController::with_default_roster(SimulationConfig::default(), DEFAULT_MAP_CENTER).unwrap();
        let id = launch_with_budget(&fleet, 100, 2.0);

        sleep(Duration::from_millis(1900)).await;
        assert_eq!(fleet.tick_count(), 0);

        sleep(Duration::from_millis(1050)).await;
        let ticks = fleet.tick_count();
        assert!((9..=10).contains(&ticks), "ticks: {}", ticks);

        fleet.pause_flight(&id).unwrap();
        sleep(Duration::from_secs(5)).await;
        assert_eq!(fleet.tick_count(), ticks);
    }

    #[tokio::test]
    async fn test_arm_replaces_previous_generation() {
        let mut timer = FlightTimer::default();

        timer.arm(|_| async {});
        let first = timer.generation;
        timer.arm(|_| async {});

        assert!(timer.is_armed());
        assert!(!timer.is_current(first));
        assert!(timer.is_current(timer.generation));
    }

    #[tokio::test]
    async fn test_cancel_invalidates_token() {
        let mut timer = FlightTimer::default();
        timer.arm(|_| std::future::pending());
        let token = timer.generation;

        timer.cancel();

        assert!(!timer.is_armed());
        assert!(!timer.is_current(token));
    }

    #[test]
    fn test_battery_percent_rounding() {
        assert_eq!(battery_percent(97.78), 98);
        assert_eq!(battery_percent(-3.0), 0);
        assert_eq!(battery_percent(0.4), 0);
    }
}
