//! End-to-end flight scenarios on a paused tokio clock

use drone_core::{DroneId, EventPayload, EventType, FlightStatus, GeoPoint, LandingReason};
use drone_tracker::{DEFAULT_MAP_CENTER, FleetController, FlightRejection, SimulationConfig};
use std::time::Duration;
use tokio::time::sleep;

fn fleet() -> FleetController {
    FleetController::with_default_roster(SimulationConfig::default(), DEFAULT_MAP_CENTER).unwrap()
}

fn equator_route() -> [GeoPoint; 3] {
    [
        GeoPoint::new(0.0, 0.0),
        GeoPoint::new(0.0, 0.001),
        GeoPoint::new(0.0, 0.002),
    ]
}

/// Place drone 1 at the route start and draw the route
fn prepare(fleet: &FleetController) -> DroneId {
    let id = DroneId::new("1");
    let route = equator_route();
    fleet.place_drone(&id, Some(route[0])).unwrap();
    for point in route {
        fleet.append_waypoint(&id, point).unwrap();
    }
    id
}

fn status(fleet: &FleetController, id: &DroneId) -> FlightStatus {
    fleet.drone(id).unwrap().state.flight_status
}

#[tokio::test(start_paused = true)]
async fn test_full_flight_completes() {
    let fleet = fleet();
    let id = prepare(&fleet);
    let mut events = fleet.subscribe();

    let launched = fleet.start_flight(&id).unwrap();
    assert_eq!(launched.state.flight_status, FlightStatus::Takeoff);
    assert!(launched.is_flying);
    assert_eq!(launched.state.altitude, 10.0);

    sleep(Duration::from_millis(2050)).await;
    let cruising = fleet.drone(&id).unwrap();
    assert_eq!(cruising.state.flight_status, FlightStatus::Flying);
    assert_eq!(cruising.state.altitude, 100.0);

    sleep(Duration::from_secs(40)).await;

    let done = fleet.drone(&id).unwrap();
    assert_eq!(done.state.flight_status, FlightStatus::Completed);
    assert!(!done.is_flying);
    assert_eq!(done.state.flight_progress, 100.0);
    assert_eq!(done.state.battery, 98);
    assert_eq!(done.state.speed, 0.0);
    assert_eq!(done.state.altitude, 0.0);
    assert_eq!(done.state.position, Some(equator_route()[2]));
    assert_eq!(done.state.landing_reason, Some(LandingReason::RouteComplete));
    assert!(done.state.mission_ended_at.is_some());
    assert!(!fleet.has_pending_timer(&id).unwrap());

    // Progress never goes back and battery never goes up
    let mut last_progress = 0.0;
    let mut last_battery = 100;
    let mut statuses = Vec::new();
    while let Ok(event) = events.try_recv() {
        match event.payload {
            EventPayload::Drone(snapshot) if event.event_type == EventType::FlightProgress => {
                assert!(snapshot.state.flight_progress >= last_progress);
                assert!(snapshot.state.battery <= last_battery);
                last_progress = snapshot.state.flight_progress;
                last_battery = snapshot.state.battery;
            }
            EventPayload::FlightStatus(change) => statuses.push(change.new_status),
            _ => {}
        }
    }
    assert_eq!(last_progress, 100.0);
    assert_eq!(
        statuses,
        vec![
            FlightStatus::Takeoff,
            FlightStatus::Flying,
            FlightStatus::Landing,
            FlightStatus::Completed
        ]
    );

    let messages: Vec<String> = fleet.mission_log(4).into_iter().map(|e| e.message).collect();
    assert_eq!(
        messages,
        vec![
            "Mission completed",
            "Route complete, landing",
            "Cruise altitude reached",
            "Takeoff started"
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_start_rejected_while_flying() {
    let fleet = fleet();
    let id = prepare(&fleet);

    fleet.start_flight(&id).unwrap();
    let err = fleet.start_flight(&id).unwrap_err();

    assert_eq!(
        err.rejection(),
        Some(&FlightRejection::AlreadyFlying {
            status: FlightStatus::Takeoff
        })
    );

    let locked = fleet.append_waypoint(&id, GeoPoint::new(1.0, 1.0)).unwrap_err();
    assert_eq!(locked.rejection().map(|r| r.kind()), Some("route_locked"));
}

#[tokio::test(start_paused = true)]
async fn test_pause_and_resume_keep_progress() {
    let fleet = fleet();
    let id = prepare(&fleet);

    fleet.start_flight(&id).unwrap();
    sleep(Duration::from_millis(7050)).await;

    let paused = fleet.pause_flight(&id).unwrap();
    assert_eq!(paused.state.flight_status, FlightStatus::Paused);
    assert!(paused.is_flying);
    let progress = paused.state.flight_progress;
    let elapsed = paused.state.mission_elapsed_time;
    assert!(progress > 0.0 && progress < 100.0);
    assert!(!fleet.has_pending_timer(&id).unwrap());

    // Nothing moves while paused
    sleep(Duration::from_secs(60)).await;
    let still = fleet.drone(&id).unwrap();
    assert_eq!(still.state.flight_status, FlightStatus::Paused);
    assert_eq!(still.state.flight_progress, progress);
    assert_eq!(still.state.mission_elapsed_time, elapsed);

    fleet.resume_flight(&id).unwrap();
    sleep(Duration::from_millis(150)).await;

    let resumed = fleet.drone(&id).unwrap();
    assert_eq!(resumed.state.flight_status, FlightStatus::Flying);
    assert!(resumed.state.flight_progress >= progress);
    assert!(resumed.state.flight_progress - progress < 2.0);
    assert!(resumed.state.mission_elapsed_time > elapsed);

    sleep(Duration::from_secs(40)).await;
    let done = fleet.drone(&id).unwrap();
    assert_eq!(done.state.flight_status, FlightStatus::Completed);
    assert_eq!(done.state.battery, 98);
}

#[tokio::test(start_paused = true)]
async fn test_stop_cancels_ticks() {
    let fleet = fleet();
    let id = prepare(&fleet);

    fleet.start_flight(&id).unwrap();
    sleep(Duration::from_millis(5000)).await;

    let stopped = fleet.stop_flight(&id).unwrap();
    assert_eq!(stopped.state.flight_status, FlightStatus::Idle);
    assert_eq!(stopped.state.flight_progress, 0.0);
    assert_eq!(stopped.state.speed, 0.0);
    assert!(stopped.state.mission_parameters.is_none());
    assert!(!fleet.has_pending_timer(&id).unwrap());

    sleep(Duration::from_secs(60)).await;

    let later = fleet.drone(&id).unwrap();
    assert_eq!(later.state.flight_status, FlightStatus::Idle);
    assert_eq!(later.state.position, stopped.state.position);
    assert_eq!(later.state.flight_progress, 0.0);
    assert_eq!(fleet.mission_log(1)[0].message, "Flight stopped");
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_takeoff() {
    let fleet = fleet();
    let id = prepare(&fleet);

    fleet.start_flight(&id).unwrap();
    sleep(Duration::from_millis(500)).await;
    fleet.stop_flight(&id).unwrap();

    sleep(Duration::from_secs(5)).await;
    assert_eq!(status(&fleet, &id), FlightStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_remove_while_flying_leaves_no_timer() {
    let fleet = fleet();
    let id = prepare(&fleet);

    fleet.start_flight(&id).unwrap();
    sleep(Duration::from_millis(4000)).await;

    let removed = fleet.remove_drone(&id).unwrap();
    assert!(!removed.state.is_visible);
    assert!(removed.state.path.is_empty());
    assert_eq!(removed.state.flight_status, FlightStatus::Idle);
    assert!(!fleet.has_pending_timer(&id).unwrap());

    sleep(Duration::from_secs(60)).await;

    let later = fleet.drone(&id).unwrap();
    assert!(!later.state.is_visible);
    assert!(later.state.position.is_none());
    assert_eq!(later.state.flight_status, FlightStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_replace_during_landing_is_not_resurrected() {
    let fleet = fleet();
    let id = prepare(&fleet);

    fleet.start_flight(&id).unwrap();
    // Takeoff plus the full route lands us inside the landing delay
    sleep(Duration::from_millis(2000 + 26_500)).await;
    assert_eq!(status(&fleet, &id), FlightStatus::Landing);

    let parked = fleet.place_drone(&id, None).unwrap();
    sleep(Duration::from_secs(10)).await;

    let later = fleet.drone(&id).unwrap();
    assert_eq!(later.state.flight_status, FlightStatus::Idle);
    assert_eq!(later.state.position, parked.state.position);
    assert_eq!(later.state.flight_progress, 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_second_flight_after_completion() {
    let fleet = fleet();
    let id = prepare(&fleet);

    fleet.start_flight(&id).unwrap();
    sleep(Duration::from_secs(40)).await;
    assert_eq!(status(&fleet, &id), FlightStatus::Completed);

    let relaunch = fleet.start_flight(&id).unwrap();
    assert_eq!(relaunch.state.flight_status, FlightStatus::Takeoff);
    assert_eq!(relaunch.state.launch_battery, 98);
    assert_eq!(relaunch.state.flight_progress, 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_drones_fly_independently() {
    let fleet = fleet();
    let first = prepare(&fleet);

    let second = DroneId::new("2");
    fleet.place_drone(&second, None).unwrap();
    fleet.append_waypoint(&second, GeoPoint::new(10.0, 10.0)).unwrap();
    fleet.append_waypoint(&second, GeoPoint::new(10.0, 10.001)).unwrap();

    fleet.start_flight(&first).unwrap();
    fleet.start_flight(&second).unwrap();
    sleep(Duration::from_millis(4000)).await;

    fleet.stop_flight(&first).unwrap();
    sleep(Duration::from_millis(1000)).await;

    assert_eq!(status(&fleet, &first), FlightStatus::Idle);
    let other = fleet.drone(&second).unwrap();
    assert!(other.is_flying);
    assert!(other.state.flight_progress > 0.0);
}
