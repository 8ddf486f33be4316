//! Mission planning: turns a waypoint path into flight parameters

use drone_core::{
    BATTERY_RESERVE_PERCENT, GeoPoint, METERS_PER_BATTERY_PERCENT, MIN_SEGMENT_TIME_MS,
    MissionParameters, flight_time, kmh_to_mps, mps_to_kmh, optimal_speed,
};
use tracing::{debug, warn};

/// Compute mission parameters for `path` flown by a drone with the given
/// design speed (km/h) and current battery (percent).
///
/// Returns `None` when there is not enough data to plan: fewer than two
/// points, or a non-positive speed limit.
pub fn plan_mission(
    path: &[GeoPoint],
    max_speed_kmh: f64,
    current_battery: f64,
) -> Option<MissionParameters> {
    if path.len() < 2 {
        return None;
    }
    if !(max_speed_kmh > 0.0) {
        warn!("Refusing to plan with max speed {} km/h", max_speed_kmh);
        return None;
    }

    let battery = current_battery.clamp(0.0, 100.0);

    let distances: Vec<f64> = path.windows(2).map(|w| w[0].distance_to(&w[1])).collect();
    let total_distance: f64 = distances.iter().sum();

    let speed_mps = optimal_speed(total_distance, kmh_to_mps(max_speed_kmh));
    let estimated_time = flight_time(total_distance, speed_mps);

    // Linear model: 1% per 100 m, never eating into the reserve
    let battery_required = total_distance / METERS_PER_BATTERY_PERCENT;
    let battery_consumption = battery_required
        .min(battery - BATTERY_RESERVE_PERCENT)
        .max(0.0);

    let segment_times: Vec<f64> = distances
        .iter()
        .map(|d| segment_time_ms(*d, speed_mps))
        .collect();
    let total_time = segment_times.iter().sum();

    debug!(
        "Planned {} waypoints: {:.1} m at {:.2} m/s, {:.0} ms",
        path.len(),
        total_distance,
        speed_mps,
        total_time
    );

    Some(MissionParameters {
        total_distance: total_distance.round(),
        optimal_speed: mps_to_kmh(speed_mps).round(),
        estimated_time: estimated_time.round(),
        battery_consumption,
        battery_required,
        waypoints: path.len(),
        distances,
        segment_times,
        total_time,
    })
}

/// Simulated duration of one segment, floored so coincident points still take time
fn segment_time_ms(distance_m: f64, speed_mps: f64) -> f64 {
    if speed_mps <= 0.0 {
        return MIN_SEGMENT_TIME_MS;
    }
    (distance_m / speed_mps * 1000.0).max(MIN_SEGMENT_TIME_MS)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use drone_core::distance;

    fn equator_route() -> Vec<GeoPoint> {
        vec![
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(0.0, 0.001),
            GeoPoint::new(0.0, 0.002),
        ]
    }

    #[test]
    fn test_short_paths_are_not_planned() {
        assert!(plan_mission(&[], 70.0, 100.0).is_none());
        assert!(plan_mission(&[GeoPoint::new(1.0, 1.0)], 70.0, 100.0).is_none());
    }

    #[test]
    fn test_non_positive_speed_is_not_planned() {
        assert!(plan_mission(&equator_route(), 0.0, 100.0).is_none());
    }

    #[test]
    fn test_straight_two_point_path() {
        let a = GeoPoint::new(44.605443, 33.522084);
        let b = GeoPoint::new(44.615443, 33.532084);

        let params = plan_mission(&[a, b], 70.0, 100.0).unwrap();

        assert_eq!(params.waypoints, 2);
        assert_eq!(params.distances.len(), 1);
        assert_eq!(params.segment_times.len(), 1);
        assert!((params.total_distance - distance(a.lat, a.lng, b.lat, b.lng)).abs() <= 0.5);
    }

    #[test]
    fn test_equator_scenario() {
        let params = plan_mission(&equator_route(), 70.0, 100.0).unwrap();

        assert_eq!(params.waypoints, 3);
        assert_eq!(params.distances.len(), 2);
        for d in &params.distances {
            assert!((d - 111.0).abs() < 1.0, "segment {d}");
        }
        assert!((params.total_distance - 222.0).abs() <= 1.0);
        assert_eq!(params.battery_consumption.round(), 2.0);
        assert!(params.optimal_speed > 0.0 && params.optimal_speed <= 70.0);
    }

    #[test]
    fn test_consumption_never_exceeds_reserve() {
        // ~11 km route would need ~111%
        let path = vec![GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 0.1)];

        for battery in [100.0, 50.0, 15.0, 10.0, 5.0] {
            let params = plan_mission(&path, 70.0, battery).unwrap();
            assert!(params.battery_consumption <= (battery - BATTERY_RESERVE_PERCENT).max(0.0));
            assert!(!params.is_affordable(battery));
        }
    }

    #[test]
    fn test_coincident_waypoints_get_minimum_segment_time() {
        let p = GeoPoint::new(10.0, 10.0);
        let params = plan_mission(&[p, p, p], 70.0, 100.0).unwrap();

        assert_eq!(params.total_distance, 0.0);
        assert_eq!(params.segment_times, vec![MIN_SEGMENT_TIME_MS, MIN_SEGMENT_TIME_MS]);
        assert_eq!(params.total_time, 2.0 * MIN_SEGMENT_TIME_MS);
        assert_eq!(params.estimated_time, 0.0);
    }

    #[test]
    fn test_total_time_is_sum_of_segments() {
        let params = plan_mission(&equator_route(), 57.0, 80.0).unwrap();
        let sum: f64 = params.segment_times.iter().sum();

        assert!((params.total_time - sum).abs() < 1e-9);
        // Floored segment times can only lengthen the flight
        assert!(params.total_time + 1000.0 >= params.estimated_time * 1000.0);
    }
}
