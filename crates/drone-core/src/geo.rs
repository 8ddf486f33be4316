//! Geographic types and flight-math helpers for drone positioning

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{CoreError, CoreResult};

/// Earth's mean radius in meters (spherical model)
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Routes at least this long are flown at the drone's full design speed
pub const FULL_SPEED_DISTANCE_M: f64 = 500.0;

/// Shortest routes still fly at this fraction of the design speed
pub const MIN_SPEED_FRACTION: f64 = 0.25;

/// Conversion factor between km/h and m/s
pub const KMH_PER_MPS: f64 = 3.6;

/// A map point in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees (-90 to 90)
    pub lat: f64,
    /// Longitude in degrees (-180 to 180)
    pub lng: f64,
}

/// Ordered patrol route; insertion order is flight order
pub type Path = Vec<GeoPoint>;

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Check if this point lies on the globe
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// Reject points that cannot be placed on a map
    pub fn validate(&self) -> CoreResult<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(CoreError::invalid_position(self.lat, self.lng))
        }
    }

    /// Great-circle distance to another point in meters
    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        distance(self.lat, self.lng, other.lat, other.lng)
    }

    /// Initial compass bearing to another point, degrees in [0, 360)
    pub fn bearing_to(&self, other: &GeoPoint) -> f64 {
        bearing(self.lat, self.lng, other.lat, other.lng)
    }

    /// Linear interpolation between two points
    /// fraction: 0.0 = self, 1.0 = other
    pub fn interpolate(&self, other: &GeoPoint, fraction: f64) -> GeoPoint {
        let fraction = fraction.clamp(0.0, 1.0);

        GeoPoint::new(
            self.lat + (other.lat - self.lat) * fraction,
            self.lng + (other.lng - self.lng) * fraction,
        )
    }

    /// Offset by the same number of degrees on both axes
    pub fn offset(&self, degrees: f64) -> GeoPoint {
        GeoPoint::new(self.lat + degrees, self.lng + degrees)
    }

    /// Convert to `[lat, lng]`
    pub fn to_array(&self) -> [f64; 2] {
        [self.lat, self.lng]
    }
}

impl From<[f64; 2]> for GeoPoint {
    fn from(p: [f64; 2]) -> Self {
        Self::new(p[0], p[1])
    }
}

impl From<(f64, f64)> for GeoPoint {
    fn from((lat, lng): (f64, f64)) -> Self {
        Self::new(lat, lng)
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}, {:.6}", self.lat, self.lng)
    }
}

/// Haversine distance between two coordinates in meters
pub fn distance(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lng = (lng2 - lng1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_M * c
}

/// Initial bearing from point 1 to point 2, degrees in [0, 360)
pub fn bearing(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta_lng = (lng2 - lng1).to_radians();

    let y = delta_lng.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * delta_lng.cos();

    let bearing = y.atan2(x).to_degrees().rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if bearing >= 360.0 { 0.0 } else { bearing }
}

/// Cruise speed in m/s for a route of the given length.
///
/// Full design speed from [`FULL_SPEED_DISTANCE_M`] upward; shorter routes
/// scale down linearly, never below [`MIN_SPEED_FRACTION`] of the maximum.
/// Returns 0 when there is nothing to fly.
pub fn optimal_speed(total_distance_m: f64, max_speed_mps: f64) -> f64 {
    if total_distance_m <= 0.0 || max_speed_mps <= 0.0 {
        return 0.0;
    }

    let fraction = (total_distance_m / FULL_SPEED_DISTANCE_M).clamp(MIN_SPEED_FRACTION, 1.0);
    max_speed_mps * fraction
}

/// Flight time in seconds at a constant speed
pub fn flight_time(total_distance_m: f64, speed_mps: f64) -> f64 {
    if total_distance_m <= 0.0 || speed_mps <= 0.0 {
        return 0.0;
    }
    total_distance_m / speed_mps
}

pub fn kmh_to_mps(kmh: f64) -> f64 {
    kmh / KMH_PER_MPS
}

pub fn mps_to_kmh(mps: f64) -> f64 {
    mps * KMH_PER_MPS
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_identical_points() {
        assert_eq!(distance(44.605443, 33.522084, 44.605443, 33.522084), 0.0);
    }

    #[test]
    fn test_distance_symmetric() {
        let ab = distance(44.60, 33.52, 44.65, 33.60);
        let ba = distance(44.65, 33.60, 44.60, 33.52);
        assert!((ab - ba).abs() < 1e-9);
    }

    #[test]
    fn test_distance_equator_millidegree() {
        // 0.001 degrees of longitude on the equator is ~111 m
        let d = distance(0.0, 0.0, 0.0, 0.001);
        assert!((d - 111.19).abs() < 0.1, "got {d}");
    }

    #[test]
    fn test_bearing_cardinal_directions() {
        let origin = GeoPoint::new(0.0, 0.0);

        assert!(origin.bearing_to(&GeoPoint::new(1.0, 0.0)).abs() < 1e-9);
        assert!((origin.bearing_to(&GeoPoint::new(0.0, 1.0)) - 90.0).abs() < 1e-9);
        assert!((origin.bearing_to(&GeoPoint::new(-1.0, 0.0)) - 180.0).abs() < 1e-9);
        assert!((origin.bearing_to(&GeoPoint::new(0.0, -1.0)) - 270.0).abs() < 1e-9);
    }

    #[test]
    fn test_bearing_range() {
        let b = bearing(10.0, 10.0, 9.0, 9.0);
        assert!((0.0..360.0).contains(&b));
    }

    #[test]
    fn test_interpolation() {
        let start = GeoPoint::new(0.0, 0.0);
        let end = GeoPoint::new(10.0, 20.0);

        let mid = start.interpolate(&end, 0.5);
        assert!((mid.lat - 5.0).abs() < 1e-9);
        assert!((mid.lng - 10.0).abs() < 1e-9);

        assert_eq!(start.interpolate(&end, 1.5), end);
    }

    #[test]
    fn test_optimal_speed_contract() {
        let max = kmh_to_mps(70.0);

        assert_eq!(optimal_speed(0.0, max), 0.0);
        assert_eq!(optimal_speed(10_000.0, max), max);

        let short = optimal_speed(1.0, max);
        assert!(short > 0.0 && short <= max);

        // Monotonic in distance
        assert!(optimal_speed(100.0, max) <= optimal_speed(300.0, max));
    }

    #[test]
    fn test_flight_time() {
        assert_eq!(flight_time(0.0, 10.0), 0.0);
        assert_eq!(flight_time(100.0, 0.0), 0.0);
        assert!((flight_time(100.0, 10.0) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_point_validity() {
        assert!(GeoPoint::new(45.0, 90.0).is_valid());
        assert!(!GeoPoint::new(100.0, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, 200.0).is_valid());
        assert!(!GeoPoint::new(f64::NAN, 0.0).is_valid());
        assert!(matches!(
            GeoPoint::new(91.0, 0.0).validate(),
            Err(CoreError::InvalidPosition { .. })
        ));
    }
}
