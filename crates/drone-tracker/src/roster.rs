//! Built-in fleet roster and parking layout

use drone_core::{Drone, DroneType, GeoPoint};

/// Default map center (lat, lng)
pub const DEFAULT_MAP_CENTER: GeoPoint = GeoPoint {
    lat: 44.605443,
    lng: 33.522084,
};

/// Diagonal spacing between parking spots, degrees
pub const PARKING_SPACING_DEG: f64 = 0.001;

/// The five-drone fleet the console ships with
pub fn default_roster() -> Vec<Drone> {
    vec![
        Drone::new("1", "Drone-1", 70.0)
            .with_limits(5000.0, 46)
            .with_payload("20MP", ["GPS", "GLONASS", "Vision"])
            .with_description("Professional aerial photography drone"),
        Drone::new("2", "Drone-2", 57.0)
            .with_type(DroneType::MiniQuadcopter)
            .with_limits(4000.0, 38)
            .with_payload("12MP", ["GPS", "Vision"])
            .with_description("Compact entry-level drone"),
        Drone::new("3", "Drone-3", 68.0)
            .with_limits(5000.0, 31)
            .with_payload("20MP", ["GPS", "GLONASS", "APAS 4.0"])
            .with_description("Drone for advanced pilots"),
        Drone::new("4", "Drone-4", 72.0)
            .with_limits(6000.0, 30)
            .with_payload("20MP", ["GPS", "GLONASS", "Obstacle Avoidance"])
            .with_description("Classic professional drone"),
        Drone::new("5", "Drone-5", 72.0)
            .with_limits(7000.0, 40)
            .with_payload("48MP", ["GPS", "Galileo", "Beidou"])
            .with_description("High-resolution camera drone"),
    ]
}

/// Parking spot for the drone at roster position `index` (zero based)
pub fn parking_position(center: GeoPoint, index: usize) -> GeoPoint {
    center.offset((index + 1) as f64 * PARKING_SPACING_DEG)
}
