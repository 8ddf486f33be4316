//! # Drone Core
//!
//! Core domain models and types for the Drone Fleet Operations console.
//! This crate provides shared types used by the simulation engine,
//! the WebSocket hub and the HTTP API.

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod error;
pub mod events;
pub mod flight;
pub mod geo;
pub mod log;

pub use error::{CoreError, CoreResult};
pub use events::*;
pub use flight::*;
pub use geo::*;
pub use log::*;

// ============================================================================
// DRONE MODELS
// ============================================================================

/// Unique identifier for a drone
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DroneId(pub String);

impl DroneId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DroneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for DroneId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DroneId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Airframe class
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DroneType {
    #[default]
    Quadcopter,
    MiniQuadcopter,
    Custom(String),
}

/// Drone identity and static capability.
///
/// Created once when the fleet is initialised; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Drone {
    pub id: DroneId,
    pub name: String,
    pub drone_type: DroneType,
    /// Design speed limit in km/h
    pub max_speed: f64,
    /// Service ceiling in meters
    pub max_altitude: f64,
    /// Endurance in minutes
    pub max_flight_time: u32,
    pub camera: String,
    pub sensors: Vec<String>,
    pub description: String,
}

impl Drone {
    pub fn new(id: impl Into<DroneId>, name: impl Into<String>, max_speed: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            drone_type: DroneType::default(),
            max_speed,
            max_altitude: 5000.0,
            max_flight_time: 30,
            camera: String::new(),
            sensors: Vec::new(),
            description: String::new(),
        }
    }

    pub fn with_type(mut self, drone_type: DroneType) -> Self {
        self.drone_type = drone_type;
        self
    }

    pub fn with_limits(mut self, max_altitude: f64, max_flight_time: u32) -> Self {
        self.max_altitude = max_altitude;
        self.max_flight_time = max_flight_time;
        self
    }

    pub fn with_payload<S: Into<String>>(
        mut self,
        camera: impl Into<String>,
        sensors: impl IntoIterator<Item = S>,
    ) -> Self {
        self.camera = camera.into();
        self.sensors = sensors.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Read-only view of one drone for rendering: capability plus flight state
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DroneSnapshot {
    #[serde(flatten)]
    pub drone: Drone,
    #[serde(flatten)]
    pub state: DroneFlightState,
    pub is_flying: bool,
}

impl DroneSnapshot {
    pub fn new(drone: Drone, state: DroneFlightState) -> Self {
        let is_flying = state.is_flying();
        Self {
            drone,
            state,
            is_flying,
        }
    }

    pub fn id(&self) -> &DroneId {
        &self.drone.id
    }
}

// ============================================================================
// TESTS
// ============================================================================
