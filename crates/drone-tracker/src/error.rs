//! Error types for the fleet engine

use drone_core::{CoreError, DroneId, FlightStatus};
use thiserror::Error;

/// An expected refusal of a command; nothing was mutated
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FlightRejection {
    #[error("Route needs at least 2 waypoints, has {waypoints}")]
    InsufficientRoute { waypoints: usize },

    #[error("Insufficient battery: {available}% available, {required:.0}% required including reserve")]
    InsufficientBattery { available: u8, required: f64 },

    #[error("Drone is already flying ({status})")]
    AlreadyFlying { status: FlightStatus },

    #[error("Drone is not placed on the map")]
    NotPlaced,

    #[error("Route cannot be edited while the drone is {status}")]
    RouteLocked { status: FlightStatus },

    #[error("Cannot {action} a drone that is {status}")]
    InvalidTransition { action: &'static str, status: FlightStatus },
}

impl FlightRejection {
    /// Short machine-readable label
    pub fn kind(&self) -> &'static str {
        match self {
            FlightRejection::InsufficientRoute { .. } => "insufficient_route",
            FlightRejection::InsufficientBattery { .. } => "insufficient_battery",
            FlightRejection::AlreadyFlying { .. } => "already_flying",
            FlightRejection::NotPlaced => "not_placed",
            FlightRejection::RouteLocked { .. } => "route_locked",
            FlightRejection::InvalidTransition { .. } => "invalid_transition",
        }
    }
}

/// Fleet engine error type
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Drone not found: {0}")]
    DroneNotFound(DroneId),

    #[error(transparent)]
    Rejected(#[from] FlightRejection),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl TrackerError {
    pub fn rejection(&self) -> Option<&FlightRejection> {
        match self {
            TrackerError::Rejected(r) => Some(r),
            _ => None,
        }
    }
}

pub type TrackerResult<T> = Result<T, TrackerError>;
