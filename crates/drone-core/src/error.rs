//! Error types for the drone fleet domain

use thiserror::Error;

/// Core error type for the drone fleet system
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid position: latitude={lat}, longitude={lng}")]
    InvalidPosition { lat: f64, lng: f64 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl CoreError {
    pub fn invalid_position(lat: f64, lng: f64) -> Self {
        Self::InvalidPosition { lat, lng }
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
