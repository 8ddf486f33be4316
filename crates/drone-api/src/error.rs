//! API error types

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use drone_core::CoreError;
use drone_tracker::TrackerError;
use serde::Serialize;
use thiserror::Error;

/// API error type
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Command refused in the drone's current state
    #[error("{message}")]
    Conflict { code: &'static str, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Conflict { code, message } => (StatusCode::CONFLICT, code, message),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
        };

        let body = Json(ErrorResponse {
            error: error_type.into(),
            message,
        });

        (status, body).into_response()
    }
}

impl From<TrackerError> for ApiError {
    fn from(err: TrackerError) -> Self {
        match err {
            TrackerError::DroneNotFound(id) => ApiError::NotFound(format!("Drone {} not found", id)),
            TrackerError::Rejected(reason) => ApiError::Conflict {
                code: reason.kind(),
                message: reason.to_string(),
            },
            TrackerError::Core(e @ CoreError::InvalidPosition { .. }) => ApiError::BadRequest(e.to_string()),
            TrackerError::Core(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<prometheus::Error> for ApiError {
    fn from(err: prometheus::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}
