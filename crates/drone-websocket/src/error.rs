//! WebSocket error types

use drone_core::CoreError;
use thiserror::Error;

/// WebSocket errors
#[derive(Error, Debug)]
pub enum WsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("{message}")]
    CommandRejected { code: String, message: String },

    #[error("No command handler registered")]
    NoCommandHandler,
}

impl WsError {
    pub fn rejected(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CommandRejected {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Machine-readable code sent to clients
    pub fn code(&self) -> &str {
        match self {
            WsError::CommandRejected { code, .. } => code,
            WsError::Json(_) => "invalid_message",
            WsError::NoCommandHandler => "unavailable",
            _ => "internal",
        }
    }
}

pub type WsResult<T> = Result<T, WsError>;
