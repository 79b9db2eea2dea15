//! API Error Types

use alerting::LimitError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use poll_scheduler::SchedulerError;
use serde_json::json;
use storage::StorageError;
use thiserror::Error;

/// Errors surfaced by the dashboard
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unknown actuator or resource
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Alarm limits rejected
    #[error(transparent)]
    Limits(#[from] LimitError),

    /// Reading log failure
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Monitoring control failure
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    /// Logging setup failure
    #[error("Logging error: {0}")]
    Logging(String),

    /// Socket failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) | ApiError::Scheduler(SchedulerError::UnknownActuator(_)) => {
                StatusCode::NOT_FOUND
            }
            ApiError::BadRequest(_) | ApiError::Limits(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
