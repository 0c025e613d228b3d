//! API error types and HTTP status mapping.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::membership::{CloudError, MembershipError};
use crate::scheduler::SchedulerError;

/// API error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// API error type that can be converted to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed request.
    BadRequest(String),
    /// Resource not found.
    NotFound(String),
    /// Request conflicts with current state (e.g. task still running).
    Conflict(String),
    /// The cloud provider failed the request.
    BadGateway(String),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "CLOUD_ERROR", msg),
            ApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg)
            }
        };

        let body = ErrorResponse {
            error: message,
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<SchedulerError> for ApiError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::TaskNotFound(name) => {
                ApiError::NotFound(format!("task not found: {}", name))
            }
            SchedulerError::AlreadyRunning(name) => {
                ApiError::Conflict(format!("task '{}' is still running", name))
            }
            SchedulerError::DuplicateTask(name) => {
                ApiError::Conflict(format!("task already registered: {}", name))
            }
            SchedulerError::ChannelError(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<MembershipError> for ApiError {
    fn from(err: MembershipError) -> Self {
        match err {
            MembershipError::GroupNotFound(name)
            | MembershipError::Cloud(CloudError::GroupNotFound(name)) => {
                ApiError::NotFound(format!("group not found: {}", name))
            }
            MembershipError::Cloud(CloudError::LockPoisoned) => {
                ApiError::Internal(CloudError::LockPoisoned.to_string())
            }
            MembershipError::Cloud(e) => ApiError::BadGateway(e.to_string()),
        }
    }
}
