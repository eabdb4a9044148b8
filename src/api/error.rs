//--------------------------------------------------------------------------------------------------
// ENUMS
//--------------------------------------------------------------------------------------------------
// | Name            | Description                                      | Key Methods         |
// |-----------------|--------------------------------------------------|---------------------|
// | ApiError        | Error types for the HTTP surface                 | from                |
//--------------------------------------------------------------------------------------------------

use axum::{
    response::{Response, IntoResponse},
    http::StatusCode,
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::domain::services::subscriptions::SubscriptionError;

/// Type alias for Result with ApiError
pub type ApiResult<T> = Result<T, ApiError>;

/// API-specific error types
#[derive(Error, Debug, Clone)]
pub enum ApiError {
    /// The requested resource was not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The request was invalid
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error
    #[error("Internal server error: {0}")]
    Internal(String),

    /// The request contains invalid parameters
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            Self::InvalidParams(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = Json(json!({
            "error": {
                "message": error_message,
                "code": status.as_u16()
            }
        }));

        (status, body).into_response()
    }
}

impl From<SubscriptionError> for ApiError {
    fn from(err: SubscriptionError) -> Self {
        match &err {
            SubscriptionError::ConnectionNotFound(id) => {
                Self::NotFound(format!("Connection {} not found", id))
            }
            SubscriptionError::ConnectionClosed(id) => {
                Self::NotFound(format!("Connection {} is closed", id))
            }
            SubscriptionError::DuplicateConnection(_) | SubscriptionError::Ledger(_) => {
                Self::Internal(err.to_string())
            }
            SubscriptionError::NotSupportedOnThisTransport => Self::BadRequest(err.to_string()),
            other => Self::InvalidParams(format!("{}: {}", other.token(), other)),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(format!("JSON error: {}", err))
    }
}
