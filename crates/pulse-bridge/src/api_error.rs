//! HTTP API error types.
//!
//! Every failure leaves the server as `{ "error": "<message>" }`. Messages
//! are built from error `Display` impls that never carry tokens, credential
//! paths or subprocess stderr.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pulse_integrations::board::BoardError;
use pulse_integrations::usage::UsageError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// An upstream answered badly or not at all.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// A dependency is not configured or not reachable right now.
    #[error("service unavailable: {0}")]
    Unavailable(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<BoardError> for ApiError {
    fn from(err: BoardError) -> Self {
        match err {
            BoardError::MissingApiToken | BoardError::MissingBoardId => {
                ApiError::Unavailable(err.to_string())
            }
            other => ApiError::Upstream(other.to_string()),
        }
    }
}

impl From<UsageError> for ApiError {
    fn from(err: UsageError) -> Self {
        match err {
            UsageError::ContractViolation(_) => ApiError::Upstream(err.to_string()),
            // Handlers degrade unavailability to a placeholder before this
            // point; a caller that skips `degrade` gets a 503.
            UsageError::Unavailable(_) => ApiError::Unavailable(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (ApiError::Upstream(message) | ApiError::Unavailable(message)) = self;
        (status, Json(json!({ "error": message }))).into_response()
    }
}
