//! The `error` module defines the error types used within the `popcast` application.
//!
//! Errors are layered the same way the application is:
//!
//! - `BrokerError`: failures surfaced by the broadcast core to its callers.
//! - `ApiError`: request-level failures produced by the HTTP layer. These map
//!   directly onto HTTP responses.
//! - `ServerError`: startup failures (configuration, binding the listener).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BrokerError {
    /// The broadcaster has stopped and no longer accepts messages.
    #[error("broadcaster is unavailable: shutdown has already occurred")]
    Unavailable,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid User")]
    InvalidUser,

    #[error("Invalid Message")]
    InvalidMessage,

    #[error("failed to encode chat event: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Broker(#[from] BrokerError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidUser => StatusCode::UNAUTHORIZED,
            ApiError::InvalidMessage => StatusCode::BAD_REQUEST,
            ApiError::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Broker(BrokerError::Unavailable) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Encode(e) => {
                error!("Failed to encode chat event: {e}");
                "internal error".to_string()
            }
            other => other.to_string(),
        };
        (status, body).into_response()
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
