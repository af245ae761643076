//! Mapping of session failures to HTTP responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use wa_relay_session::ManagerError;

use crate::protocol::ErrorResponse;

/// Error returned by a handler.
#[derive(Debug, thiserror::Error)]
#[error("{status}: {message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    /// Create an error response.
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Map a session failure.
    ///
    /// Backend and credential failures are logged and answered with
    /// `internal_message` only.
    #[must_use]
    pub fn from_session(err: ManagerError, internal_message: &'static str) -> Self {
        match err {
            ManagerError::NotConnected | ManagerError::InvalidArgument(_) => {
                Self::new(StatusCode::BAD_REQUEST, err.to_string())
            }
            ManagerError::AlreadyConnected => Self::new(StatusCode::CONFLICT, err.to_string()),
            ManagerError::ChallengeUnavailable => {
                Self::new(StatusCode::NOT_FOUND, err.to_string())
            }
            ManagerError::Backend(_) | ManagerError::Credentials(_) => {
                tracing::error!("{internal_message}: {err}");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, internal_message)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}
