//! Guard Error Types
//!
//! Guard-specific error variants that integrate with the unified
//! `kernel::error::AppError` system.
//!
//! A denied [`Verdict`](crate::domain::verdict::Verdict) is *not* an error:
//! it is a normal outcome. Errors here are failures, and every one of them
//! ends the request without reaching the authentication provider.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use thiserror::Error;

/// Guard-specific result type alias
pub type GuardResult<T> = Result<T, GuardError>;

#[derive(Debug, Error)]
pub enum GuardError {
    /// Attempt store failed or returned an unexpected shape (fail closed)
    #[error("Rate limit backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Invalid setup, raised at startup
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// External authentication provider could not be reached or misbehaved
    #[error("Authentication provider error: {0}")]
    Provider(String),

    /// Malformed client request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl GuardError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GuardError::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            GuardError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GuardError::Provider(_) => StatusCode::BAD_GATEWAY,
            GuardError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GuardError::BackendUnavailable(_) => ErrorKind::ServiceUnavailable,
            GuardError::Configuration(_) => ErrorKind::InternalServerError,
            GuardError::Provider(_) => ErrorKind::BadGateway,
            GuardError::InvalidRequest(_) => ErrorKind::BadRequest,
        }
    }

    /// Client-facing conversion. Internal details stay in the logs.
    pub fn to_app_error(&self) -> AppError {
        match self {
            GuardError::BackendUnavailable(_) => {
                AppError::service_unavailable("Sign-in is temporarily unavailable")
                    .with_action("Please try again shortly")
            }
            GuardError::Configuration(_) => AppError::internal("Internal server error"),
            GuardError::Provider(_) => {
                AppError::bad_gateway("Authentication service is unavailable")
                    .with_action("Please try again shortly")
            }
            GuardError::InvalidRequest(msg) => AppError::bad_request(msg.clone()),
        }
    }

    /// `true` for failures of the attempt store
    pub fn is_backend_unavailable(&self) -> bool {
        matches!(self, GuardError::BackendUnavailable(_))
    }

    /// Log the error with appropriate level
    fn log(&self) {
        match self {
            GuardError::BackendUnavailable(msg) => {
                tracing::error!(message = %msg, "Rate limit backend unavailable, failing closed");
            }
            GuardError::Configuration(msg) => {
                tracing::error!(message = %msg, "Guard configuration error");
            }
            GuardError::Provider(msg) => {
                tracing::error!(message = %msg, "Authentication provider error");
            }
            GuardError::InvalidRequest(_) => {
                tracing::debug!(error = %self, "Rejected malformed request");
            }
        }
    }
}

impl From<sqlx::Error> for GuardError {
    fn from(err: sqlx::Error) -> Self {
        let app_err = AppError::from(err);
        GuardError::BackendUnavailable(format!(
            "{}: {}",
            app_err.message(),
            std::error::Error::source(&app_err)
                .map(ToString::to_string)
                .unwrap_or_default()
        ))
    }
}

impl From<GuardError> for AppError {
    fn from(err: GuardError) -> Self {
        err.to_app_error()
    }
}

impl IntoResponse for GuardError {
    fn into_response(self) -> Response {
        self.log();
        self.to_app_error().into_response()
    }
}
