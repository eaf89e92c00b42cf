// Error handling module
// Defines error types and HTTP response conversion

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::auth::{LoginError, TokenError};

/// API errors that can occur during request processing
#[derive(Error, Debug)]
pub enum ApiError {
    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// Session token state is terminal, the user must sign in again
    #[error("Session expired: {0}")]
    SessionExpired(TokenError),

    /// Error from the upstream auth backend
    #[error("Upstream error: {0}")]
    UpstreamError(String),

    /// Request validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<LoginError> for ApiError {
    fn from(err: LoginError) -> Self {
        match err {
            LoginError::MissingCredentials => {
                ApiError::ValidationError("email and password are required".to_string())
            }
            LoginError::Transport(_) => {
                ApiError::UpstreamError("credential verifier unreachable".to_string())
            }
            LoginError::Rejected { .. }
            | LoginError::Malformed(_)
            | LoginError::MissingAccessToken => {
                ApiError::AuthError("Invalid credentials".to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::AuthError(msg) => (StatusCode::UNAUTHORIZED, "auth_error", msg),
            ApiError::SessionExpired(_) => (
                StatusCode::UNAUTHORIZED,
                "session_expired",
                TokenError::SIGN_OUT_SIGNAL.to_string(),
            ),
            ApiError::UpstreamError(msg) => (StatusCode::BAD_GATEWAY, "upstream_error", msg),
            ApiError::ValidationError(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg),
            ApiError::Internal(err) => {
                // Log internal errors
                tracing::error!("Internal error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "message": message,
                "type": error_type,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type alias for API operations
pub type Result<T> = std::result::Result<T, ApiError>;
