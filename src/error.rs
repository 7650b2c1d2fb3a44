// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use crate::db::StoreError;
use crate::session::SessionError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Session is not ready")]
    NotReady,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Authentication failure, already worded for the user
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Assistant failure, already worded for the user
    #[error("Could not complete: {0}")]
    Coach(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::NotReady => (StatusCode::CONFLICT, "not_ready", None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Auth(msg) => (StatusCode::UNAUTHORIZED, "auth_failed", Some(msg.clone())),
            AppError::Coach(msg) => {
                (StatusCode::BAD_GATEWAY, "could_not_complete", Some(msg.clone()))
            }
            AppError::Storage(msg) => {
                tracing::error!(error = %msg, "Storage error");
                (StatusCode::BAD_GATEWAY, "storage_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Storage(err.to_string())
    }
}

/// Facade errors. Authentication errors are worded in the default locale;
/// handlers that know the caller's locale map them themselves.
impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotReady => AppError::NotReady,
            SessionError::MissingId => AppError::BadRequest(err.to_string()),
            SessionError::NotFound(id) => AppError::NotFound(format!("Log entry {}", id)),
            SessionError::Store(e) => e.into(),
            SessionError::Auth(e) => AppError::Auth(e.user_message(Default::default())),
            SessionError::Encode(e) => AppError::Internal(e.into()),
        }
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::identity::AuthError;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::NotReady.into_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::from(SessionError::MissingId).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(SessionError::NotFound("42".to_string()))
                .into_response()
                .status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_auth_error_uses_user_message() {
        match AppError::from(SessionError::Auth(AuthError::EmailInUse)) {
            AppError::Auth(msg) => assert_eq!(msg, "Email already in use."),
            other => panic!("unexpected {other:?}"),
        }
    }
}
