// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session readiness gate.

use crate::error::AppError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Middleware that rejects data routes until the session is `ready`.
///
/// Before that the caller has to sign in (status `auth`) or supply
/// credentials and restart (status `missing_keys`).
pub async fn require_ready(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !state.session.is_ready() {
        tracing::debug!(
            path = %request.uri().path(),
            status = ?state.session.status(),
            "Rejected request before session ready"
        );
        return Err(AppError::NotReady);
    }

    Ok(next.run(request).await)
}
