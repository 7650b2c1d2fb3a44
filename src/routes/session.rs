// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session routes: status, sign-in, locale and local reset.
//!
//! These work in every session status.

use crate::error::{AppError, Result};
use crate::i18n::Locale;
use crate::session::{SessionError, SessionSnapshot};
use crate::AppState;
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/session", get(get_session))
        .route("/api/auth/signin", post(sign_in))
        .route("/api/auth/signup", post(sign_up))
        .route("/api/auth/guest", post(sign_in_as_guest))
        .route("/api/auth/signout", post(sign_out))
        .route("/api/locale", get(get_locale).put(put_locale))
        .route("/api/reset", post(reset))
}

async fn get_session(State(state): State<Arc<AppState>>) -> Json<SessionSnapshot> {
    Json(state.session.snapshot())
}

// ─── Authentication ──────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CredentialsRequest {
    #[validate(length(min = 1, max = 320))]
    pub email: String,
    #[validate(length(min = 1, max = 4096))]
    pub password: String,
}

/// Map facade errors, wording authentication failures in the caller's
/// locale.
fn auth_error(state: &AppState, err: SessionError) -> AppError {
    match err {
        SessionError::Auth(e) => {
            tracing::info!(error = %e, "Authentication rejected");
            AppError::Auth(e.user_message(state.session.locale()))
        }
        other => other.into(),
    }
}

async fn sign_in(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CredentialsRequest>,
) -> Result<Json<SessionSnapshot>> {
    body.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    state
        .session
        .sign_in(body.email.trim(), &body.password)
        .await
        .map_err(|e| auth_error(&state, e))?;
    Ok(Json(state.session.snapshot()))
}

async fn sign_up(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CredentialsRequest>,
) -> Result<Json<SessionSnapshot>> {
    body.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    state
        .session
        .sign_up(body.email.trim(), &body.password)
        .await
        .map_err(|e| auth_error(&state, e))?;
    Ok(Json(state.session.snapshot()))
}

async fn sign_in_as_guest(State(state): State<Arc<AppState>>) -> Result<Json<SessionSnapshot>> {
    state
        .session
        .sign_in_as_guest()
        .await
        .map_err(|e| auth_error(&state, e))?;
    Ok(Json(state.session.snapshot()))
}

async fn sign_out(State(state): State<Arc<AppState>>) -> Result<Json<SessionSnapshot>> {
    state
        .session
        .sign_out()
        .await
        .map_err(|e| auth_error(&state, e))?;
    Ok(Json(state.session.snapshot()))
}

// ─── Locale ──────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LocaleBody {
    pub locale: Locale,
}

async fn get_locale(State(state): State<Arc<AppState>>) -> Json<LocaleBody> {
    Json(LocaleBody {
        locale: state.session.locale(),
    })
}

async fn put_locale(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LocaleBody>,
) -> Json<LocaleBody> {
    state.session.set_locale(body.locale).await;
    tracing::debug!(locale = body.locale.code(), "Locale changed");
    Json(body)
}

// ─── Reset ───────────────────────────────────────────────────

/// Erase local profile and logs (the crash-screen "erase local data").
async fn reset(State(state): State<Arc<AppState>>) -> Json<SessionSnapshot> {
    state.session.reset_local_data().await;
    Json(state.session.snapshot())
}
