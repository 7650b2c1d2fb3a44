// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! AI coach routes.

use crate::error::{AppError, Result};
use crate::i18n::{self, Message};
use crate::services::coach::{CoachError, FoodOption, InlineImage};
use crate::AppState;
use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Largest accepted photo, after base64 decoding.
const MAX_IMAGE_BYTES: usize = 8 * 1024 * 1024;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/coach/ask", post(ask))
        .route("/api/coach/food", post(identify_food))
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AskResponse {
    /// Markdown
    pub answer: String,
}

/// Localised "could not complete" error for a failed assistant call.
fn could_not_complete(state: &AppState, err: CoachError, message: Message) -> AppError {
    match err {
        CoachError::EmptyInput => AppError::BadRequest(err.to_string()),
        other => {
            tracing::warn!(error = %other, "Assistant request failed");
            AppError::Coach(i18n::text(state.session.locale(), message).to_string())
        }
    }
}

async fn ask(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AskRequest>,
) -> Result<Json<AskResponse>> {
    let profile = state.session.profile();
    let answer = state
        .coach
        .ask(profile.as_ref(), &body.question)
        .await
        .map_err(|e| could_not_complete(&state, e, Message::CoachConnectionError))?;
    Ok(Json(AskResponse { answer }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodRequest {
    #[serde(default)]
    pub description: Option<String>,
    /// Base64 JPEG, optionally as a data URL
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct FoodResponse {
    pub options: Vec<FoodOption>,
}

async fn identify_food(
    State(state): State<Arc<AppState>>,
    Json(body): Json<FoodRequest>,
) -> Result<Json<FoodResponse>> {
    let image = match body.image.as_deref().filter(|i| !i.trim().is_empty()) {
        Some(encoded) => {
            let image = InlineImage::from_base64(encoded)
                .map_err(|e| AppError::BadRequest(format!("Invalid image: {}", e)))?;
            if image.data.len() > MAX_IMAGE_BYTES {
                return Err(AppError::BadRequest("Image too large".to_string()));
            }
            Some(image)
        }
        None => None,
    };

    let options = state
        .coach
        .identify_food(body.description.as_deref(), image)
        .await
        .map_err(|e| could_not_complete(&state, e, Message::CouldNotAnalyzeFood))?;
    tracing::debug!(count = options.len(), "Food options identified");
    Ok(Json(FoodResponse { options }))
}
