// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data routes: profile, targets, log entries and summaries.
//!
//! Only reachable once the session is ready; the readiness middleware is
//! applied in routes/mod.rs.

use crate::error::{AppError, Result};
use crate::models::{LogDate, LogEntry, LogKind, Nutrition, OnboardingForm, Profile, WeightUnit};
use crate::services::summary::{self, DayTotals, WeightPoint};
use crate::services::targets::{to_display_weight, Targets};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/profile", get(get_profile).put(put_profile))
        .route("/api/onboarding", post(complete_onboarding))
        .route("/api/targets", get(get_targets))
        .route("/api/logs", get(list_logs).post(add_log))
        .route("/api/logs/{id}", put(update_log).delete(delete_log))
        .route("/api/summary/today", get(today_summary))
        .route("/api/summary/week", get(week_summary))
        .route("/api/weight/trend", get(weight_trend))
}

// ─── Profile ─────────────────────────────────────────────────

/// Profile plus the figures the profile screen shows.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub profile: Option<Profile>,
    pub needs_onboarding: bool,
    pub unit: WeightUnit,
    /// Current weight in the display unit, one decimal
    pub display_weight: String,
    pub display_goal: String,
}

impl ProfileResponse {
    fn new(profile: Option<Profile>) -> Self {
        let unit = profile.as_ref().map(Profile::unit).unwrap_or_default();
        Self {
            needs_onboarding: Profile::needs_onboarding(profile.as_ref()),
            unit,
            display_weight: to_display_weight(profile.as_ref().and_then(|p| p.current_weight), unit),
            display_goal: to_display_weight(profile.as_ref().and_then(|p| p.goal_weight), unit),
            profile,
        }
    }
}

async fn get_profile(State(state): State<Arc<AppState>>) -> Json<ProfileResponse> {
    Json(ProfileResponse::new(state.session.profile()))
}

async fn put_profile(
    State(state): State<Arc<AppState>>,
    Json(profile): Json<Profile>,
) -> Result<Json<ProfileResponse>> {
    let saved = state.session.save_profile(profile).await?;
    Ok(Json(ProfileResponse::new(Some(saved))))
}

/// Convert and save the onboarding form (weights in the chosen unit).
async fn complete_onboarding(
    State(state): State<Arc<AppState>>,
    Json(form): Json<OnboardingForm>,
) -> Result<Json<ProfileResponse>> {
    form.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let profile = form.into_profile();
    tracing::info!(unit = profile.unit().as_str(), "Onboarding completed");
    let saved = state.session.save_profile(profile).await?;
    Ok(Json(ProfileResponse::new(Some(saved))))
}

async fn get_targets(State(state): State<Arc<AppState>>) -> Json<Targets> {
    Json(state.session.targets())
}

// ─── Log Entries ─────────────────────────────────────────────

/// Body for creating or editing an entry. The date defaults to now for new
/// entries and to the stored date for edits.
#[derive(Debug, Deserialize)]
pub struct LogEntryRequest {
    #[serde(default)]
    pub date: Option<LogDate>,
    #[serde(flatten)]
    pub kind: LogKind,
}

async fn list_logs(State(state): State<Arc<AppState>>) -> Json<Vec<LogEntry>> {
    Json(state.session.logs())
}

async fn add_log(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LogEntryRequest>,
) -> Result<(StatusCode, Json<LogEntry>)> {
    let entry = LogEntry {
        id: None,
        date: body.date.unwrap_or_else(LogDate::now),
        kind: body.kind,
    };
    let added = state.session.add_log_entry(entry).await?;
    Ok((StatusCode::CREATED, Json(added)))
}

async fn update_log(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<LogEntryRequest>,
) -> Result<Json<LogEntry>> {
    let date = match body.date {
        Some(date) => date,
        None => state
            .session
            .logs()
            .into_iter()
            .find(|l| l.id() == Some(id.as_str()))
            .map(|l| l.date)
            .ok_or_else(|| AppError::NotFound(format!("Log entry {}", id)))?,
    };
    let entry = LogEntry {
        id: Some(id),
        date,
        kind: body.kind,
    };
    Ok(Json(state.session.update_log_entry(entry).await?))
}

async fn delete_log(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.session.delete_log_entry(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ─── Summaries ───────────────────────────────────────────────

/// Dashboard figures for today.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct TodaySummary {
    pub date: String,
    pub eaten: Nutrition,
    pub targets: Targets,
    pub remaining_calories: i64,
    pub progress_percent: f64,
}

async fn today_summary(State(state): State<Arc<AppState>>) -> Json<TodaySummary> {
    let now = Utc::now();
    let logs = state.session.logs();
    let eaten = summary::today_totals_in(&logs, now, &Local);
    let targets = state.session.targets();

    Json(TodaySummary {
        date: summary::day_key(&LogDate::from(now)),
        eaten,
        targets,
        remaining_calories: summary::remaining_calories(targets.calories, eaten.calories),
        progress_percent: summary::progress_percent(eaten.calories, targets.calories),
    })
}

async fn week_summary(State(state): State<Arc<AppState>>) -> Json<Vec<DayTotals>> {
    Json(summary::weekly_series_in(
        &state.session.logs(),
        Utc::now(),
        &Local,
    ))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct WeightTrend {
    pub unit: WeightUnit,
    pub points: Vec<WeightPoint>,
    /// False with fewer than two points
    pub has_trend: bool,
}

async fn weight_trend(State(state): State<Arc<AppState>>) -> Json<WeightTrend> {
    let unit = state
        .session
        .profile()
        .map(|p| p.unit())
        .unwrap_or_default();
    let points = summary::weight_trend(&state.session.logs(), unit);
    Json(WeightTrend {
        unit,
        has_trend: summary::has_trend(&points),
        points,
    })
}
