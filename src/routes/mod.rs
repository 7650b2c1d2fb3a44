// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP route handlers.

pub mod api;
pub mod coach;
pub mod events;
pub mod session;

use crate::middleware::require_ready;
use crate::session::{Mode, Status};
use crate::AppState;
use axum::extract::State;
use axum::http::{header, Method};
use axum::{middleware, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct HealthResponse {
    pub status: String,
    pub build_id: String,
    pub session: Status,
    pub mode: Mode,
}

/// Health check response
async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let build_id = option_env!("BUILD_ID").unwrap_or("unknown").to_string();
    Json(HealthResponse {
        status: "ok".to_string(),
        build_id,
        session: state.session.status(),
        mode: state.session.mode(),
    })
}

/// The configured frontend, or a plain-http dev server on this machine.
fn is_allowed_origin(origin: &str, frontend_url: &str) -> bool {
    if origin == frontend_url {
        return true;
    }
    reqwest::Url::parse(origin).is_ok_and(|url| {
        url.scheme() == "http" && matches!(url.host_str(), Some("localhost" | "127.0.0.1"))
    })
}

/// Build the complete router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    // CORS layer - allow requests from frontend URL and localhost (for dev)
    let frontend_url = state.config.frontend_url.clone();
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::AllowOrigin::predicate(
            move |origin: &axum::http::HeaderValue, _request_parts: &axum::http::request::Parts| {
                origin
                    .to_str()
                    .is_ok_and(|origin| is_allowed_origin(origin, &frontend_url))
            },
        ))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    // Available in every session status
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .merge(session::routes());

    // Need a ready session (signed in, or local mode)
    let ready_routes = Router::new()
        .merge(api::routes())
        .merge(coach::routes())
        .merge(events::routes())
        .route_layer(middleware::from_fn_with_state(state.clone(), require_ready));

    Router::new()
        .merge(public_routes)
        .merge(ready_routes)
        .layer(middleware::from_fn(
            crate::middleware::security::add_security_headers,
        ))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_origins() {
        let frontend = "https://smartfit.example.com";
        assert!(is_allowed_origin(frontend, frontend));
        assert!(is_allowed_origin("http://localhost:5173", frontend));
        assert!(is_allowed_origin("http://localhost", frontend));
        assert!(is_allowed_origin("http://127.0.0.1:3000", frontend));

        assert!(!is_allowed_origin("http://localhost.evil.com", frontend));
        assert!(!is_allowed_origin("http://localhost:5173.evil.com", frontend));
        assert!(!is_allowed_origin("http://127.0.0.1.nip.io", frontend));
        assert!(!is_allowed_origin("https://smartfit.example.com.evil.com", frontend));
        assert!(!is_allowed_origin("ftp://localhost", frontend));
        assert!(!is_allowed_origin("null", frontend));
    }
}
