// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! SmartFit API Server
//!
//! Serves the target engine, the persistence facade and the AI coach to
//! the SmartFit web client.

use smartfit::{config::Config, session::Status, AppState};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(
        port = config.port,
        data_dir = %config.data_dir.display(),
        remote_credentials = config.has_remote_credentials(),
        "Starting SmartFit API"
    );

    // Pick remote or local persistence and load the session
    let state = AppState::from_config(config.clone())
        .await
        .expect("Failed to initialize application state");
    let snapshot = state.session.snapshot();
    tracing::info!(status = ?snapshot.status, mode = ?snapshot.mode, "Session started");
    if snapshot.status == Status::MissingKeys {
        tracing::warn!("Set FIREBASE_API_KEY and FIREBASE_PROJECT_ID, then restart");
    }

    // Build router
    let app = smartfit::routes::create_router(Arc::new(state));

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("smartfit=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
