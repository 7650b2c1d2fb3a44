// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! SmartFit: nutrition targets and food/weight/workout logging
//!
//! This crate provides the core behind the SmartFit client: a calorie and
//! macro target engine, a persistence facade over a remote document store
//! with a local fallback, and an AI coach. An HTTP API exposes all of it to
//! the presentation layer.

pub mod config;
pub mod db;
pub mod error;
pub mod i18n;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod session;

use config::Config;
use db::{FileKvStore, KeyValueStore};
use services::coach::{Coach, GeminiClient};
use session::{Backend, Session, SessionOptions};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub session: Arc<Session>,
    pub coach: Coach,
}

impl AppState {
    /// Build the state from configuration: local storage, remote backend
    /// (or its fallback), and the assistant.
    pub async fn from_config(config: Config) -> anyhow::Result<Self> {
        let local: Arc<dyn KeyValueStore> = Arc::new(FileKvStore::new(&config.data_dir));
        let backend = Backend::connect(&config, local.clone()).await;
        let session = Session::start(backend, local, SessionOptions::from_config(&config)).await;

        let coach = match &config.gemini_api_key {
            Some(key) => {
                let http = reqwest::Client::builder()
                    .timeout(std::time::Duration::from_secs(60))
                    .build()?;
                Coach::new(Arc::new(GeminiClient::new(
                    http,
                    key.clone(),
                    config.gemini_model.clone(),
                )))
            }
            None => {
                tracing::warn!("GEMINI_API_KEY not set, assistant disabled");
                Coach::disabled()
            }
        };

        Ok(Self {
            config,
            session,
            coach,
        })
    }
}
