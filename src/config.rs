// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Firebase credentials are optional here: without them the session reports
//! `missing_keys` instead of failing to start.

use crate::services::coach::DEFAULT_MODEL;
use crate::session::ProfileWritePolicy;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Firebase web API key
    pub firebase_api_key: Option<String>,
    /// Firebase/Firestore project ID
    pub firebase_project_id: Option<String>,
    /// Gemini API key; the assistant is disabled without it
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    /// Directory holding the local key-value store
    pub data_dir: PathBuf,
    pub profile_write_policy: ProfileWritePolicy,
    /// Live subscription refresh interval
    pub sync_interval: Duration,
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// Server port
    pub port: u16,
}

impl Config {
    /// Config for tests: no remote credentials, no assistant.
    pub fn test_default() -> Self {
        Self {
            firebase_api_key: None,
            firebase_project_id: None,
            gemini_api_key: None,
            gemini_model: DEFAULT_MODEL.to_string(),
            data_dir: PathBuf::from(".smartfit-test"),
            profile_write_policy: ProfileWritePolicy::Replace,
            sync_interval: Duration::from_secs(5),
            frontend_url: "http://localhost:5173".to_string(),
            port: 8080,
        }
    }

    /// Load configuration from environment variables (and `.env`, if
    /// present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let profile_write_policy = match optional("SMARTFIT_PROFILE_WRITE") {
            Some(raw) => raw
                .parse()
                .map_err(|_| ConfigError::Invalid("SMARTFIT_PROFILE_WRITE", raw))?,
            None => ProfileWritePolicy::default(),
        };

        let sync_secs = match optional("SMARTFIT_SYNC_INTERVAL_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::Invalid("SMARTFIT_SYNC_INTERVAL_SECS", raw))?,
            None => 5,
        };

        Ok(Self {
            firebase_api_key: optional("FIREBASE_API_KEY"),
            firebase_project_id: optional("FIREBASE_PROJECT_ID"),
            gemini_api_key: optional("GEMINI_API_KEY"),
            gemini_model: optional("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            data_dir: optional("SMARTFIT_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".smartfit")),
            profile_write_policy,
            sync_interval: Duration::from_secs(sync_secs),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
        })
    }

    /// Whether both Firebase credentials are present.
    pub fn has_remote_credentials(&self) -> bool {
        self.firebase_api_key.is_some() && self.firebase_project_id.is_some()
    }
}

/// Trimmed, non-empty environment variable.
fn optional(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        env::set_var("FIREBASE_API_KEY", " test-key ");
        env::set_var("FIREBASE_PROJECT_ID", "");
        env::set_var("SMARTFIT_PROFILE_WRITE", "merge");
        env::set_var("SMARTFIT_SYNC_INTERVAL_SECS", "2");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.firebase_api_key.as_deref(), Some("test-key"));
        assert_eq!(config.firebase_project_id, None);
        assert!(!config.has_remote_credentials());
        assert_eq!(config.profile_write_policy, ProfileWritePolicy::Merge);
        assert_eq!(config.sync_interval, Duration::from_secs(2));

        env::set_var("SMARTFIT_SYNC_INTERVAL_SECS", "0");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::Invalid("SMARTFIT_SYNC_INTERVAL_SECS", _))
        ));
        env::remove_var("SMARTFIT_SYNC_INTERVAL_SECS");
        env::remove_var("SMARTFIT_PROFILE_WRITE");
    }
}
