// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, Response};
use serde_json::Value;
use smartfit::config::Config;
use smartfit::db::{MemoryDocumentStore, MemoryKvStore};
use smartfit::routes::create_router;
use smartfit::services::coach::{Coach, CoachError, LanguageModel, ModelRequest};
use smartfit::services::MemoryIdentityProvider;
use smartfit::session::{Backend, RemoteBackend, Session, SessionOptions};
use smartfit::AppState;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Language model that always gives the same answer and records prompts.
#[allow(dead_code)]
pub struct ScriptedModel {
    reply: Option<String>,
    pub prompts: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl ScriptedModel {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    /// A model whose every call fails as if the network were down.
    pub fn offline() -> Arc<Self> {
        Arc::new(Self {
            reply: None,
            prompts: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn generate(&self, request: &ModelRequest) -> Result<String, CoachError> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        self.reply
            .clone()
            .ok_or_else(|| CoachError::Transport("connection refused".to_string()))
    }
}

/// Handles into a remote-mode test app.
#[allow(dead_code)]
pub struct RemoteHandles {
    pub store: Arc<MemoryDocumentStore>,
    pub identity: Arc<MemoryIdentityProvider>,
}

fn options() -> SessionOptions {
    SessionOptions {
        // Tests never wait for a poll; writes are read back on demand
        sync_interval: Duration::from_secs(3600),
        ..Default::default()
    }
}

fn build(session: Arc<Session>, coach: Coach) -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(AppState {
        config: Config::test_default(),
        session,
        coach,
    });
    (create_router(state.clone()), state)
}

/// Local-mode app (remote backend unreachable) over in-memory storage.
#[allow(dead_code)]
pub async fn create_local_app(
    kv: Arc<MemoryKvStore>,
    model: Arc<ScriptedModel>,
) -> (axum::Router, Arc<AppState>) {
    let session = Session::start(
        Backend::Unavailable("connection refused".to_string()),
        kv,
        options(),
    )
    .await;
    build(session, Coach::new(model))
}

/// Remote-mode app over an in-memory document store and identity provider.
#[allow(dead_code)]
pub async fn create_remote_app() -> (axum::Router, Arc<AppState>, RemoteHandles) {
    let store = Arc::new(MemoryDocumentStore::new());
    let identity = Arc::new(MemoryIdentityProvider::new());
    let session = Session::start(
        Backend::Remote(RemoteBackend {
            store: store.clone(),
            identity: identity.clone(),
        }),
        Arc::new(MemoryKvStore::new()),
        options(),
    )
    .await;
    let (app, state) = build(session, Coach::disabled());
    (app, state, RemoteHandles { store, identity })
}

/// App started without remote credentials.
#[allow(dead_code)]
pub async fn create_missing_keys_app() -> (axum::Router, Arc<AppState>) {
    let session = Session::start(
        Backend::MissingKeys,
        Arc::new(MemoryKvStore::new()),
        options(),
    )
    .await;
    build(session, Coach::disabled())
}

/// JSON request (or an empty one when `body` is `None`).
#[allow(dead_code)]
pub fn json_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
