// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Router-level behaviour: health, readiness gating, headers and the coach.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::json;
use smartfit::db::MemoryKvStore;
use std::sync::Arc;
use tower::ServiceExt;

mod common;

use common::{body_json, json_request, ScriptedModel};

#[tokio::test]
async fn test_health_check() {
    let (app, _state) =
        common::create_local_app(Arc::new(MemoryKvStore::new()), ScriptedModel::offline()).await;

    let response = app
        .oneshot(json_request("GET", "/health", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["session"], "ready");
    assert_eq!(body["mode"], "local");
}

#[tokio::test]
async fn test_missing_keys_blocks_data_routes() {
    let (app, state) = common::create_missing_keys_app().await;
    assert!(!state.session.is_ready());

    let response = app
        .clone()
        .oneshot(json_request("GET", "/api/session", None))
        .await
        .unwrap();
    let session = body_json(response).await;
    assert_eq!(session["status"], "missing_keys");
    assert_eq!(session["mode"], "initializing");

    for uri in ["/api/profile", "/api/logs", "/api/targets", "/api/summary/today"] {
        let response = app
            .clone()
            .oneshot(json_request("GET", uri, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT, "{uri}");
    }

    // Auth calls have nothing to talk to
    let response = app
        .oneshot(json_request("POST", "/api/auth/guest", None))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["status"], "missing_keys");
}

#[tokio::test]
async fn test_security_headers_present() {
    let (app, _state) =
        common::create_local_app(Arc::new(MemoryKvStore::new()), ScriptedModel::offline()).await;

    let response = app
        .oneshot(json_request("GET", "/api/logs", None))
        .await
        .unwrap();
    let headers = response.headers();
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
    assert_eq!(headers.get("cache-control").unwrap(), "no-store");
    assert!(headers.get("content-security-policy").is_some());
}

#[tokio::test]
async fn test_cors_allows_only_exact_local_hosts() {
    let (app, _state) =
        common::create_local_app(Arc::new(MemoryKvStore::new()), ScriptedModel::offline()).await;

    for (origin, allowed) in [
        ("http://localhost:5173", true),
        ("http://127.0.0.1:8080", true),
        ("http://localhost.evil.com", false),
        ("http://127.0.0.1.evil.com", false),
    ] {
        let request = Request::builder()
            .uri("/health")
            .header(header::ORIGIN, origin)
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let echoed = response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .map(|v| v.to_str().unwrap().to_string());
        assert_eq!(echoed.is_some(), allowed, "{origin}");
        if allowed {
            assert_eq!(echoed.as_deref(), Some(origin));
        }
    }
}

#[tokio::test]
async fn test_coach_answers_with_profile_context() {
    let model = ScriptedModel::replying("**Eat more protein.**");
    let (app, _state) =
        common::create_local_app(Arc::new(MemoryKvStore::new()), model.clone()).await;
    app.clone()
        .oneshot(json_request(
            "PUT",
            "/api/profile",
            Some(json!({"name": "Ana", "age": 30, "currentWeight": 80, "goalWeight": 70})),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/coach/ask",
            Some(json!({"question": "How do I build muscle?"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["answer"], "**Eat more protein.**");

    let prompts = model.prompts.lock().unwrap().clone();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("How do I build muscle?"));

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/coach/ask",
            Some(json!({"question": "  "})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(model.prompts.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_coach_offline_is_reported() {
    let (app, _state) =
        common::create_local_app(Arc::new(MemoryKvStore::new()), ScriptedModel::offline()).await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/coach/ask",
            Some(json!({"question": "Is rice healthy?"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    assert_eq!(body["error"], "could_not_complete");
    assert_eq!(body["details"], "Error connecting to AI.");
}

#[tokio::test]
async fn test_food_identification() {
    let reply = "```json\n[{\"name\": \"Poutine\", \"calories\": 740.4, \"protein\": 20, \"carbs\": 80, \"fats\": 38}]\n```";
    let (app, _state) = common::create_local_app(
        Arc::new(MemoryKvStore::new()),
        ScriptedModel::replying(reply),
    )
    .await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/coach/food",
            Some(json!({"description": "poutine"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["options"][0]["name"], "Poutine");
    assert_eq!(body["options"][0]["calories"], 740);
}

#[tokio::test]
async fn test_food_identification_failures() {
    let (app, _state) = common::create_local_app(
        Arc::new(MemoryKvStore::new()),
        ScriptedModel::replying("I am not sure what that is."),
    )
    .await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/coach/food",
            Some(json!({"description": "mystery stew"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(response).await["details"], "Could not analyze food.");

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/coach/food",
            Some(json!({"image": "not base64!"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(json_request("POST", "/api/coach/food", Some(json!({}))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

fn onboarding_form(name: &str, age: &str) -> serde_json::Value {
    json!({
        "name": name,
        "age": age,
        "currentWeight": "80",
        "goalWeight": "70",
        "activityLevel": "low",
        "unit": "kg",
        "autoCalcCalories": true,
        "targetCalories": ""
    })
}

#[tokio::test]
async fn test_onboarding_requires_a_name() {
    let (app, state) =
        common::create_local_app(Arc::new(MemoryKvStore::new()), ScriptedModel::offline()).await;

    for name in ["", "   "] {
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/onboarding",
                Some(onboarding_form(name, "30")),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{name:?}");
    }
    assert_eq!(state.session.profile(), None);
}

#[tokio::test]
async fn test_onboarding_keeps_typed_age() {
    let (app, _state) =
        common::create_local_app(Arc::new(MemoryKvStore::new()), ScriptedModel::offline()).await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/onboarding",
            Some(onboarding_form("Ana", "200")),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["profile"]["age"], 200);
    assert_eq!(body["needsOnboarding"], false);
}
