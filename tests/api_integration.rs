//! HTTP API integration tests
//!
//! Drives the full router (auth, handlers, error mapping) against an
//! in-memory libSQL database.

use agent_evals_core::{
    api::{ApiServer, AppState},
    auth::Authenticator,
    config::{AuthConfig, TokenOwner},
    source::{build_source, DataSourceKind},
    LibsqlStorage, StorageBackend,
};
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::DateTime;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

async fn app_with(kind: DataSourceKind) -> Router {
    let storage: Arc<dyn StorageBackend> = Arc::new(LibsqlStorage::in_memory().await.unwrap());
    let source = build_source(kind, storage.clone());
    let auth = Authenticator::new(&AuthConfig {
        tokens: vec![TokenOwner {
            token: "tok-carol".into(),
            owner: "carol".into(),
        }],
        ..Default::default()
    });
    ApiServer::build_router(AppState::new(storage, source), Arc::new(auth))
}

async fn app() -> Router {
    app_with(DataSourceKind::Store).await
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    owner: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(owner) = owner {
        builder = builder.header("x-owner-id", owner);
    }
    let body = match body {
        Some(v) => {
            builder = builder.header("content-type", "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn payload() -> Value {
    json!({
        "interaction_id": "int-001",
        "prompt": "Explain how to implement authentication with JWT in a Node.js application",
        "response": "Issue a signed token at login and verify it in middleware on every request.",
        "score": 0.85,
        "latency_ms": 950
    })
}

#[tokio::test]
async fn test_ingest_returns_created_record() {
    let app = app().await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/evals/ingest",
        Some("alice"),
        Some(payload()),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["owner_id"], "alice");
    assert_eq!(body["data"]["score"], 0.85);
    assert_eq!(body["data"]["flags"], json!([]));
    assert_eq!(body["data"]["pii_tokens_redacted"], 0);
    assert!(body["data"]["id"].as_str().is_some());
}

#[tokio::test]
async fn test_ingest_validation_errors() {
    let app = app().await;

    let mut missing = payload();
    missing.as_object_mut().unwrap().remove("prompt");
    missing.as_object_mut().unwrap().remove("score");
    let (status, body) = send(&app, Method::POST, "/api/evals/ingest", Some("alice"), Some(missing)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing required fields: prompt, score");

    let mut out_of_range = payload();
    out_of_range["score"] = json!(1.2);
    let (status, body) = send(&app, Method::POST, "/api/evals/ingest", Some("alice"), Some(out_of_range)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Score must be between 0 and 1");

    let mut negative = payload();
    negative["latency_ms"] = json!(-5);
    let (status, _) = send(&app, Method::POST, "/api/evals/ingest", Some("alice"), Some(negative)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // nothing was stored
    let (_, page) = send(&app, Method::GET, "/api/evaluations", Some("alice"), None).await;
    assert_eq!(page["total_count"], 0);
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = app().await;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/evals/ingest")
        .header("x-owner-id", "alice")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(body["error"].as_str().is_some());
}

#[tokio::test]
async fn test_unauthenticated_requests_are_rejected() {
    let app = app().await;
    let (status, body) = send(&app, Method::POST, "/api/evals/ingest", None, Some(payload())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "error": "Unauthorized" }));

    let (status, _) = send(&app, Method::GET, "/api/dashboard", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_bearer_token_resolves_owner() {
    let app = app().await;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/evals/ingest")
        .header("authorization", "Bearer tok-carol")
        .header("content-type", "application/json")
        .body(Body::from(payload().to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["data"]["owner_id"], "carol");
}

#[tokio::test]
async fn test_owners_are_isolated() {
    let app = app().await;
    let (_, created) = send(&app, Method::POST, "/api/evals/ingest", Some("alice"), Some(payload())).await;
    let id = created["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = send(&app, Method::GET, &format!("/api/evaluations/{}", id), Some("bob"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, page) = send(&app, Method::GET, "/api/evaluations", Some("bob"), None).await;
    assert_eq!(page["total_count"], 0);

    let (_, view) = send(&app, Method::GET, "/api/dashboard", Some("bob"), None).await;
    assert_eq!(view["summary"]["count"], 0);
}

#[tokio::test]
async fn test_dashboard_reflects_ingested_records() {
    let app = app().await;
    for (latency, score, flags) in [(100, 0.5, json!([])), (200, 0.7, json!(["failed"])), (300, 0.9, json!([]))] {
        let mut body = payload();
        body["latency_ms"] = json!(latency);
        body["score"] = json!(score);
        body["flags"] = flags;
        let (status, _) = send(&app, Method::POST, "/api/evals/ingest", Some("alice"), Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, view) = send(&app, Method::GET, "/api/dashboard", Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["synthetic"], false);
    assert_eq!(view["summary"]["count"], 3);
    assert_eq!(view["summary"]["avg_latency_ms"], 200.0);
    let success = view["summary"]["success_rate"].as_f64().unwrap();
    assert!((success - 200.0 / 3.0).abs() < 1e-9);
    assert_eq!(view["last_7_days"].as_array().unwrap().len(), 7);
    assert_eq!(view["last_30_days"].as_array().unwrap().len(), 30);
    assert_eq!(view["last_7_days"][6]["count"], 3);
}

#[tokio::test]
async fn test_listing_pages_newest_first() {
    let app = app().await;
    for i in 0..55 {
        let mut body = payload();
        body["interaction_id"] = json!(format!("int-{:03}", i));
        send(&app, Method::POST, "/api/evals/ingest", Some("alice"), Some(body)).await;
    }

    let (_, first) = send(&app, Method::GET, "/api/evaluations?page=1", Some("alice"), None).await;
    assert_eq!(first["items"].as_array().unwrap().len(), 50);
    assert_eq!(first["total_count"], 55);
    assert_eq!(first["total_pages"], 2);

    let (_, second) = send(&app, Method::GET, "/api/evaluations?page=2", Some("alice"), None).await;
    assert_eq!(second["items"].as_array().unwrap().len(), 5);

    let items: Vec<&Value> = first["items"]
        .as_array()
        .unwrap()
        .iter()
        .chain(second["items"].as_array().unwrap())
        .collect();
    for pair in items.windows(2) {
        let newer = DateTime::parse_from_rfc3339(pair[0]["created_at"].as_str().unwrap()).unwrap();
        let older = DateTime::parse_from_rfc3339(pair[1]["created_at"].as_str().unwrap()).unwrap();
        assert!(newer >= older, "{} listed before {}", newer, older);
    }
    let mut ids: Vec<&str> = items.iter().map(|i| i["id"].as_str().unwrap()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 55);

    let (_, fallback) = send(&app, Method::GET, "/api/evaluations?page=abc", Some("alice"), None).await;
    assert_eq!(fallback["current_page"], 1);
}

#[tokio::test]
async fn test_settings_round_trip_controls_detail_masking() {
    let app = app().await;

    let (status, defaults) = send(&app, Method::GET, "/api/settings", Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        defaults,
        json!({
            "run_policy": "always",
            "sample_rate_pct": 100,
            "obfuscate_pii": false,
            "max_eval_per_day": 1000
        })
    );

    let (_, created) = send(&app, Method::POST, "/api/evals/ingest", Some("alice"), Some(payload())).await;
    let uri = format!("/api/evaluations/{}", created["data"]["id"].as_str().unwrap());

    let (_, plain) = send(&app, Method::GET, &uri, Some("alice"), None).await;
    assert_eq!(plain["obfuscated"], false);
    assert_eq!(plain["prompt"], payload()["prompt"]);

    let wanted = json!({
        "run_policy": "sampled",
        "sample_rate_pct": 10,
        "obfuscate_pii": true,
        "max_eval_per_day": 50
    });
    let (status, saved) = send(&app, Method::PUT, "/api/settings", Some("alice"), Some(wanted.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saved, wanted);

    let (_, masked) = send(&app, Method::GET, &uri, Some("alice"), None).await;
    assert_eq!(masked["obfuscated"], true);
    let prompt = masked["prompt"].as_str().unwrap();
    assert!(prompt.starts_with("Explain ho"));
    assert!(prompt.contains('*'));
    assert_eq!(
        prompt.chars().count(),
        payload()["prompt"].as_str().unwrap().chars().count()
    );

    // bob still sees defaults
    let (_, other) = send(&app, Method::GET, "/api/settings", Some("bob"), None).await;
    assert_eq!(other["obfuscate_pii"], false);
}

#[tokio::test]
async fn test_invalid_settings_are_rejected() {
    let app = app().await;
    let (status, body) = send(
        &app,
        Method::PUT,
        "/api/settings",
        Some("alice"),
        Some(json!({
            "run_policy": "always",
            "sample_rate_pct": 150,
            "obfuscate_pii": false,
            "max_eval_per_day": 1000
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("sample_rate_pct"));

    let (status, _) = send(
        &app,
        Method::PUT,
        "/api/settings",
        Some("alice"),
        Some(json!({ "run_policy": "never" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_synthetic_source_is_flagged() {
    let app = app_with(DataSourceKind::Synthetic).await;

    let (_, view) = send(&app, Method::GET, "/api/dashboard", Some("demo"), None).await;
    assert_eq!(view["synthetic"], true);
    assert!(view["summary"]["count"].as_u64().unwrap() > 0);

    let (_, page) = send(&app, Method::GET, "/api/evaluations?page=3", Some("demo"), None).await;
    assert_eq!(page["total_count"], 120);
    assert_eq!(page["items"].as_array().unwrap().len(), 20);

    let (_, health) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(health["synthetic"], true);
}
