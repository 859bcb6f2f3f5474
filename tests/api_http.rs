// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - GET /editais  (idle before the first fetch)
// - POST /editais/refresh  (success from a fixture, fallback on failure)

use std::sync::Arc;

use serde_json::Value as Json;
use shuttle_axum::axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use tower::ServiceExt as _; // for `oneshot`

use editais_monitor::config::MonitorConfig;
use editais_monitor::ingest::fixture_adapter;
use editais_monitor::{api, monitor_with_adapter, AppState, Monitor};

const BODY_LIMIT: usize = 1024 * 1024; // 1MB, safe for tests
const RSS2JSON: &str = include_str!("fixtures/rss2json_ok.json");

fn monitor(kind: &str, payload: &str) -> Monitor {
    let adapter = fixture_adapter(kind, payload).expect("fixture adapter");
    monitor_with_adapter(&MonitorConfig::default(), Arc::from(adapter))
}

/// Build the same Router the binary uses.
fn test_router(monitor: Monitor) -> Router {
    api::router(AppState::new(monitor))
}

async fn send(app: Router, method: &str, uri: &str) -> (StatusCode, Vec<u8>) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    let resp = app.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    (status, bytes)
}

#[tokio::test]
async fn api_health_returns_200_and_ok_body() {
    let app = test_router(monitor("rss2json", RSS2JSON));
    let (status, bytes) = send(app, "GET", "/health").await;
    assert_eq!(status, StatusCode::OK, "health should be 200");
    assert_eq!(String::from_utf8(bytes).expect("utf8").trim(), "ok");
}

#[tokio::test]
async fn api_editais_is_idle_before_first_fetch() {
    let app = test_router(monitor("rss2json", RSS2JSON));
    let (status, bytes) = send(app, "GET", "/editais").await;
    assert_eq!(status, StatusCode::OK);

    let v: Json = serde_json::from_slice(&bytes).expect("parse json");
    assert_eq!(v["status"], "idle");
    assert!(v["origin"].is_null());
    assert_eq!(v["items"].as_array().map(Vec::len), Some(0));
    assert_eq!(v["fetching"], false);
}

#[tokio::test]
async fn api_refresh_then_get_returns_live_items() {
    let m = monitor("rss2json", RSS2JSON);

    let (status, bytes) = send(test_router(m.clone()), "POST", "/editais/refresh").await;
    assert_eq!(status, StatusCode::OK);
    let v: Json = serde_json::from_slice(&bytes).expect("parse refresh json");
    assert_eq!(v["status"], "success");
    assert_eq!(v["origin"], "live");

    let (_, bytes) = send(test_router(m), "GET", "/editais").await;
    let v: Json = serde_json::from_slice(&bytes).expect("parse get json");
    let items = v["items"].as_array().expect("items array");
    assert_eq!(items.len(), 3);

    // Contract checks for the site cards
    let first = &items[0];
    assert_eq!(first["title"], "Edital Paulo Gustavo abre inscrições para audiovisual");
    assert_eq!(first["category"], "CULTURE");
    assert_eq!(first["category_label"], "CULTURA");
    assert_eq!(first["published_label"], "20/11/2024");
    assert!(first["link"].as_str().unwrap().starts_with("https://"));
    assert!(v["fetched_at"].is_string());
}

#[tokio::test]
async fn api_refresh_failure_serves_fallback() {
    let m = monitor("custom_search", r#"{"error":{"code":403,"message":"forbidden"}}"#);

    let (status, bytes) = send(test_router(m), "POST", "/editais/refresh").await;
    assert_eq!(status, StatusCode::OK, "a failed source is not an HTTP error");
    let v: Json = serde_json::from_slice(&bytes).expect("parse json");
    assert_eq!(v["status"], "failed");
    assert_eq!(v["origin"], "fallback");
    assert_eq!(v["detail"], "upstream");
    assert_eq!(v["items"].as_array().map(Vec::len), Some(3));
    assert_eq!(v["items"][2]["category_label"], "EDUCAÇÃO");
}
