// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - GET /feeds (profile, all, cached flag, unknown profile 404, quota 429, force)
// - GET /status

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

use focus_feeds::ai::ProviderSet;
use focus_feeds::cache::{CachePolicy, FeedGateway};
use focus_feeds::model::SourceKind;
use focus_feeds::store::MemoryStore;
use focus_feeds::{api, Aggregator, AppState};

mod common;
use common::*;

const BODY_LIMIT: usize = 1024 * 1024;

fn test_state(daily_max: u32) -> AppState {
    let adapter = Arc::new(
        StaticAdapter::new(SourceKind::Syndication)
            .serve(
                "a",
                vec![
                    item("a1", "Rust compiler gets faster incremental builds"),
                    item("a2", "Weekend gardening checklist for beginners"),
                ],
            )
            .fail("down"),
    );
    let agg = Aggregator::new(
        catalog(
            vec![source("a"), source("down")],
            vec![profile("rust", &["a", "down"], &["rust"])],
        ),
        registry(adapter),
        Arc::new(MemoryStore::new()),
    );
    AppState {
        gateway: Arc::new(FeedGateway::new(
            Arc::new(agg),
            CachePolicy {
                cache_duration: Duration::from_secs(3600),
                daily_max,
            },
        )),
        providers: ProviderSet::mock_only(),
    }
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    let resp = app.clone().oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    (status, bytes)
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Json) {
    let (status, bytes) = get(app, uri).await;
    let v: Json = serde_json::from_slice(&bytes).expect("parse json");
    (status, v)
}

#[tokio::test]
async fn api_health_returns_200_and_ok_body() {
    let app = api::create_router(test_state(10));
    let (status, bytes) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(String::from_utf8(bytes).unwrap().trim(), "ok");
}

#[tokio::test]
async fn api_feeds_for_profile_then_cached() {
    let app = api::create_router(test_state(10));

    let (status, v) = get_json(&app, "/feeds?profile=rust").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["cached"], false);
    assert_eq!(v["stale"], false);
    assert_eq!(v["data"]["profileId"], "rust");
    let items = v["data"]["items"].as_array().expect("items array");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"], "a1");
    assert!(items[0]["relevanceScore"].as_f64().unwrap() > 0.0);
    let errors = v["data"]["errors"].as_array().expect("errors array");
    assert_eq!(errors.len(), 1, "failing source shows up as a message");

    let (status, v) = get_json(&app, "/feeds?profile=rust").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["cached"], true);
}

#[tokio::test]
async fn api_feeds_all_without_items() {
    let app = api::create_router(test_state(10));
    let (status, v) = get_json(&app, "/feeds?profile=all&includeItems=false").await;
    assert_eq!(status, StatusCode::OK);
    assert!(v["data"]["runId"].is_string());
    assert_eq!(v["data"]["sourcesFailed"], 1);
    assert!(v["data"]["profiles"][0]["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn api_unknown_profile_is_404() {
    let app = api::create_router(test_state(10));
    let (status, v) = get_json(&app, "/feeds?profile=nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(v["error"].as_str().unwrap().contains("nope"));
}

#[tokio::test]
async fn api_quota_exhausted_is_429_unless_forced() {
    let app = api::create_router(test_state(0));

    let (status, v) = get_json(&app, "/feeds?profile=rust").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(v["error"].as_str().unwrap().contains("quota"));

    let (status, v) = get_json(&app, "/feeds?profile=rust&force=true").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["cached"], false);
}

#[tokio::test]
async fn api_status_reports_aggregator_and_providers() {
    let app = api::create_router(test_state(7));
    get_json(&app, "/feeds").await;

    let (status, v) = get_json(&app, "/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["activeProvider"], "mock");
    assert_eq!(v["cache"]["dailyMax"], 7);
    assert_eq!(v["cache"]["ttlSecs"], 3600);
    assert_eq!(v["aggregator"]["enabledProfiles"], 1);
    assert_eq!(v["aggregator"]["isReady"], true);
    assert_eq!(v["recentRuns"].as_array().unwrap().len(), 1);
    assert!(v["providers"].as_array().unwrap().len() >= 1);
}
