// tests/cache_gateway.rs
//
// Cache + daily quota in front of the aggregator, driven with an injected clock.
//
// Covered:
// - repeat request inside the TTL is served from cache without touching sources
// - expiry triggers a fresh fetch
// - past the daily maximum: stale serve when cached, quota error otherwise
// - force refresh bypasses quota and cache but still fills the cache
// - unknown profile is rejected before any quota is charged
// - concurrent requests for one key trigger a single fetch

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use futures::future::join_all;

use focus_feeds::cache::{CachePolicy, FeedData, FeedGateway, FeedRequest};
use focus_feeds::model::SourceKind;
use focus_feeds::store::MemoryStore;
use focus_feeds::{Aggregator, FeedError};

mod common;
use common::*;

fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, h, m, 0).unwrap()
}

fn setup(ttl: Duration, daily_max: u32) -> (FeedGateway, Arc<StaticAdapter>) {
    let adapter = Arc::new(StaticAdapter::new(SourceKind::Syndication).serve(
        "a",
        vec![
            item("a1", "Rust compiler gets faster incremental builds"),
            item("a2", "Async Rust in embedded systems"),
        ],
    ));
    let agg = Aggregator::new(
        catalog(
            vec![source("a")],
            vec![
                profile("rust", &["a"], &["rust"]),
                profile("async", &["a"], &["async"]),
            ],
        ),
        registry(adapter.clone()),
        Arc::new(MemoryStore::new()),
    );
    let gw = FeedGateway::new(
        Arc::new(agg),
        CachePolicy {
            cache_duration: ttl,
            daily_max,
        },
    );
    (gw, adapter)
}

fn req(profile: &str) -> FeedRequest {
    FeedRequest {
        profile: Some(profile.to_string()),
        include_items: true,
        ai: false,
        force: false,
    }
}

#[tokio::test]
async fn cached_within_ttl_then_refetched_after_expiry() {
    let (gw, adapter) = setup(Duration::from_secs(3600), 10);

    let first = gw.get_feeds_at(req("rust"), || at(8, 0)).await.unwrap();
    assert!(!first.cached);
    assert_eq!(adapter.calls(), 1);

    let second = gw.get_feeds_at(req("rust"), || at(8, 30)).await.unwrap();
    assert!(second.cached);
    assert!(!second.stale);
    assert_eq!(second.fetched_at, first.fetched_at);
    assert_eq!(
        serde_json::to_value(&second.data).unwrap(),
        serde_json::to_value(&first.data).unwrap()
    );
    assert_eq!(adapter.calls(), 1, "cache hit must not reach the sources");

    let third = gw.get_feeds_at(req("rust"), || at(9, 1)).await.unwrap();
    assert!(!third.cached);
    assert_eq!(adapter.calls(), 2);
    assert_eq!(gw.cache().used_today("rust", at(9, 1)).await, 2);
}

#[tokio::test]
async fn past_daily_max_serves_stale_or_rejects() {
    // Zero TTL: every entry is already expired, so each request wants a fresh fetch.
    let (gw, adapter) = setup(Duration::ZERO, 2);

    for m in 0..2 {
        let r = gw.get_feeds_at(req("rust"), || at(8, m)).await.unwrap();
        assert!(!r.cached);
    }
    let stale = gw.get_feeds_at(req("rust"), || at(8, 5)).await.unwrap();
    assert!(stale.cached);
    assert!(stale.stale);
    assert!(stale.warning.unwrap().contains("Daily refresh limit of 2"));
    assert_eq!(stale.fetched_at, at(8, 1));
    assert_eq!(adapter.calls(), 2, "no silent fresh fetch past the quota");

    // Same profile, different variant with nothing cached: explicit error.
    let other_variant = FeedRequest {
        include_items: false,
        ..req("rust")
    };
    let err = gw.get_feeds_at(other_variant, || at(8, 6)).await.unwrap_err();
    assert!(matches!(err, FeedError::QuotaExceeded { ref key } if key == "rust"));

    // Other profiles keep their own quota.
    assert!(!gw.get_feeds_at(req("async"), || at(8, 7)).await.unwrap().cached);

    // Next UTC day the counter starts over.
    let tomorrow = Utc.with_ymd_and_hms(2025, 3, 11, 0, 0, 1).unwrap();
    assert!(!gw.get_feeds_at(req("rust"), || tomorrow).await.unwrap().cached);
}

#[tokio::test]
async fn force_refresh_bypasses_quota_and_fills_cache() {
    let (gw, adapter) = setup(Duration::from_secs(3600), 0);

    let err = gw.get_feeds_at(req("rust"), || at(8, 0)).await.unwrap_err();
    assert!(matches!(err, FeedError::QuotaExceeded { .. }));

    let forced = FeedRequest {
        force: true,
        ..req("rust")
    };
    let r = gw.get_feeds_at(forced.clone(), || at(8, 1)).await.unwrap();
    assert!(!r.cached);
    assert_eq!(gw.cache().used_today("rust", at(8, 1)).await, 0);

    // Force skips the cache read too.
    gw.get_feeds_at(forced, || at(8, 2)).await.unwrap();
    assert_eq!(adapter.calls(), 2);

    let cached = gw.get_feeds_at(req("rust"), || at(8, 3)).await.unwrap();
    assert!(cached.cached);
    assert_eq!(cached.fetched_at, at(8, 2));
    assert_eq!(adapter.calls(), 2);
}

#[tokio::test]
async fn unknown_profile_is_rejected_without_charging() {
    let (gw, adapter) = setup(Duration::from_secs(3600), 1);
    let err = gw.get_feeds_at(req("missing"), || at(8, 0)).await.unwrap_err();
    assert!(matches!(err, FeedError::ProfileNotFound { .. }));
    assert_eq!(gw.cache().used_today("missing", at(8, 0)).await, 0);
    assert_eq!(adapter.calls(), 0);
}

#[tokio::test]
async fn all_profiles_request_returns_aggregation() {
    let (gw, adapter) = setup(Duration::from_secs(3600), 5);
    let r = gw
        .get_feeds_at(
            FeedRequest {
                profile: None,
                include_items: false,
                ai: false,
                force: false,
            },
            || at(8, 0),
        )
        .await
        .unwrap();
    match r.data {
        FeedData::All(run) => {
            assert_eq!(run.profiles.len(), 2);
            assert_eq!(run.sources_succeeded, 2);
        }
        FeedData::Profile(_) => panic!("expected an aggregation result"),
    }
    assert_eq!(adapter.calls(), 2, "one fetch per profile source");
    assert_eq!(gw.cache().used_today("all", at(8, 0)).await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_for_one_key_fetch_once() {
    let (gw, adapter) = setup(Duration::from_secs(3600), 10);
    let gw = Arc::new(gw);

    let tasks = (0..8).map(|_| {
        let gw = gw.clone();
        tokio::spawn(async move { gw.get_feeds(req("rust")).await })
    });
    let results = join_all(tasks).await;

    let mut fresh = 0;
    for r in results {
        let resp = r.unwrap().unwrap();
        if !resp.cached {
            fresh += 1;
        }
    }
    assert_eq!(fresh, 1);
    assert_eq!(adapter.calls(), 1);
}
