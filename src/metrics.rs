// src/metrics.rs
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

use crate::cache::CachePolicy;

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

#[derive(Clone)]
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder (once per process) and publish the cache policy.
    pub fn init(policy: CachePolicy) -> anyhow::Result<Self> {
        let handle = HANDLE
            .get_or_try_init(|| {
                // Use default buckets to avoid API differences across crate versions.
                PrometheusBuilder::new().install_recorder()
            })?
            .clone();

        describe_counter!("dedup_removed_total", "Items removed as near-duplicates.");
        describe_gauge!("feeds_cache_ttl_secs", "Configured cache duration in seconds.");
        describe_gauge!("feeds_daily_quota", "Configured fresh fetches per profile and day.");
        gauge!("feeds_cache_ttl_secs").set(policy.cache_duration.as_secs() as f64);
        gauge!("feeds_daily_quota").set(policy.daily_max as f64);

        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router<S>(&self) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
