// src/cache.rs
//! Cache and daily quota in front of the aggregator.
//!
//! `CacheQuota` owns all cache/quota state behind one mutex so the admission decision
//! (serve cached, fetch fresh, serve stale or reject) is taken atomically.
//! `FeedGateway` wires it to the `Aggregator`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::aggregate::{Aggregator, FetchOptions};
use crate::error::{FeedError, Result};
use crate::model::{AggregationResult, ProfileFetchResult};

pub const DEFAULT_CACHE_DURATION: Duration = Duration::from_secs(12 * 3600);
pub const DEFAULT_DAILY_MAX: u32 = 10;
/// Profile component of the key for all-profile requests.
pub const ALL_PROFILES: &str = "all";

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("cache_hits_total", "Requests answered from a valid cache entry.");
        describe_counter!("cache_stale_total", "Requests answered with stale data after the quota ran out.");
        describe_counter!("quota_rejections_total", "Requests rejected because the quota ran out and nothing was cached.");
    });
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheKey {
    /// Profile id or `"all"`.
    pub profile: String,
    pub include_items: bool,
    pub ai: bool,
}

impl CacheKey {
    pub fn new(profile: Option<&str>, include_items: bool, ai: bool) -> Self {
        Self {
            profile: profile.unwrap_or(ALL_PROFILES).to_string(),
            include_items,
            ai,
        }
    }

    /// Quota counters are shared by every key of the same profile.
    pub fn quota_key(&self) -> &str {
        &self.profile
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
    pub data: T,
    pub timestamp: DateTime<Utc>,
    pub key: CacheKey,
}

/// Outcome of `CacheQuota::admit`.
#[derive(Debug, Clone, PartialEq)]
pub enum Admission<T> {
    /// Go fetch; the quota has been charged unless the request was forced.
    Fresh,
    Cached(CacheEntry<T>),
    /// Quota exhausted; the newest entry regardless of age.
    Stale(CacheEntry<T>),
    Rejected,
}

#[derive(Debug, Clone, Copy)]
pub struct CachePolicy {
    pub cache_duration: Duration,
    pub daily_max: u32,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            cache_duration: DEFAULT_CACHE_DURATION,
            daily_max: DEFAULT_DAILY_MAX,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct DailyCounter {
    day: NaiveDate,
    count: u32,
}

#[derive(Debug)]
struct State<T> {
    entries: HashMap<CacheKey, CacheEntry<T>>,
    counters: HashMap<String, DailyCounter>,
}

impl<T> State<T> {
    /// Today's count for `quota_key`, resetting on UTC-day rollover.
    fn counter(&mut self, quota_key: &str, now: DateTime<Utc>) -> &mut DailyCounter {
        let today = now.date_naive();
        let c = self
            .counters
            .entry(quota_key.to_string())
            .or_insert(DailyCounter { day: today, count: 0 });
        if c.day != today {
            c.day = today;
            c.count = 0;
        }
        c
    }
}

pub struct CacheQuota<T> {
    state: Mutex<State<T>>,
    policy: CachePolicy,
}

impl<T: Clone + Send> CacheQuota<T> {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            state: Mutex::new(State {
                entries: HashMap::new(),
                counters: HashMap::new(),
            }),
            policy,
        }
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    fn is_valid(&self, entry: &CacheEntry<T>, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(entry.timestamp);
        match age.to_std() {
            Ok(age) => age < self.policy.cache_duration,
            // Timestamp in the future: treat as just written.
            Err(_) => true,
        }
    }

    /// The entry for `key` if still within the cache duration.
    pub async fn get(&self, key: &CacheKey, now: DateTime<Utc>) -> Option<CacheEntry<T>> {
        let st = self.state.lock().await;
        st.entries
            .get(key)
            .filter(|e| self.is_valid(e, now))
            .cloned()
    }

    /// Store `data` for `key`, replacing any previous entry.
    pub async fn set(&self, key: CacheKey, data: T, now: DateTime<Utc>) {
        let mut st = self.state.lock().await;
        st.entries.insert(
            key.clone(),
            CacheEntry {
                data,
                timestamp: now,
                key,
            },
        );
    }

    /// Charge one fresh fetch to `quota_key`; returns today's count.
    pub async fn increment(&self, quota_key: &str, now: DateTime<Utc>) -> u32 {
        let mut st = self.state.lock().await;
        let c = st.counter(quota_key, now);
        c.count += 1;
        c.count
    }

    pub async fn used_today(&self, quota_key: &str, now: DateTime<Utc>) -> u32 {
        let mut st = self.state.lock().await;
        st.counter(quota_key, now).count
    }

    pub async fn remaining(&self, quota_key: &str, now: DateTime<Utc>) -> u32 {
        self.policy
            .daily_max
            .saturating_sub(self.used_today(quota_key, now).await)
    }

    /// Decide how to answer a request for `key`, charging the quota on `Fresh`.
    pub async fn admit(&self, key: &CacheKey, force: bool, now: DateTime<Utc>) -> Admission<T> {
        if force {
            return Admission::Fresh;
        }
        let mut st = self.state.lock().await;
        if let Some(entry) = st.entries.get(key) {
            if self.is_valid(entry, now) {
                return Admission::Cached(entry.clone());
            }
        }
        let daily_max = self.policy.daily_max;
        let c = st.counter(key.quota_key(), now);
        if c.count < daily_max {
            c.count += 1;
            return Admission::Fresh;
        }
        match st.entries.get(key) {
            Some(entry) => Admission::Stale(entry.clone()),
            None => Admission::Rejected,
        }
    }
}

/// What `/feeds` returns: one profile run or a whole aggregation.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum FeedData {
    Profile(Box<ProfileFetchResult>),
    All(Box<AggregationResult>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedRequest {
    pub profile: Option<String>,
    pub include_items: bool,
    pub ai: bool,
    pub force: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayResponse {
    pub data: FeedData,
    pub cached: bool,
    pub stale: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

pub struct FeedGateway {
    aggregator: Arc<Aggregator>,
    cache: CacheQuota<FeedData>,
    inflight: Mutex<HashMap<CacheKey, Arc<Mutex<()>>>>,
}

impl FeedGateway {
    pub fn new(aggregator: Arc<Aggregator>, policy: CachePolicy) -> Self {
        Self {
            aggregator,
            cache: CacheQuota::new(policy),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    pub fn aggregator(&self) -> &Arc<Aggregator> {
        &self.aggregator
    }

    pub fn cache(&self) -> &CacheQuota<FeedData> {
        &self.cache
    }

    async fn key_guard(&self, key: &CacheKey) -> Arc<Mutex<()>> {
        let mut map = self.inflight.lock().await;
        map.entry(key.clone()).or_default().clone()
    }

    pub async fn get_feeds(&self, req: FeedRequest) -> Result<GatewayResponse> {
        self.get_feeds_at(req, Utc::now).await
    }

    /// `clock` is read after the per-key guard is held.
    pub async fn get_feeds_at<F>(&self, req: FeedRequest, clock: F) -> Result<GatewayResponse>
    where
        F: Fn() -> DateTime<Utc>,
    {
        ensure_metrics_described();
        if let Some(id) = req.profile.as_deref() {
            if self.aggregator.catalog().profile(id).is_none() {
                return Err(FeedError::ProfileNotFound { id: id.to_string() });
            }
        }

        let key = CacheKey::new(req.profile.as_deref(), req.include_items, req.ai);
        let guard = self.key_guard(&key).await;
        let _held = guard.lock().await;

        let now = clock();
        match self.cache.admit(&key, req.force, now).await {
            Admission::Cached(entry) => {
                counter!("cache_hits_total").increment(1);
                tracing::debug!(target: "cache", profile = %key.profile, "serving cached feeds");
                Ok(GatewayResponse {
                    data: entry.data,
                    cached: true,
                    stale: false,
                    warning: None,
                    fetched_at: entry.timestamp,
                })
            }
            Admission::Stale(entry) => {
                counter!("cache_stale_total").increment(1);
                tracing::warn!(target: "cache", profile = %key.profile, "quota exhausted, serving stale feeds");
                Ok(GatewayResponse {
                    data: entry.data,
                    cached: true,
                    stale: true,
                    warning: Some(format!(
                        "Daily refresh limit of {} reached; showing data from {}",
                        self.cache.policy().daily_max,
                        entry.timestamp.to_rfc3339()
                    )),
                    fetched_at: entry.timestamp,
                })
            }
            Admission::Rejected => {
                counter!("quota_rejections_total").increment(1);
                tracing::warn!(target: "cache", profile = %key.profile, "quota exhausted and nothing cached");
                Err(FeedError::QuotaExceeded {
                    key: key.quota_key().to_string(),
                })
            }
            Admission::Fresh => {
                let opts = FetchOptions {
                    include_items: req.include_items,
                    ai: req.ai,
                };
                let data = match req.profile.as_deref() {
                    Some(id) => FeedData::Profile(Box::new(
                        self.aggregator.fetch_profile_by_id(id, opts).await?,
                    )),
                    None => FeedData::All(Box::new(
                        self.aggregator
                            .fetch_from_all_active_profiles_with(opts)
                            .await?,
                    )),
                };
                let fetched_at = clock();
                self.cache.set(key, data.clone(), fetched_at).await;
                Ok(GatewayResponse {
                    data,
                    cached: false,
                    stale: false,
                    warning: None,
                    fetched_at,
                })
            }
        }
    }
}
