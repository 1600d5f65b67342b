// src/aggregate.rs
//! Aggregation orchestrator: fan out to sources, process per profile, enrich, persist.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::future::join_all;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing::{info, warn};

use crate::ai::AiEnhancer;
use crate::analyze::{sort_by_score, ContentProcessor, DEFAULT_SIMILARITY_THRESHOLD};
use crate::config::Catalog;
use crate::error::{FeedError, Result};
use crate::history::{RunHistory, RunSummary, SeenLedger};
use crate::ingest::{self, AdapterRegistry, DEFAULT_FETCH_TIMEOUT};
use crate::model::{AggregationResult, FetchResult, FocusProfile, ProfileFetchResult, SourceConfig};
use crate::store::{FeedStore, RunStatus};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("aggregate_runs_total", "Completed all-profile aggregation runs.");
        describe_counter!("aggregate_store_errors_total", "Failed store writes.");
        describe_gauge!(
            "aggregate_last_run_ts",
            "Unix timestamp of the last finished aggregation run."
        );
    });
}

/// Per-request switches for a profile run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    pub include_items: bool,
    /// Allow AI enrichment (still requires the profile flag and an attached enhancer).
    pub ai: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            include_items: true,
            ai: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatorStatus {
    pub is_ready: bool,
    pub profiles: usize,
    pub enabled_profiles: usize,
    pub sources: usize,
    pub enabled_sources: usize,
    pub adapters: Vec<&'static str>,
    pub ai_provider: Option<String>,
    pub last_run: Option<RunSummary>,
    pub uptime_secs: u64,
}

pub struct Aggregator {
    catalog: Arc<dyn Catalog>,
    adapters: AdapterRegistry,
    store: Arc<dyn FeedStore>,
    processor: ContentProcessor,
    enhancer: Option<Arc<AiEnhancer>>,
    history: Arc<RunHistory>,
    ledger: Arc<SeenLedger>,
    fetch_timeout: Duration,
    started: Instant,
}

impl Aggregator {
    pub fn new(catalog: Arc<dyn Catalog>, adapters: AdapterRegistry, store: Arc<dyn FeedStore>) -> Self {
        Self {
            catalog,
            adapters,
            store,
            processor: ContentProcessor::new(DEFAULT_SIMILARITY_THRESHOLD),
            enhancer: None,
            history: Arc::new(RunHistory::default()),
            ledger: Arc::new(SeenLedger::default()),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            started: Instant::now(),
        }
    }

    pub fn with_enhancer(mut self, enhancer: Arc<AiEnhancer>) -> Self {
        self.enhancer = Some(enhancer);
        self
    }

    pub fn with_history(mut self, history: Arc<RunHistory>) -> Self {
        self.history = history;
        self
    }

    pub fn with_ledger(mut self, ledger: Arc<SeenLedger>) -> Self {
        self.ledger = ledger;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.processor = ContentProcessor::new(threshold);
        self
    }

    pub fn history(&self) -> &Arc<RunHistory> {
        &self.history
    }

    pub fn catalog(&self) -> &Arc<dyn Catalog> {
        &self.catalog
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    /// Fetch one source. Never fails: a missing adapter is reported like a transport error.
    pub async fn fetch_from_source(&self, source: &SourceConfig) -> FetchResult {
        match self.adapters.get(source.kind) {
            Ok(adapter) => ingest::fetch_from_source(adapter.as_ref(), source, self.fetch_timeout).await,
            Err(e) => {
                warn!(target: "aggregate", source = %source.id, error = %e, "no adapter for source");
                FetchResult {
                    source_id: source.id.clone(),
                    source_name: source.name.clone(),
                    success: false,
                    items: Vec::new(),
                    item_count: 0,
                    error: Some(format!("{}: {}", source.name, e)),
                    duration_ms: 0,
                    fetched_at: Utc::now(),
                }
            }
        }
    }

    pub async fn fetch_from_profile(&self, profile: &FocusProfile, include_items: bool) -> ProfileFetchResult {
        self.fetch_from_profile_with(
            profile,
            FetchOptions {
                include_items,
                ..FetchOptions::default()
            },
        )
        .await
    }

    /// Run one profile end to end. Failures land in `errors`, never in an `Err`.
    pub async fn fetch_from_profile_with(&self, profile: &FocusProfile, opts: FetchOptions) -> ProfileFetchResult {
        let t0 = Instant::now();
        let mut errors = Vec::new();

        let sources = self.catalog.sources_for_profile(profile);
        if sources.is_empty() {
            errors.push(format!("profile {} has no enabled sources", profile.id));
        }

        let mut source_results = join_all(sources.iter().map(|s| self.fetch_from_source(s))).await;

        let mut merged = Vec::new();
        for r in source_results.iter_mut() {
            if r.success {
                merged.append(&mut r.items);
            } else if let Some(e) = &r.error {
                errors.push(e.clone());
            }
        }
        let total_items = merged.len();

        let (deduped, duplicates_removed) = if profile.processing.check_duplicates {
            self.processor.deduplicate(merged)
        } else {
            (merged, 0)
        };

        let mut items = self.processor.process_batch(deduped, profile);
        let previously_seen = self.ledger.count_seen(&profile.id, &items);

        let mut ai_enhanced = 0;
        let run_ai = opts.ai && profile.processing.generate_summary;
        if let (true, Some(enhancer)) = (run_ai, &self.enhancer) {
            let outcome = enhancer.process_batch(items, profile).await;
            ai_enhanced = outcome.processed.len();
            if !outcome.failed.is_empty() {
                errors.push(format!(
                    "AI enrichment failed for {} of {} items",
                    outcome.failed.len(),
                    outcome.stats.total
                ));
            }
            items = outcome.processed;
            items.extend(outcome.failed);
            sort_by_score(&mut items);
        }

        let avg_relevance_score = average_score(&items);

        self.ledger.record(&profile.id, &items);
        match self.store.upsert_items(&profile.id, &items).await {
            Ok(report) if report.conflicts > 0 => {
                tracing::debug!(target: "aggregate", profile = %profile.id, conflicts = report.conflicts, "store reported duplicate keys");
            }
            Ok(_) => {}
            Err(e) => {
                counter!("aggregate_store_errors_total").increment(1);
                warn!(target: "aggregate", profile = %profile.id, error = %e, "persisting items failed");
                errors.push(format!("store: {e}"));
            }
        }

        let duration_ms = t0.elapsed().as_millis() as u64;
        info!(
            target: "aggregate",
            profile = %profile.id,
            sources = source_results.len(),
            total_items,
            processed = items.len(),
            duplicates_removed,
            previously_seen,
            ai_enhanced,
            duration_ms,
            "profile run finished"
        );

        ProfileFetchResult {
            profile_id: profile.id.clone(),
            profile_name: profile.name.clone(),
            source_results,
            total_items,
            processed_items: items.len(),
            duplicates_removed,
            previously_seen,
            avg_relevance_score,
            ai_enhanced,
            items: if opts.include_items { items } else { Vec::new() },
            errors,
            duration_ms,
        }
    }

    pub async fn fetch_profile_by_id(&self, id: &str, opts: FetchOptions) -> Result<ProfileFetchResult> {
        let profile = self
            .catalog
            .profile(id)
            .ok_or_else(|| FeedError::ProfileNotFound { id: id.to_string() })?;
        Ok(self.fetch_from_profile_with(&profile, opts).await)
    }

    pub async fn fetch_from_all_active_profiles(&self) -> Result<AggregationResult> {
        self.fetch_from_all_active_profiles_with(FetchOptions {
            include_items: false,
            ai: true,
        })
        .await
    }

    pub async fn fetch_from_all_active_profiles_with(&self, opts: FetchOptions) -> Result<AggregationResult> {
        ensure_metrics_described();
        let t0 = Instant::now();
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let mut errors = Vec::new();

        if let Err(e) = self.store.start_run(&run_id, started_at).await {
            warn!(target: "aggregate", run_id = %run_id, error = %e, "could not open run record");
            errors.push(format!("store: {e}"));
        }

        let profiles = self.catalog.enabled_profiles();
        let results = join_all(profiles.iter().map(|p| self.fetch_from_profile_with(p, opts))).await;

        let mut result = AggregationResult {
            run_id: run_id.clone(),
            profiles: Vec::with_capacity(results.len()),
            total_items: 0,
            processed_items: 0,
            duplicates_removed: 0,
            sources_succeeded: 0,
            sources_failed: 0,
            errors,
            started_at,
            duration_ms: 0,
        };
        for r in results {
            result.total_items += r.total_items;
            result.processed_items += r.processed_items;
            result.duplicates_removed += r.duplicates_removed;
            result.sources_succeeded += r.source_results.iter().filter(|s| s.success).count();
            result.sources_failed += r.source_results.iter().filter(|s| !s.success).count();
            result
                .errors
                .extend(r.errors.iter().map(|e| format!("{}: {e}", r.profile_id)));
            result.profiles.push(r);
        }
        result.duration_ms = t0.elapsed().as_millis() as u64;

        self.history.push(&result);

        let all_failed = result.sources_succeeded == 0 && result.sources_failed > 0;
        let (status, err) = if all_failed {
            (RunStatus::Failed, Some("every source failed".to_string()))
        } else {
            (RunStatus::Completed, None)
        };
        if let Err(e) = self
            .store
            .update_run(&run_id, status, result.processed_items, err)
            .await
        {
            warn!(target: "aggregate", run_id = %run_id, error = %e, "could not close run record");
            result.errors.push(format!("store: {e}"));
        }

        counter!("aggregate_runs_total").increment(1);
        gauge!("aggregate_last_run_ts").set(Utc::now().timestamp() as f64);
        info!(
            target: "aggregate",
            run_id = %run_id,
            profiles = result.profiles.len(),
            processed = result.processed_items,
            sources_failed = result.sources_failed,
            duration_ms = result.duration_ms,
            "aggregation run finished"
        );
        Ok(result)
    }

    pub fn status(&self) -> AggregatorStatus {
        let profiles = self.catalog.profiles();
        let sources = self.catalog.sources();
        let enabled_profiles = profiles.iter().filter(|p| p.enabled).count();
        let mut adapters: Vec<&'static str> = self.adapters.kinds().iter().map(|k| k.as_str()).collect();
        adapters.sort_unstable();
        AggregatorStatus {
            is_ready: enabled_profiles > 0 && !adapters.is_empty(),
            profiles: profiles.len(),
            enabled_profiles,
            sources: sources.len(),
            enabled_sources: sources.iter().filter(|s| s.enabled).count(),
            adapters,
            ai_provider: self
                .enhancer
                .as_ref()
                .map(|e| e.provider().name().to_string()),
            last_run: self.history.last(),
            uptime_secs: self.uptime().as_secs(),
        }
    }
}

fn average_score(items: &[crate::model::FeedItem]) -> f32 {
    let scores: Vec<f32> = items.iter().filter_map(|i| i.relevance_score).collect();
    if scores.is_empty() {
        return 0.0;
    }
    let avg = scores.iter().sum::<f32>() / scores.len() as f32;
    (avg * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FeedItem, SourceKind};

    #[test]
    fn average_ignores_unscored_items() {
        let mut a = FeedItem::new("a", "t", "c", "u", SourceKind::Syndication, "s");
        a.relevance_score = Some(0.5);
        let mut b = a.clone();
        b.relevance_score = Some(0.25);
        let c = FeedItem::new("c", "t", "c", "u", SourceKind::Syndication, "s");
        assert_eq!(average_score(&[a, b, c]), 0.375);
        assert_eq!(average_score(&[]), 0.0);
    }
}
