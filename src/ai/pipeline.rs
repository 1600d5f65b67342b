// src/ai/pipeline.rs
//! Bounded-concurrency enrichment of processed items.
//!
//! Items are enriched in chunks of `max_concurrency`; the items of one chunk run
//! concurrently and chunks are separated by a fixed delay. A failing item never fails the
//! batch: it comes back as an error record in `BatchOutcome::failed`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::future::join_all;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use serde::Serialize;

use crate::ai::provider::{AiProvider, TokenUsage};
use crate::analyze::sort_by_score;
use crate::config::ai::AiConfig;
use crate::error::{FeedError, Result};
use crate::model::{Enrichment, FeedItem, FocusProfile, ProcessingMetadata};

const KEYWORD_SHARE: f32 = 0.4;
const SEMANTIC_SHARE: f32 = 0.6;
/// Reported when no summary was requested.
const NEUTRAL_CONFIDENCE: f32 = 0.5;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ai_items_total", "Items successfully enriched by the AI pipeline.");
        describe_counter!("ai_failures_total", "Items that degraded to an AI error record.");
        describe_histogram!("ai_item_ms", "Per-item enrichment time in milliseconds.");
    });
}

#[derive(Debug, Clone)]
pub struct EnhancerConfig {
    pub max_concurrency: usize,
    pub chunk_delay: Duration,
    pub item_timeout: Duration,
    pub cost_per_1k_tokens: f64,
}

impl Default for EnhancerConfig {
    fn default() -> Self {
        Self::from(&AiConfig::default())
    }
}

impl From<&AiConfig> for EnhancerConfig {
    fn from(cfg: &AiConfig) -> Self {
        Self {
            max_concurrency: cfg.max_concurrency.max(1),
            chunk_delay: Duration::from_millis(cfg.chunk_delay_ms),
            item_timeout: Duration::from_secs(cfg.item_timeout_secs),
            cost_per_1k_tokens: cfg.cost_per_1k_tokens,
        }
    }
}

/// Which capabilities to run for an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnhanceOptions {
    pub summary: bool,
    pub tags: bool,
    pub insights: bool,
    pub semantic: bool,
}

impl EnhanceOptions {
    pub fn all() -> Self {
        Self {
            summary: true,
            tags: true,
            insights: true,
            semantic: true,
        }
    }

    pub fn for_profile(profile: &FocusProfile) -> Self {
        let p = &profile.processing;
        Self {
            summary: p.generate_summary,
            tags: p.enhance_tags,
            insights: p.generate_summary,
            semantic: p.score_relevance && !profile.description.trim().is_empty(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStats {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub total_time_ms: u64,
    pub avg_time_ms: u64,
    pub tokens: TokenUsage,
    pub estimated_cost: f64,
}

#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub processed: Vec<FeedItem>,
    pub failed: Vec<FeedItem>,
    pub stats: BatchStats,
}

pub struct AiEnhancer {
    provider: Arc<dyn AiProvider>,
    cfg: EnhancerConfig,
}

impl AiEnhancer {
    pub fn new(provider: Arc<dyn AiProvider>, cfg: EnhancerConfig) -> Self {
        Self { provider, cfg }
    }

    pub fn provider(&self) -> &Arc<dyn AiProvider> {
        &self.provider
    }

    pub fn config(&self) -> &EnhancerConfig {
        &self.cfg
    }

    async fn enrich(
        &self,
        item: &FeedItem,
        opts: EnhanceOptions,
        description: &str,
    ) -> Result<(Enrichment, ProcessingMetadata, TokenUsage)> {
        let t0 = Instant::now();
        let mut usage = TokenUsage::default();
        let mut enrichment = Enrichment::default();
        let mut confidence = NEUTRAL_CONFIDENCE;

        if opts.summary {
            let c = self.provider.generate_summary(item).await?;
            usage.add(c.usage);
            confidence = c.value.confidence;
            enrichment.summary = Some(c.value.summary);
        }
        if opts.tags {
            let c = self.provider.generate_tags(item).await?;
            usage.add(c.usage);
            enrichment.tags = Some(c.value);
        }
        if opts.insights {
            let c = self.provider.extract_insights(item).await?;
            usage.add(c.usage);
            enrichment.insights = Some(c.value);
        }
        if opts.semantic && !description.trim().is_empty() {
            let c = self
                .provider
                .calculate_semantic_relevance(item, description)
                .await?;
            usage.add(c.usage);
            let keyword = item.relevance_score.unwrap_or(0.0);
            enrichment.semantic_score = Some(blend(keyword, c.value));
        }

        let meta = ProcessingMetadata {
            provider: self.provider.name().to_string(),
            model: self.provider.model().to_string(),
            confidence,
            processing_time_ms: t0.elapsed().as_millis() as u64,
            tokens_used: usage.total_tokens,
            processed_at: Utc::now(),
            error: None,
        };
        Ok((enrichment, meta, usage))
    }

    /// Enrich one item. `Err` carries the error record: original fields plus
    /// `{provider, model: "error", confidence: 0}` metadata.
    pub async fn process_item(
        &self,
        item: FeedItem,
        opts: EnhanceOptions,
        description: &str,
    ) -> std::result::Result<FeedItem, FeedItem> {
        self.process_item_metered(item, opts, description).await.0
    }

    async fn process_item_metered(
        &self,
        mut item: FeedItem,
        opts: EnhanceOptions,
        description: &str,
    ) -> (std::result::Result<FeedItem, FeedItem>, TokenUsage) {
        ensure_metrics_described();
        if item.ai_summary.is_some() {
            return (Ok(item), TokenUsage::default());
        }

        let t0 = Instant::now();
        let outcome = match tokio::time::timeout(
            self.cfg.item_timeout,
            self.enrich(&item, opts, description),
        )
        .await
        {
            Ok(res) => res,
            Err(_) => Err(FeedError::Timeout(self.cfg.item_timeout)),
        };
        histogram!("ai_item_ms").record(t0.elapsed().as_millis() as f64);

        match outcome {
            Ok((enrichment, meta, usage)) => {
                counter!("ai_items_total").increment(1);
                item.apply_enrichment(enrichment, meta);
                (Ok(item), usage)
            }
            Err(e) => {
                counter!("ai_failures_total").increment(1);
                tracing::warn!(
                    target: "ai",
                    provider = self.provider.name(),
                    item = %item.id,
                    error = %e,
                    "enrichment failed, keeping item as error record"
                );
                item.processing_metadata = Some(ProcessingMetadata {
                    provider: self.provider.name().to_string(),
                    model: "error".to_string(),
                    confidence: 0.0,
                    processing_time_ms: t0.elapsed().as_millis() as u64,
                    tokens_used: 0,
                    processed_at: Utc::now(),
                    error: Some(e.to_string()),
                });
                (Err(item), TokenUsage::default())
            }
        }
    }

    /// Enrich `items` chunk by chunk. `processed.len() + failed.len() == items.len()`.
    pub async fn process_batch(&self, items: Vec<FeedItem>, profile: &FocusProfile) -> BatchOutcome {
        self.process_batch_with(items, EnhanceOptions::for_profile(profile), &profile.description)
            .await
    }

    pub async fn process_batch_with(
        &self,
        items: Vec<FeedItem>,
        opts: EnhanceOptions,
        description: &str,
    ) -> BatchOutcome {
        let t0 = Instant::now();
        let total = items.len();
        let chunk_size = self.cfg.max_concurrency.max(1);
        let mut processed = Vec::with_capacity(total);
        let mut failed = Vec::new();
        let mut usage = TokenUsage::default();

        let mut remaining = items.into_iter().peekable();
        let mut first = true;
        while remaining.peek().is_some() {
            if !first && !self.cfg.chunk_delay.is_zero() {
                tokio::time::sleep(self.cfg.chunk_delay).await;
            }
            first = false;

            let chunk: Vec<FeedItem> = remaining.by_ref().take(chunk_size).collect();
            let results = join_all(
                chunk
                    .into_iter()
                    .map(|it| self.process_item_metered(it, opts, description)),
            )
            .await;
            for (r, u) in results {
                usage.add(u);
                match r {
                    Ok(it) => processed.push(it),
                    Err(it) => failed.push(it),
                }
            }
        }

        sort_by_score(&mut processed);

        let total_time_ms = t0.elapsed().as_millis() as u64;
        let stats = BatchStats {
            total,
            succeeded: processed.len(),
            failed: failed.len(),
            total_time_ms,
            avg_time_ms: if total == 0 { 0 } else { total_time_ms / total as u64 },
            tokens: usage,
            estimated_cost: usage.total_tokens as f64 / 1000.0 * self.cfg.cost_per_1k_tokens,
        };
        tracing::info!(
            target: "ai",
            provider = self.provider.name(),
            total,
            succeeded = stats.succeeded,
            failed = stats.failed,
            total_time_ms,
            "AI batch finished"
        );
        BatchOutcome {
            processed,
            failed,
            stats,
        }
    }

    /// `min(1, 0.4·keyword + 0.6·semantic)`. The keyword score comes back unchanged when
    /// there is no description, the provider is not ready, or the provider call fails.
    pub async fn blend_relevance(&self, item: &FeedItem, keyword_score: f32, description: &str) -> f32 {
        if description.trim().is_empty() || !self.provider.is_ready() {
            return keyword_score;
        }
        match self
            .provider
            .calculate_semantic_relevance(item, description)
            .await
        {
            Ok(c) => blend(keyword_score, c.value),
            Err(e) => {
                tracing::debug!(target: "ai", error = %e, "semantic relevance unavailable");
                keyword_score
            }
        }
    }
}

fn blend(keyword: f32, semantic: f32) -> f32 {
    let v = (KEYWORD_SHARE * keyword + SEMANTIC_SHARE * semantic).min(1.0);
    (v * 1000.0).round() / 1000.0
}
