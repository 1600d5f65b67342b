// src/ai/provider.rs
//! Provider abstraction. Concrete providers implement `complete`; the four capabilities
//! have default implementations built from prompts + structured parsing, which a provider
//! may override (the mock does).

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ai::{parse, prompts};
use crate::error::{FeedError, Result};
use crate::model::{ContentSummary, FeedItem};

/// Request contract shared by every provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AiRequest {
    pub prompt: String,
    pub content: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn add(&mut self, other: TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiResponse {
    pub content: String,
    pub usage: TokenUsage,
    pub model: String,
    pub provider: String,
}

/// A capability result plus the tokens spent producing it.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion<T> {
    pub value: T,
    pub usage: TokenUsage,
}

impl<T> Completion<T> {
    pub fn new(value: T, usage: TokenUsage) -> Self {
        Self { value, usage }
    }
}

/// Lifetime counters kept by every provider.
#[derive(Debug, Default)]
pub struct ProviderStats {
    requests: AtomicU64,
    failures: AtomicU64,
    rate_limited: AtomicU64,
    prompt_tokens: AtomicU64,
    completion_tokens: AtomicU64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStatsSnapshot {
    pub provider: String,
    pub requests: u64,
    pub failures: u64,
    pub rate_limited: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl ProviderStats {
    pub fn record_success(&self, usage: TokenUsage) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.prompt_tokens
            .fetch_add(usage.prompt_tokens as u64, Ordering::Relaxed);
        self.completion_tokens
            .fetch_add(usage.completion_tokens as u64, Ordering::Relaxed);
    }

    pub fn record_failure(&self, err: &FeedError) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.failures.fetch_add(1, Ordering::Relaxed);
        if err.is_rate_limited() {
            self.rate_limited.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self, provider: &str) -> ProviderStatsSnapshot {
        ProviderStatsSnapshot {
            provider: provider.to_string(),
            requests: self.requests.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            prompt_tokens: self.prompt_tokens.load(Ordering::Relaxed),
            completion_tokens: self.completion_tokens.load(Ordering::Relaxed),
        }
    }
}

/// Backoff for provider-reported rate limits: 1s doubling, capped at 10s, one retry.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

/// Run `op`, retrying only on rate-limit errors per `policy`.
pub async fn with_rate_limit_retry<T, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Err(e) if e.is_rate_limited() && attempt < policy.max_retries => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(target: "ai", attempt, delay_ms = delay.as_millis() as u64, "rate limited, backing off");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}

fn elapsed_ms(t0: Instant) -> u64 {
    t0.elapsed().as_millis() as u64
}

#[async_trait]
pub trait AiProvider: Send + Sync {
    fn name(&self) -> &'static str;
    fn model(&self) -> &str;
    /// Credentials present and construction succeeded.
    fn is_ready(&self) -> bool;
    fn stats(&self) -> ProviderStatsSnapshot;
    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
    }

    /// The raw request/response contract.
    async fn complete(&self, req: &AiRequest) -> Result<AiResponse>;

    /// Start-up liveness probe.
    async fn probe(&self) -> bool {
        if !self.is_ready() {
            return false;
        }
        self.complete(&prompts::probe_request()).await.is_ok()
    }

    async fn complete_with_retry(&self, req: &AiRequest) -> Result<AiResponse> {
        with_rate_limit_retry(self.retry_policy(), || self.complete(req)).await
    }

    async fn generate_summary(&self, item: &FeedItem) -> Result<Completion<ContentSummary>> {
        let t0 = Instant::now();
        let resp = self.complete_with_retry(&prompts::summary_request(item)).await?;
        let mut summary = parse::parse_summary(&resp.content);
        summary.processing_time_ms = elapsed_ms(t0);
        Ok(Completion::new(summary, resp.usage))
    }

    async fn generate_tags(&self, item: &FeedItem) -> Result<Completion<Vec<String>>> {
        let resp = self.complete_with_retry(&prompts::tags_request(item)).await?;
        Ok(Completion::new(parse::parse_tags(&resp.content), resp.usage))
    }

    async fn extract_insights(&self, item: &FeedItem) -> Result<Completion<Vec<String>>> {
        let resp = self.complete_with_retry(&prompts::insights_request(item)).await?;
        Ok(Completion::new(parse::parse_insights(&resp.content), resp.usage))
    }

    async fn calculate_semantic_relevance(
        &self,
        item: &FeedItem,
        profile_description: &str,
    ) -> Result<Completion<f32>> {
        let req = prompts::relevance_request(item, profile_description);
        let resp = self.complete_with_retry(&req).await?;
        Ok(Completion::new(parse::parse_relevance(&resp.content), resp.usage))
    }
}
