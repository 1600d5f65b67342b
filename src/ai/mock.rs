// src/ai/mock.rs
//! Deterministic mock provider: always available, used as the fallback when no real
//! provider passes the start-up probe.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::ops::RangeInclusive;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rand::Rng;

use crate::ai::provider::{
    AiProvider, AiRequest, AiResponse, Completion, ProviderStats, ProviderStatsSnapshot,
    TokenUsage,
};
use crate::analyze::tags::detect_tags;
use crate::error::Result;
use crate::model::{ContentSummary, FeedItem};

const NAME: &str = "mock";
const MODEL: &str = "mock-v1";

/// Stable per-input value in [0, 1).
fn unit_hash(s: &str) -> f32 {
    let mut h = DefaultHasher::new();
    s.hash(&mut h);
    (h.finish() % 10_000) as f32 / 10_000.0
}

/// Rough token estimate: ~4 characters per token.
fn estimate_tokens(s: &str) -> u32 {
    (s.chars().count() as u32).div_ceil(4)
}

fn first_sentences(text: &str, n: usize) -> String {
    let mut out = String::new();
    let mut count = 0;
    for ch in text.chars() {
        out.push(ch);
        if matches!(ch, '.' | '!' | '?') {
            count += 1;
            if count >= n {
                break;
            }
        }
        if out.len() >= 300 {
            out.push_str("...");
            break;
        }
    }
    out.trim().to_string()
}

pub struct MockProvider {
    delay_ms: RangeInclusive<u64>,
    stats: ProviderStats,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    /// Simulated latency of 100–500 ms per call.
    pub fn new() -> Self {
        Self {
            delay_ms: 100..=500,
            stats: ProviderStats::default(),
        }
    }

    pub fn with_delay_range(mut self, delay_ms: RangeInclusive<u64>) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    /// No simulated latency; for tests of the batching logic.
    pub fn instant() -> Self {
        Self::new().with_delay_range(0..=0)
    }

    async fn simulate_latency(&self) {
        let (lo, hi) = (*self.delay_ms.start(), *self.delay_ms.end());
        if hi == 0 {
            return;
        }
        let ms = if lo >= hi {
            lo
        } else {
            rand::rng().random_range(lo..=hi)
        };
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    fn usage_for(&self, input: &str, output: &str) -> TokenUsage {
        let prompt_tokens = estimate_tokens(input);
        let completion_tokens = estimate_tokens(output);
        let usage = TokenUsage {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        };
        self.stats.record_success(usage);
        usage
    }

    /// Confidence in [0.7, 0.95], stable for a given input.
    pub fn confidence_for(text: &str) -> f32 {
        let c = 0.7 + 0.25 * unit_hash(text);
        (c * 100.0).round() / 100.0
    }

    fn summarize(item: &FeedItem) -> ContentSummary {
        let body = if item.content.trim().is_empty() {
            item.title.clone()
        } else {
            first_sentences(&item.content, 2)
        };
        let mut tags = detect_tags(&item.searchable_text());
        tags.truncate(5);
        ContentSummary {
            summary: format!("{}: {}", item.title, body),
            key_points: vec![
                format!("Covers {}", item.title),
                format!("Published by {}", item.author),
            ],
            tags,
            insights: vec![format!(
                "Worth tracking for readers following {}",
                item.tags.first().map(String::as_str).unwrap_or("this topic")
            )],
            confidence: Self::confidence_for(&item.searchable_text()),
            processing_time_ms: 0,
        }
    }
}

#[async_trait]
impl AiProvider for MockProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    fn model(&self) -> &str {
        MODEL
    }

    fn is_ready(&self) -> bool {
        true
    }

    fn stats(&self) -> ProviderStatsSnapshot {
        self.stats.snapshot(NAME)
    }

    async fn probe(&self) -> bool {
        true
    }

    async fn complete(&self, req: &AiRequest) -> Result<AiResponse> {
        self.simulate_latency().await;
        let content = format!(
            "{{\"summary\": {}, \"keyPoints\": [], \"tags\": [], \"insights\": [], \"confidence\": {}}}",
            serde_json::to_string(&first_sentences(&req.content, 2))?,
            Self::confidence_for(&req.content)
        );
        let usage = self.usage_for(&format!("{}{}", req.prompt, req.content), &content);
        Ok(AiResponse {
            content,
            usage,
            model: MODEL.to_string(),
            provider: NAME.to_string(),
        })
    }

    async fn generate_summary(&self, item: &FeedItem) -> Result<Completion<ContentSummary>> {
        let t0 = Instant::now();
        self.simulate_latency().await;
        let mut summary = Self::summarize(item);
        summary.processing_time_ms = t0.elapsed().as_millis() as u64;
        let usage = self.usage_for(&item.content, &summary.summary);
        Ok(Completion::new(summary, usage))
    }

    async fn generate_tags(&self, item: &FeedItem) -> Result<Completion<Vec<String>>> {
        self.simulate_latency().await;
        let mut tags = detect_tags(&item.searchable_text());
        for t in &item.tags {
            let t = t.to_lowercase();
            if t.chars().count() > 1 && !tags.contains(&t) {
                tags.push(t);
            }
        }
        tags.truncate(8);
        let usage = self.usage_for(&item.content, &tags.join(","));
        Ok(Completion::new(tags, usage))
    }

    async fn extract_insights(&self, item: &FeedItem) -> Result<Completion<Vec<String>>> {
        self.simulate_latency().await;
        let insights = Self::summarize(item).insights;
        let usage = self.usage_for(&item.content, &insights.join("\n"));
        Ok(Completion::new(insights, usage))
    }

    /// Share of the description's significant words that appear in the item.
    async fn calculate_semantic_relevance(
        &self,
        item: &FeedItem,
        profile_description: &str,
    ) -> Result<Completion<f32>> {
        self.simulate_latency().await;
        let text = item.searchable_text();
        let words: Vec<String> = profile_description
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.chars().count() > 3)
            .map(str::to_lowercase)
            .collect();
        let score = if words.is_empty() {
            0.5
        } else {
            let hits = words.iter().filter(|w| text.contains(w.as_str())).count();
            let frac = hits as f32 / words.len() as f32;
            ((0.2 + 0.8 * frac) * 1000.0).round() / 1000.0
        };
        let usage = self.usage_for(&text, "0.0");
        Ok(Completion::new(score.clamp(0.0, 1.0), usage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SourceKind;

    fn item() -> FeedItem {
        FeedItem::new(
            "1",
            "Rust 1.90 released",
            "The Rust team shipped a new release. It improves async traits. More to come.",
            "https://blog.rust-lang.org/1.90",
            SourceKind::Syndication,
            "s",
        )
    }

    #[tokio::test]
    async fn summary_is_well_formed_and_bounded_in_time() {
        let p = MockProvider::new();
        let t0 = Instant::now();
        let s = p.generate_summary(&item()).await.unwrap().value;
        let elapsed = t0.elapsed();
        assert!(!s.summary.is_empty());
        assert!((0.7..=0.95).contains(&s.confidence), "confidence {}", s.confidence);
        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn confidence_is_deterministic() {
        let p = MockProvider::instant();
        let a = p.generate_summary(&item()).await.unwrap().value.confidence;
        let b = p.generate_summary(&item()).await.unwrap().value.confidence;
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn semantic_relevance_tracks_description_overlap() {
        let p = MockProvider::instant();
        let on = p
            .calculate_semantic_relevance(&item(), "Rust release notes")
            .await
            .unwrap()
            .value;
        let off = p
            .calculate_semantic_relevance(&item(), "gardening tomatoes")
            .await
            .unwrap()
            .value;
        assert!(on > off);
        assert!((0.0..=1.0).contains(&on));
    }

    #[tokio::test]
    async fn raw_completion_parses_through_structured_parser() {
        let p = MockProvider::instant();
        let resp = p.complete(&crate::ai::prompts::summary_request(&item())).await.unwrap();
        let s = crate::ai::parse::parse_summary(&resp.content);
        assert!(s.confidence >= 0.7);
        assert_eq!(p.stats().requests, 1);
    }
}
