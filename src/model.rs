// src/model.rs
//! Common item model shared by adapters, the processor, the AI pipeline and the orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FeedError, Result};

/// Which adapter produced an item / which adapter a source needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// RSS 2.0 / Atom feeds.
    #[serde(alias = "rss", alias = "atom")]
    Syndication,
    /// Repository search API (GitHub-compatible).
    #[serde(alias = "github")]
    CodeHost,
    /// Story API (Hacker News-compatible).
    #[serde(alias = "hackernews")]
    SocialNews,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Syndication => "syndication",
            SourceKind::CodeHost => "code-host",
            SourceKind::SocialNews => "social-news",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemQuality {
    #[default]
    Normal,
    /// Too short to judge; kept with a fixed low score.
    Insufficient,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingMetadata {
    pub provider: String,
    pub model: String,
    pub confidence: f32,
    pub processing_time_ms: u64,
    #[serde(default)]
    pub tokens_used: u32,
    pub processed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    pub id: String,
    pub title: String,
    pub content: String,
    pub url: String,
    pub author: String,
    pub published_at: DateTime<Utc>,
    pub source: SourceKind,
    pub source_url: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Adapter extras (stars, language, points, category, ...).
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f32>,
    #[serde(default)]
    pub quality: ItemQuality,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_insights: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_score: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_metadata: Option<ProcessingMetadata>,
}

impl FeedItem {
    /// Minimal constructor used by adapters; optional fields start empty.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
        url: impl Into<String>,
        source: SourceKind,
        source_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            url: url.into(),
            author: "Unknown".to_string(),
            published_at: Utc::now(),
            source,
            source_url: source_url.into(),
            tags: Vec::new(),
            metadata: serde_json::Map::new(),
            relevance_score: None,
            quality: ItemQuality::Normal,
            ai_summary: None,
            ai_tags: None,
            ai_insights: None,
            semantic_score: None,
            processing_metadata: None,
        }
    }

    /// Relevance used for ordering: semantic score when enriched, keyword score otherwise.
    pub fn effective_score(&self) -> f32 {
        self.semantic_score
            .or(self.relevance_score)
            .unwrap_or(0.0)
    }

    pub fn is_enriched(&self) -> bool {
        self.processing_metadata.is_some()
    }

    /// Lower-cased title + content + tags, the text every keyword check runs against.
    pub fn searchable_text(&self) -> String {
        let mut s = String::with_capacity(self.title.len() + self.content.len() + 64);
        s.push_str(&self.title);
        s.push(' ');
        s.push_str(&self.content);
        for t in &self.tags {
            s.push(' ');
            s.push_str(t);
        }
        s.to_lowercase()
    }

    pub fn age_days(&self, now: DateTime<Utc>) -> f64 {
        let secs = now.signed_duration_since(self.published_at).num_seconds();
        secs as f64 / 86_400.0
    }

    /// Write the AI fields. They are written once: an item that already carries a summary
    /// is left untouched and `false` is returned.
    pub fn apply_enrichment(&mut self, enrichment: Enrichment, meta: ProcessingMetadata) -> bool {
        if self.ai_summary.is_some() {
            return false;
        }
        self.ai_summary = enrichment.summary;
        self.ai_tags = enrichment.tags;
        self.ai_insights = enrichment.insights;
        if enrichment.semantic_score.is_some() {
            self.semantic_score = enrichment.semantic_score;
        }
        self.processing_metadata = Some(meta);
        true
    }
}

/// AI output for one item, applied through `FeedItem::apply_enrichment`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Enrichment {
    pub summary: Option<String>,
    pub tags: Option<Vec<String>>,
    pub insights: Option<Vec<String>>,
    /// Blended keyword/semantic score.
    pub semantic_score: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// "daily" | "weekly" | "monthly"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trending_window: Option<String>,
    /// "top" | "search" (social-news only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

fn default_true() -> bool {
    true
}

fn default_weight() -> f32 {
    1.0
}

fn default_fetch_interval() -> u32 {
    60
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceConfig {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: SourceKind,
    pub url: String,
    #[serde(default = "default_fetch_interval")]
    pub fetch_interval: u32,
    #[serde(default = "default_weight")]
    pub weight: f32,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub options: SourceOptions,
}

impl SourceConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.weight) {
            return Err(FeedError::InvalidConfig(format!(
                "source `{}` weight {} outside [0,1]",
                self.id, self.weight
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoostKeywords {
    #[serde(default)]
    pub high: Vec<String>,
    #[serde(default)]
    pub medium: Vec<String>,
    #[serde(default)]
    pub low: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterKeywords {
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub require: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileKeywords {
    #[serde(default)]
    pub boost: BoostKeywords,
    #[serde(default)]
    pub filter: FilterKeywords,
}

fn default_min_relevance() -> f32 {
    0.3
}

fn default_max_age_days() -> u32 {
    7
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingFlags {
    #[serde(default)]
    pub generate_summary: bool,
    #[serde(default = "default_true")]
    pub enhance_tags: bool,
    #[serde(default = "default_true")]
    pub score_relevance: bool,
    #[serde(default = "default_true")]
    pub check_duplicates: bool,
    #[serde(default = "default_min_relevance")]
    pub min_relevance_score: f32,
    #[serde(default = "default_max_age_days")]
    pub max_age_days: u32,
}

impl Default for ProcessingFlags {
    fn default() -> Self {
        Self {
            generate_summary: false,
            enhance_tags: true,
            score_relevance: true,
            check_duplicates: true,
            min_relevance_score: default_min_relevance(),
            max_age_days: default_max_age_days(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusProfile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_weight")]
    pub weight: f32,
    #[serde(default)]
    pub keywords: ProfileKeywords,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub processing: ProcessingFlags,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl FocusProfile {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.weight) {
            return Err(FeedError::InvalidConfig(format!(
                "profile `{}` weight {} outside [0,1]",
                self.id, self.weight
            )));
        }
        let min = self.processing.min_relevance_score;
        if !(0.0..=1.0).contains(&min) {
            return Err(FeedError::InvalidConfig(format!(
                "profile `{}` minRelevanceScore {} outside [0,1]",
                self.id, min
            )));
        }
        Ok(())
    }
}

/// Output of one AI enhancement call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentSummary {
    pub summary: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub insights: Vec<String>,
    pub confidence: f32,
    #[serde(default)]
    pub processing_time_ms: u64,
}

/// Outcome of fetching a single source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchResult {
    pub source_id: String,
    pub source_name: String,
    pub success: bool,
    #[serde(default)]
    pub items: Vec<FeedItem>,
    pub item_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileFetchResult {
    pub profile_id: String,
    pub profile_name: String,
    pub source_results: Vec<FetchResult>,
    pub total_items: usize,
    pub processed_items: usize,
    pub duplicates_removed: usize,
    /// Items whose id was already seen in an earlier run.
    pub previously_seen: usize,
    pub avg_relevance_score: f32,
    pub ai_enhanced: usize,
    #[serde(default)]
    pub items: Vec<FeedItem>,
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationResult {
    pub run_id: String,
    pub profiles: Vec<ProfileFetchResult>,
    pub total_items: usize,
    pub processed_items: usize,
    pub duplicates_removed: usize,
    pub sources_succeeded: usize,
    pub sources_failed: usize,
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}
