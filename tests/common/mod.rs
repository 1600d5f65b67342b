// tests/common/mod.rs
//
// Shared fixtures: in-process adapters, a catalog builder and item constructors.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use focus_feeds::config::StaticCatalog;
use focus_feeds::error::{FeedError, Result};
use focus_feeds::ingest::types::SourceAdapter;
use focus_feeds::ingest::AdapterRegistry;
use focus_feeds::model::{
    BoostKeywords, FeedItem, FocusProfile, ProcessingFlags, ProfileKeywords, SourceConfig,
    SourceKind, SourceOptions,
};

/// Content is derived from the title so unrelated items never collide in dedup.
pub fn item(id: &str, title: &str) -> FeedItem {
    FeedItem::new(
        id,
        title,
        format!("Notes on {title}, entry {id}."),
        format!("https://example.com/{id}"),
        SourceKind::Syndication,
        "https://example.com/feed",
    )
}

/// Serves items keyed by source id; sources listed in `failing` return HTTP 503.
pub struct StaticAdapter {
    kind: SourceKind,
    items: Vec<(String, Vec<FeedItem>)>,
    failing: Vec<String>,
    pub calls: AtomicUsize,
}

impl StaticAdapter {
    pub fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            items: Vec::new(),
            failing: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn serve(mut self, source_id: &str, items: Vec<FeedItem>) -> Self {
        self.items.push((source_id.to_string(), items));
        self
    }

    pub fn fail(mut self, source_id: &str) -> Self {
        self.failing.push(source_id.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceAdapter for StaticAdapter {
    async fn fetch(&self, source: &SourceConfig) -> Result<Vec<FeedItem>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&source.id) {
            return Err(FeedError::Status {
                status: 503,
                url: source.url.clone(),
            });
        }
        Ok(self
            .items
            .iter()
            .find(|(id, _)| id == &source.id)
            .map(|(_, v)| v.clone())
            .unwrap_or_default())
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

pub fn registry(adapter: Arc<StaticAdapter>) -> AdapterRegistry {
    let mut reg = AdapterRegistry::new();
    reg.register(adapter);
    reg
}

pub fn source(id: &str) -> SourceConfig {
    SourceConfig {
        id: id.into(),
        name: format!("Source {id}"),
        kind: SourceKind::Syndication,
        url: format!("https://example.com/{id}.xml"),
        fetch_interval: 60,
        weight: 1.0,
        enabled: true,
        options: SourceOptions::default(),
    }
}

pub fn profile(id: &str, sources: &[&str], high: &[&str]) -> FocusProfile {
    FocusProfile {
        id: id.into(),
        name: format!("Profile {id}"),
        description: String::new(),
        weight: 1.0,
        keywords: ProfileKeywords {
            boost: BoostKeywords {
                high: high.iter().map(|s| s.to_string()).collect(),
                ..BoostKeywords::default()
            },
            ..ProfileKeywords::default()
        },
        sources: sources.iter().map(|s| s.to_string()).collect(),
        processing: ProcessingFlags {
            min_relevance_score: 0.1,
            ..ProcessingFlags::default()
        },
        enabled: true,
    }
}

pub fn catalog(sources: Vec<SourceConfig>, profiles: Vec<FocusProfile>) -> Arc<StaticCatalog> {
    Arc::new(StaticCatalog::new(sources, profiles))
}
