// src/analyze/dedup.rs
//! Similarity-based deduplication within one batch.
//!
//! Pairwise O(n²) comparison; fine for tens to low hundreds of items. Larger feeds would
//! need a shingling/minhash pre-pass to limit candidate pairs.

use std::collections::HashSet;

use crate::model::FeedItem;

pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.8;

/// Whitespace tokens, lower-cased, with leading/trailing punctuation trimmed.
fn token_set(s: &str) -> HashSet<String> {
    s.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

/// Jaccard similarity (|A ∩ B| / |A ∪ B|) of word tokens. Two empty texts score 0.
pub fn jaccard_similarity(a: &str, b: &str) -> f32 {
    let sa = token_set(a);
    let sb = token_set(b);
    let union = sa.union(&sb).count();
    if union == 0 {
        return 0.0;
    }
    let inter = sa.intersection(&sb).count();
    inter as f32 / union as f32
}

/// Same URL, or title/content similarity strictly above `threshold`.
pub fn is_duplicate(a: &FeedItem, b: &FeedItem, threshold: f32) -> bool {
    if !a.url.is_empty() && a.url == b.url {
        return true;
    }
    jaccard_similarity(&a.title, &b.title) > threshold
        || jaccard_similarity(&a.content, &b.content) > threshold
}

#[derive(Debug, Clone, Copy)]
pub struct Deduplicator {
    threshold: f32,
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(DEFAULT_SIMILARITY_THRESHOLD)
    }
}

impl Deduplicator {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Keep the first-seen item of each duplicate cluster. Returns (kept, removed_count).
    pub fn deduplicate(&self, items: Vec<FeedItem>) -> (Vec<FeedItem>, usize) {
        let mut kept: Vec<FeedItem> = Vec::with_capacity(items.len());
        let mut removed = 0usize;
        for it in items {
            if kept.iter().any(|k| is_duplicate(k, &it, self.threshold)) {
                tracing::trace!(target: "analyze", id = %it.id, "duplicate dropped");
                removed += 1;
                continue;
            }
            kept.push(it);
        }
        (kept, removed)
    }
}
