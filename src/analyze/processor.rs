// src/analyze/processor.rs
//! Per-profile filtering: age cut-off, short-content flagging, scoring, tags, threshold.

use chrono::{DateTime, Utc};
use metrics::counter;

use crate::analyze::dedup::Deduplicator;
use crate::analyze::scoring::{calculate_relevance_score, filter_violation};
use crate::analyze::tags::enhance_tags;
use crate::model::{FeedItem, FocusProfile, ItemQuality};

/// Content shorter than this (together with a short title) is "insufficient".
pub const MIN_CONTENT_CHARS: usize = 100;
pub const MIN_TITLE_CHARS: usize = 20;
/// Fixed score for insufficient items.
pub const INSUFFICIENT_SCORE: f32 = 0.1;

#[derive(Debug, Clone, Default)]
pub struct ContentProcessor {
    dedup: Deduplicator,
}

impl ContentProcessor {
    pub fn new(similarity_threshold: f32) -> Self {
        Self {
            dedup: Deduplicator::new(similarity_threshold),
        }
    }

    pub fn deduplicate(&self, items: Vec<FeedItem>) -> (Vec<FeedItem>, usize) {
        let (kept, removed) = self.dedup.deduplicate(items);
        counter!("dedup_removed_total").increment(removed as u64);
        (kept, removed)
    }

    /// Process one item for `profile` at time `now`; `None` means dropped.
    pub fn process_item_at(
        &self,
        mut item: FeedItem,
        profile: &FocusProfile,
        now: DateTime<Utc>,
    ) -> Option<FeedItem> {
        let flags = &profile.processing;

        if item.age_days(now) > flags.max_age_days as f64 {
            tracing::trace!(target: "analyze", id = %item.id, "dropped: too old");
            return None;
        }

        // Short items that break an exclude/require rule are scored like any other item.
        if item.content.chars().count() < MIN_CONTENT_CHARS
            && item.title.chars().count() < MIN_TITLE_CHARS
            && filter_violation(&item.searchable_text(), &profile.keywords).is_none()
        {
            item.quality = ItemQuality::Insufficient;
            item.relevance_score = Some(INSUFFICIENT_SCORE);
            return Some(item);
        }

        // Score before tag enhancement so detected tags don't count as keyword hits.
        if flags.score_relevance {
            let score = calculate_relevance_score(&item, &profile.keywords);
            if score < flags.min_relevance_score {
                tracing::trace!(target: "analyze", id = %item.id, score, "dropped: below threshold");
                return None;
            }
            item.relevance_score = Some(score);
        }

        if flags.enhance_tags {
            item.tags = enhance_tags(&item);
        }

        Some(item)
    }

    pub fn process_item(&self, item: FeedItem, profile: &FocusProfile) -> Option<FeedItem> {
        self.process_item_at(item, profile, Utc::now())
    }

    /// Process every item, drop rejected ones, sort by score descending (stable).
    pub fn process_batch(&self, items: Vec<FeedItem>, profile: &FocusProfile) -> Vec<FeedItem> {
        let now = Utc::now();
        let mut out: Vec<FeedItem> = items
            .into_iter()
            .filter_map(|it| self.process_item_at(it, profile, now))
            .collect();
        sort_by_score(&mut out);
        out
    }
}

/// Stable sort by effective score, highest first.
pub fn sort_by_score(items: &mut [FeedItem]) {
    items.sort_by(|a, b| b.effective_score().total_cmp(&a.effective_score()));
}
