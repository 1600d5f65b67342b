// src/analyze/mod.rs
//! Content processing: keyword relevance, tag enhancement, deduplication, per-profile filtering.

pub mod dedup;
pub mod processor;
pub mod scoring;
pub mod tags;

pub use crate::analyze::dedup::{jaccard_similarity, Deduplicator, DEFAULT_SIMILARITY_THRESHOLD};
pub use crate::analyze::processor::{sort_by_score, ContentProcessor};
pub use crate::analyze::scoring::{calculate_relevance_score, explain_relevance, Relevance};
pub use crate::analyze::tags::enhance_tags;
