// src/store.rs
//! Persistence collaborator. The aggregator only needs bulk item upserts, an append-only
//! engagement log and run bookkeeping; `MemoryStore` implements all of it in-process.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{FeedError, Result};
use crate::model::{Enrichment, FeedItem};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertReport {
    pub inserted: usize,
    /// Items whose id already existed. The stored copy is kept; only missing AI fields are filled in.
    pub conflicts: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngagementAction {
    View,
    Click,
    Save,
    Dismiss,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementEvent {
    pub item_id: String,
    pub profile_id: Option<String>,
    pub action: EngagementAction,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub run_id: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub items_processed: usize,
    pub error: Option<String>,
}

#[async_trait]
pub trait FeedStore: Send + Sync {
    /// Bulk insert keyed by item id. Persisted items are immutable apart from write-once
    /// AI fields; duplicate keys are not an error.
    async fn upsert_items(&self, profile_id: &str, items: &[FeedItem]) -> Result<UpsertReport>;
    async fn log_engagement(&self, event: EngagementEvent) -> Result<()>;
    async fn start_run(&self, run_id: &str, started_at: DateTime<Utc>) -> Result<()>;
    async fn update_run(
        &self,
        run_id: &str,
        status: RunStatus,
        items_processed: usize,
        error: Option<String>,
    ) -> Result<()>;
}

#[derive(Debug, Default)]
struct MemoryState {
    /// (profile id, item id) -> item
    items: HashMap<(String, String), FeedItem>,
    engagement: Vec<EngagementEvent>,
    runs: HashMap<String, RunRecord>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn item_count(&self) -> usize {
        self.state.read().await.items.len()
    }

    pub async fn items_for(&self, profile_id: &str) -> Vec<FeedItem> {
        self.state
            .read()
            .await
            .items
            .iter()
            .filter(|((p, _), _)| p == profile_id)
            .map(|(_, it)| it.clone())
            .collect()
    }

    pub async fn run(&self, run_id: &str) -> Option<RunRecord> {
        self.state.read().await.runs.get(run_id).cloned()
    }

    pub async fn engagement(&self) -> Vec<EngagementEvent> {
        self.state.read().await.engagement.clone()
    }
}

#[async_trait]
impl FeedStore for MemoryStore {
    async fn upsert_items(&self, profile_id: &str, items: &[FeedItem]) -> Result<UpsertReport> {
        let mut st = self.state.write().await;
        let mut report = UpsertReport::default();
        for it in items {
            let key = (profile_id.to_string(), it.id.clone());
            match st.items.get_mut(&key) {
                Some(stored) => {
                    report.conflicts += 1;
                    fill_enrichment(stored, it);
                }
                None => {
                    st.items.insert(key, it.clone());
                    report.inserted += 1;
                }
            }
        }
        if report.conflicts > 0 {
            tracing::debug!(target: "store", profile = profile_id, conflicts = report.conflicts, "upsert kept existing items");
        }
        Ok(report)
    }

    async fn log_engagement(&self, event: EngagementEvent) -> Result<()> {
        self.state.write().await.engagement.push(event);
        Ok(())
    }

    async fn start_run(&self, run_id: &str, started_at: DateTime<Utc>) -> Result<()> {
        let mut st = self.state.write().await;
        if st.runs.contains_key(run_id) {
            return Err(FeedError::Store(format!("run {run_id} already started")));
        }
        st.runs.insert(
            run_id.to_string(),
            RunRecord {
                run_id: run_id.to_string(),
                status: RunStatus::Running,
                started_at,
                finished_at: None,
                items_processed: 0,
                error: None,
            },
        );
        Ok(())
    }

    async fn update_run(
        &self,
        run_id: &str,
        status: RunStatus,
        items_processed: usize,
        error: Option<String>,
    ) -> Result<()> {
        let mut st = self.state.write().await;
        let rec = st
            .runs
            .get_mut(run_id)
            .ok_or_else(|| FeedError::Store(format!("unknown run {run_id}")))?;
        rec.status = status;
        rec.items_processed = items_processed;
        rec.error = error;
        if status != RunStatus::Running {
            rec.finished_at = Some(Utc::now());
        }
        Ok(())
    }
}

fn fill_enrichment(stored: &mut FeedItem, incoming: &FeedItem) {
    if incoming.ai_summary.is_none() {
        return;
    }
    let Some(meta) = incoming.processing_metadata.clone() else {
        return;
    };
    stored.apply_enrichment(
        Enrichment {
            summary: incoming.ai_summary.clone(),
            tags: incoming.ai_tags.clone(),
            insights: incoming.ai_insights.clone(),
            semantic_score: incoming.semantic_score,
        },
        meta,
    );
}
