// src/history.rs
//! In-memory run history and the cross-run "already seen" ledger.

use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::model::{AggregationResult, FeedItem};

const MAX_CAPACITY: usize = 100_000;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Compact record of one aggregation run (items are not retained).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub profiles: usize,
    pub total_items: usize,
    pub processed_items: usize,
    pub duplicates_removed: usize,
    pub sources_succeeded: usize,
    pub sources_failed: usize,
    pub errors: usize,
}

impl From<&AggregationResult> for RunSummary {
    fn from(r: &AggregationResult) -> Self {
        Self {
            run_id: r.run_id.clone(),
            started_at: r.started_at,
            duration_ms: r.duration_ms,
            profiles: r.profiles.len(),
            total_items: r.total_items,
            processed_items: r.processed_items,
            duplicates_removed: r.duplicates_removed,
            sources_succeeded: r.sources_succeeded,
            sources_failed: r.sources_failed,
            errors: r.errors.len(),
        }
    }
}

/// Bounded list of recent runs, newest last.
#[derive(Debug)]
pub struct RunHistory {
    inner: Mutex<VecDeque<RunSummary>>,
    cap: usize,
}

impl Default for RunHistory {
    fn default() -> Self {
        Self::with_capacity(50)
    }
}

impl RunHistory {
    pub fn with_capacity(cap: usize) -> Self {
        let cap = cap.clamp(1, MAX_CAPACITY);
        Self {
            inner: Mutex::new(VecDeque::with_capacity(cap)),
            cap,
        }
    }

    pub fn push(&self, result: &AggregationResult) {
        let mut v = lock(&self.inner);
        v.push_back(RunSummary::from(result));
        while v.len() > self.cap {
            v.pop_front();
        }
    }

    pub fn last(&self) -> Option<RunSummary> {
        lock(&self.inner).back().cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot_last_n(&self, n: usize) -> Vec<RunSummary> {
        let v = lock(&self.inner);
        let start = v.len().saturating_sub(n);
        v.iter().skip(start).cloned().collect()
    }
}

type IdHash = [u8; 32];

fn hash_id(profile_id: &str, id: &str) -> IdHash {
    let mut h = Sha256::new();
    h.update(profile_id.as_bytes());
    h.update([0u8]);
    h.update(id.as_bytes());
    let digest = h.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

#[derive(Debug, Default)]
struct LedgerState {
    order: VecDeque<IdHash>,
    set: HashSet<IdHash>,
}

/// Rolling set of `(profile, item id)` hashes seen by earlier runs. Oldest entries are evicted first.
///
/// Entries are scoped per profile so that profiles running side by side in one
/// aggregation never see each other's items as "already seen".
#[derive(Debug)]
pub struct SeenLedger {
    state: Mutex<LedgerState>,
    cap: usize,
}

impl Default for SeenLedger {
    fn default() -> Self {
        Self::with_capacity(5_000)
    }
}

impl SeenLedger {
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            state: Mutex::new(LedgerState::default()),
            cap: cap.clamp(1, MAX_CAPACITY),
        }
    }

    /// How many of `items` were recorded for `profile_id` by an earlier call to `record`.
    pub fn count_seen(&self, profile_id: &str, items: &[FeedItem]) -> usize {
        let st = lock(&self.state);
        items
            .iter()
            .filter(|it| st.set.contains(&hash_id(profile_id, &it.id)))
            .count()
    }

    pub fn record(&self, profile_id: &str, items: &[FeedItem]) {
        let mut st = lock(&self.state);
        for it in items {
            let h = hash_id(profile_id, &it.id);
            if st.set.insert(h) {
                st.order.push_back(h);
            }
        }
        while st.order.len() > self.cap {
            if let Some(old) = st.order.pop_front() {
                st.set.remove(&old);
            }
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.state).order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SourceKind;

    fn item(id: &str) -> FeedItem {
        FeedItem::new(id, "t", "c", "u", SourceKind::Syndication, "s")
    }

    fn run(id: &str) -> AggregationResult {
        AggregationResult {
            run_id: id.to_string(),
            profiles: Vec::new(),
            total_items: 3,
            processed_items: 2,
            duplicates_removed: 1,
            sources_succeeded: 1,
            sources_failed: 0,
            errors: Vec::new(),
            started_at: Utc::now(),
            duration_ms: 5,
        }
    }

    #[test]
    fn history_is_bounded_and_keeps_newest() {
        let h = RunHistory::with_capacity(2);
        h.push(&run("a"));
        h.push(&run("b"));
        h.push(&run("c"));
        assert_eq!(h.len(), 2);
        let ids: Vec<_> = h.snapshot_last_n(10).into_iter().map(|r| r.run_id).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert_eq!(h.last().unwrap().run_id, "c");
    }

    #[test]
    fn ledger_counts_items_from_earlier_runs() {
        let l = SeenLedger::with_capacity(10);
        let first = vec![item("a"), item("b")];
        assert_eq!(l.count_seen("p", &first), 0);
        l.record("p", &first);
        assert_eq!(l.count_seen("p", &[item("a"), item("c")]), 1);
        l.record("p", &first);
        assert_eq!(l.len(), 2);
    }

    #[test]
    fn ledger_is_scoped_per_profile() {
        let l = SeenLedger::with_capacity(10);
        l.record("p1", &[item("a")]);
        assert_eq!(l.count_seen("p2", &[item("a")]), 0);
        assert_eq!(l.count_seen("p1", &[item("a")]), 1);
    }

    #[test]
    fn ledger_evicts_oldest() {
        let l = SeenLedger::with_capacity(2);
        l.record("p", &[item("a"), item("b"), item("c")]);
        assert_eq!(l.len(), 2);
        assert_eq!(l.count_seen("p", &[item("a")]), 0);
        assert_eq!(l.count_seen("p", &[item("c")]), 1);
    }
}
