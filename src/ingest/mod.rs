// src/ingest/mod.rs
pub mod providers;
pub mod types;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;

use crate::error::{FeedError, Result};
use crate::ingest::providers::{
    code_host::CodeHostAdapter, social_news::SocialNewsAdapter, syndication::SyndicationAdapter,
};
use crate::ingest::types::SourceAdapter;
use crate::model::{FetchResult, SourceConfig, SourceKind};

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);
pub const USER_AGENT: &str = "focus-feeds/0.1 (+https://github.com/focus-feeds/focus-feeds)";

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_items_total", "Items produced by source adapters.");
        describe_counter!(
            "ingest_skipped_total",
            "Malformed records skipped by adapters."
        );
        describe_counter!(
            "ingest_source_errors_total",
            "Source fetches that ended in a failed FetchResult."
        );
        describe_histogram!("ingest_fetch_ms", "Source fetch time in milliseconds.");
    });
}

/// Shared HTTP client for adapters; `timeout` is the configured per-request limit.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(4).min(timeout))
        .timeout(timeout)
        .build()
        .map_err(FeedError::from)
}

/// GET `url` and return the body, mapping non-2xx to `FeedError::Status`.
pub(crate) async fn get_text(req: reqwest::RequestBuilder, url: &str) -> Result<String> {
    let resp = req.send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(FeedError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }
    Ok(resp.text().await?)
}

/// Normalize text: strip markup, decode entities, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) Strip HTML tags (before decoding, so encoded `&lt;b&gt;` survives as text)
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)<[^>]+>").expect("tag regex"));
    let stripped = re_tags.replace_all(s, " ");

    // 2) HTML entity decode
    let mut out = html_escape::decode_html_entities(&stripped).to_string();

    // 3) Normalize “ ” ‘ ’ to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace('\u{00A0}', " ");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").expect("ws regex"));
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // 5) Length cap
    if out.chars().count() > 5000 {
        out = out.chars().take(5000).collect();
    }

    out
}

/// Maps each `SourceKind` to its adapter.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<SourceKind, Arc<dyn SourceAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the three built-in adapters sharing one HTTP client.
    pub fn with_defaults(timeout: Duration) -> Result<Self> {
        let client = http_client(timeout)?;
        let mut reg = Self::new();
        reg.register(Arc::new(SyndicationAdapter::new(client.clone())));
        reg.register(Arc::new(CodeHostAdapter::new(client.clone())));
        reg.register(Arc::new(SocialNewsAdapter::new(client)));
        Ok(reg)
    }

    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) {
        self.adapters.insert(adapter.kind(), adapter);
    }

    pub fn get(&self, kind: SourceKind) -> Result<Arc<dyn SourceAdapter>> {
        self.adapters
            .get(&kind)
            .cloned()
            .ok_or(FeedError::UnknownSourceKind(kind))
    }

    pub fn kinds(&self) -> Vec<SourceKind> {
        self.adapters.keys().copied().collect()
    }
}

/// Fetch one source through `adapter`, never failing: transport errors and
/// timeouts become a `FetchResult` with `success: false`.
pub async fn fetch_from_source(
    adapter: &dyn SourceAdapter,
    source: &SourceConfig,
    timeout: Duration,
) -> FetchResult {
    ensure_metrics_described();
    let t0 = Instant::now();
    let fetched_at = Utc::now();

    let outcome = match tokio::time::timeout(timeout, adapter.fetch(source)).await {
        Ok(res) => res,
        Err(_) => Err(FeedError::Timeout(timeout)),
    };
    let duration_ms = t0.elapsed().as_millis() as u64;
    histogram!("ingest_fetch_ms").record(duration_ms as f64);

    match outcome {
        Ok(items) => {
            counter!("ingest_items_total").increment(items.len() as u64);
            tracing::debug!(
                target: "ingest",
                source = %source.id,
                adapter = adapter.name(),
                items = items.len(),
                duration_ms,
                "source fetched"
            );
            FetchResult {
                source_id: source.id.clone(),
                source_name: source.name.clone(),
                success: true,
                item_count: items.len(),
                items,
                error: None,
                duration_ms,
                fetched_at,
            }
        }
        Err(e) => {
            counter!("ingest_source_errors_total").increment(1);
            tracing::warn!(
                target: "ingest",
                source = %source.id,
                adapter = adapter.name(),
                error = %e,
                "source fetch failed"
            );
            FetchResult {
                source_id: source.id.clone(),
                source_name: source.name.clone(),
                success: false,
                items: Vec::new(),
                item_count: 0,
                error: Some(format!("{}: {}", source.name, e)),
                duration_ms,
                fetched_at,
            }
        }
    }
}

/// Count a skipped record. Adapters call this instead of failing the whole payload.
pub(crate) fn record_skipped(adapter: &'static str, reason: &str) {
    counter!("ingest_skipped_total").increment(1);
    tracing::warn!(target: "ingest", adapter, reason, "skipping malformed record");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_strips_markup_and_collapses_ws() {
        let s = "  <p>Hello,&nbsp;&nbsp; <b>world</b></p>\n\n ";
        assert_eq!(normalize_text(s), "Hello, world");
    }

    #[test]
    fn normalize_text_keeps_encoded_angle_brackets_as_text() {
        assert_eq!(normalize_text("a &lt;tag&gt; b"), "a <tag> b");
    }

    #[test]
    fn registry_reports_unknown_kind() {
        let reg = AdapterRegistry::new();
        let err = reg.get(SourceKind::CodeHost).err().expect("missing adapter");
        assert!(matches!(err, FeedError::UnknownSourceKind(SourceKind::CodeHost)));
    }
}
