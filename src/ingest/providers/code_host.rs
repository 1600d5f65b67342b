// src/ingest/providers/code_host.rs
//! Repository search adapter (GitHub `/search/repositories` compatible).

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;

use crate::error::{FeedError, Result};
use crate::ingest::types::SourceAdapter;
use crate::ingest::{get_text, normalize_text, record_skipped};
use crate::model::{FeedItem, SourceConfig, SourceKind, SourceOptions};

const NAME: &str = "code-host";
const DEFAULT_PER_PAGE: usize = 30;
const MAX_PER_PAGE: usize = 100;
const ENV_TOKEN: &str = "GITHUB_TOKEN";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Repo {
    full_name: String,
    html_url: String,
    description: Option<String>,
    #[serde(default)]
    stargazers_count: u64,
    #[serde(default)]
    forks_count: u64,
    language: Option<String>,
    #[serde(default)]
    topics: Vec<String>,
    owner: Option<Owner>,
    created_at: Option<DateTime<Utc>>,
    pushed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct Owner {
    login: String,
}

/// Recency window in days for the "trending" qualifier.
pub fn trending_days(window: &str) -> Option<i64> {
    match window.to_ascii_lowercase().as_str() {
        "daily" | "day" => Some(1),
        "weekly" | "week" => Some(7),
        "monthly" | "month" => Some(30),
        _ => None,
    }
}

/// Build the `q=` search string: free text, optional `language:`, optional `created:>` window.
pub fn build_search_query(opts: &SourceOptions, now: DateTime<Utc>) -> String {
    let mut parts: Vec<String> = Vec::new();
    if let Some(q) = opts.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        parts.push(q.to_string());
    }
    if let Some(lang) = opts.language.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
        parts.push(format!("language:{}", lang.to_ascii_lowercase()));
    }
    if let Some(days) = opts.trending_window.as_deref().and_then(trending_days) {
        let since = (now - ChronoDuration::days(days)).format("%Y-%m-%d");
        parts.push(format!("created:>{since}"));
    }
    if parts.is_empty() {
        parts.push("stars:>1".to_string());
    }
    parts.join(" ")
}

/// `"ENV"` means: read the token from `$GITHUB_TOKEN`.
fn resolve_token(opts: &SourceOptions) -> Option<String> {
    let raw = opts.auth_token.as_deref()?.trim();
    if raw.eq_ignore_ascii_case("env") {
        std::env::var(ENV_TOKEN).ok().filter(|t| !t.is_empty())
    } else if raw.is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}

fn map_repo(repo: Repo, source_url: &str) -> FeedItem {
    let description = repo
        .description
        .as_deref()
        .map(normalize_text)
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| "No description provided".to_string());
    let language = repo.language.unwrap_or_else(|| "Unknown".to_string());

    let mut item = FeedItem::new(
        repo.html_url.clone(),
        repo.full_name.clone(),
        description,
        repo.html_url,
        SourceKind::CodeHost,
        source_url,
    );
    item.author = repo
        .owner
        .map(|o| o.login)
        .unwrap_or_else(|| "Unknown".to_string());
    item.published_at = repo.created_at.or(repo.pushed_at).unwrap_or_else(Utc::now);

    let mut tags: Vec<String> = vec!["repository".to_string()];
    if language != "Unknown" {
        tags.push(language.to_lowercase());
    }
    for t in repo.topics {
        let t = t.to_lowercase();
        if !tags.contains(&t) {
            tags.push(t);
        }
    }
    item.tags = tags;

    item.metadata.insert("stars".into(), repo.stargazers_count.into());
    item.metadata.insert("forks".into(), repo.forks_count.into());
    item.metadata.insert("language".into(), language.into());
    item
}

/// Map a search response body into items; records missing required fields are skipped.
pub fn parse_search_response(body: &str, source_url: &str) -> Result<Vec<FeedItem>> {
    let resp: SearchResponse =
        serde_json::from_str(body).map_err(|e| FeedError::Parse(format!("search response: {e}")))?;
    let mut out = Vec::with_capacity(resp.items.len());
    for raw in resp.items {
        match serde_json::from_value::<Repo>(raw) {
            Ok(repo) => out.push(map_repo(repo, source_url)),
            Err(e) => record_skipped(NAME, &e.to_string()),
        }
    }
    Ok(out)
}

pub struct CodeHostAdapter {
    client: reqwest::Client,
}

impl CodeHostAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SourceAdapter for CodeHostAdapter {
    async fn fetch(&self, source: &SourceConfig) -> Result<Vec<FeedItem>> {
        let base = source.url.trim_end_matches('/');
        let url = format!("{base}/search/repositories");
        let per_page = source
            .options
            .limit
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE);
        let q = build_search_query(&source.options, Utc::now());

        let mut req = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github+json")
            .query(&[
                ("q", q.as_str()),
                ("sort", "stars"),
                ("order", "desc"),
                ("per_page", per_page.to_string().as_str()),
            ]);
        if let Some(token) = resolve_token(&source.options) {
            req = req.bearer_auth(token);
        }

        tracing::debug!(target: "ingest", source = %source.id, query = %q, "code-host search");
        let body = get_text(req, &url).await?;
        parse_search_response(&body, &source.url)
    }

    fn kind(&self) -> SourceKind {
        SourceKind::CodeHost
    }

    fn name(&self) -> &'static str {
        NAME
    }
}
