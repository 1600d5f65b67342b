// src/ingest/providers/social_news.rs
//! Story adapter (Hacker News API compatible): "top N" listing or full-text search.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use futures::stream::{self, StreamExt};
use serde::Deserialize;

use crate::error::{FeedError, Result};
use crate::ingest::types::SourceAdapter;
use crate::ingest::{get_text, normalize_text, record_skipped};
use crate::model::{FeedItem, SourceConfig, SourceKind};

const NAME: &str = "social-news";
const DEFAULT_LIMIT: usize = 30;
const MAX_LIMIT: usize = 100;
const DETAIL_CONCURRENCY: usize = 8;
const PERMALINK_BASE: &str = "https://news.ycombinator.com/item?id=";

/// Fixed topic vocabulary; matched as lower-case substrings of title + body.
const TECH_TOPICS: &[&str] = &[
    "ai",
    "machine learning",
    "llm",
    "rust",
    "python",
    "javascript",
    "typescript",
    "golang",
    "kubernetes",
    "docker",
    "database",
    "postgres",
    "security",
    "crypto",
    "blockchain",
    "startup",
    "open source",
    "cloud",
    "aws",
    "linux",
    "webassembly",
    "react",
    "api",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostCategory {
    Ask,
    Show,
    Launch,
    Story,
}

impl PostCategory {
    pub fn from_title(title: &str) -> Self {
        let t = title.trim_start();
        if t.starts_with("Ask HN:") {
            PostCategory::Ask
        } else if t.starts_with("Show HN:") {
            PostCategory::Show
        } else if t.starts_with("Launch HN:") {
            PostCategory::Launch
        } else {
            PostCategory::Story
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PostCategory::Ask => "ask",
            PostCategory::Show => "show",
            PostCategory::Launch => "launch",
            PostCategory::Story => "story",
        }
    }
}

/// Topics from `TECH_TOPICS` found in `text`, in vocabulary order.
pub fn extract_topics(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    TECH_TOPICS
        .iter()
        .filter(|t| {
            // short tokens need word boundaries ("ai" must not match "said")
            if t.len() <= 3 {
                lower
                    .split(|c: char| !c.is_alphanumeric())
                    .any(|w| w == **t)
            } else {
                lower.contains(**t)
            }
        })
        .map(|t| t.to_string())
        .collect()
}

#[derive(Debug, Deserialize)]
struct StoryDetail {
    id: u64,
    #[serde(rename = "type")]
    kind: Option<String>,
    by: Option<String>,
    time: Option<i64>,
    title: Option<String>,
    url: Option<String>,
    text: Option<String>,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    descendants: i64,
    #[serde(default)]
    deleted: bool,
    #[serde(default)]
    dead: bool,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    hits: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(rename = "objectID")]
    object_id: String,
    title: Option<String>,
    url: Option<String>,
    author: Option<String>,
    created_at_i: Option<i64>,
    #[serde(default)]
    points: Option<i64>,
    #[serde(default)]
    num_comments: Option<i64>,
    story_text: Option<String>,
}

struct RawStory {
    id: String,
    title: String,
    url: Option<String>,
    body: Option<String>,
    author: Option<String>,
    time: Option<i64>,
    points: i64,
    comments: i64,
}

fn build_item(raw: RawStory, source_url: &str) -> FeedItem {
    let permalink = format!("{PERMALINK_BASE}{}", raw.id);
    let url = raw
        .url
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| permalink.clone());
    let body = raw.body.as_deref().map(normalize_text).unwrap_or_default();
    let title = normalize_text(&raw.title);
    let category = PostCategory::from_title(&title);

    let mut tags = vec![category.as_str().to_string()];
    for t in extract_topics(&format!("{title} {body}")) {
        if !tags.contains(&t) {
            tags.push(t);
        }
    }

    let mut item = FeedItem::new(
        format!("hn-{}", raw.id),
        title,
        body,
        url,
        SourceKind::SocialNews,
        source_url,
    );
    item.author = raw
        .author
        .filter(|a| !a.is_empty())
        .unwrap_or_else(|| "Unknown".to_string());
    item.published_at = raw
        .time
        .and_then(|t| Utc.timestamp_opt(t, 0).single())
        .unwrap_or_else(Utc::now);
    item.tags = tags;
    item.metadata.insert("points".into(), raw.points.into());
    item.metadata.insert("comments".into(), raw.comments.into());
    item.metadata.insert("category".into(), category.as_str().into());
    item.metadata.insert("permalink".into(), permalink.into());
    item
}

/// Map one story detail; `None` for deleted/dead/non-story or title-less records.
fn map_detail(d: StoryDetail, source_url: &str) -> Option<FeedItem> {
    if d.deleted || d.dead {
        return None;
    }
    if d.kind.as_deref().is_some_and(|k| k != "story" && k != "job") {
        return None;
    }
    let title = d.title.filter(|t| !t.trim().is_empty())?;
    Some(build_item(
        RawStory {
            id: d.id.to_string(),
            title,
            url: d.url,
            body: d.text,
            author: d.by,
            time: d.time,
            points: d.score,
            comments: d.descendants,
        },
        source_url,
    ))
}

/// Map a search response body into items; hits without a title are skipped.
pub fn parse_search_response(body: &str, source_url: &str) -> Result<Vec<FeedItem>> {
    let resp: SearchResponse =
        serde_json::from_str(body).map_err(|e| FeedError::Parse(format!("search response: {e}")))?;
    let mut out = Vec::with_capacity(resp.hits.len());
    for raw in resp.hits {
        let hit = match serde_json::from_value::<SearchHit>(raw) {
            Ok(h) => h,
            Err(e) => {
                record_skipped(NAME, &e.to_string());
                continue;
            }
        };
        let Some(title) = hit.title.filter(|t| !t.trim().is_empty()) else {
            record_skipped(NAME, "search hit without title");
            continue;
        };
        out.push(build_item(
            RawStory {
                id: hit.object_id,
                title,
                url: hit.url,
                body: hit.story_text,
                author: hit.author,
                time: hit.created_at_i,
                points: hit.points.unwrap_or(0),
                comments: hit.num_comments.unwrap_or(0),
            },
            source_url,
        ));
    }
    Ok(out)
}

pub struct SocialNewsAdapter {
    client: reqwest::Client,
}

impl SocialNewsAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn fetch_top(&self, source: &SourceConfig, limit: usize) -> Result<Vec<FeedItem>> {
        let base = source.url.trim_end_matches('/');
        let list_url = format!("{base}/topstories.json");
        let body = get_text(self.client.get(&list_url), &list_url).await?;
        let ids: Vec<u64> = serde_json::from_str(&body)
            .map_err(|e| FeedError::Parse(format!("top stories list: {e}")))?;

        let details = stream::iter(ids.into_iter().take(limit))
            .map(|id| {
                let url = format!("{base}/item/{id}.json");
                async move {
                    let res = get_text(self.client.get(&url), &url).await;
                    (id, res)
                }
            })
            .buffered(DETAIL_CONCURRENCY)
            .collect::<Vec<_>>()
            .await;

        let mut out = Vec::with_capacity(details.len());
        for (id, res) in details {
            let parsed = res.and_then(|b| {
                serde_json::from_str::<Option<StoryDetail>>(&b).map_err(FeedError::from)
            });
            match parsed {
                Ok(Some(d)) => {
                    if let Some(item) = map_detail(d, &source.url) {
                        out.push(item);
                    }
                }
                Ok(None) => record_skipped(NAME, "null story detail"),
                Err(e) => {
                    tracing::warn!(target: "ingest", story = id, error = %e, "story detail failed");
                    record_skipped(NAME, "story detail fetch failed");
                }
            }
        }
        Ok(out)
    }

    async fn fetch_search(&self, source: &SourceConfig, limit: usize) -> Result<Vec<FeedItem>> {
        let query = source
            .options
            .query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| {
                FeedError::InvalidConfig(format!("source `{}` search mode needs a query", source.id))
            })?;
        let base = source.url.trim_end_matches('/');
        let url = format!("{base}/search");
        let req = self.client.get(&url).query(&[
            ("query", query),
            ("tags", "story"),
            ("hitsPerPage", limit.to_string().as_str()),
        ]);
        let body = get_text(req, &url).await?;
        parse_search_response(&body, &source.url)
    }
}

#[async_trait]
impl SourceAdapter for SocialNewsAdapter {
    async fn fetch(&self, source: &SourceConfig) -> Result<Vec<FeedItem>> {
        let limit = source
            .options
            .limit
            .unwrap_or(DEFAULT_LIMIT)
            .clamp(1, MAX_LIMIT);
        match source.options.mode.as_deref().unwrap_or("top") {
            "search" => self.fetch_search(source, limit).await,
            "top" => self.fetch_top(source, limit).await,
            other => Err(FeedError::InvalidConfig(format!(
                "source `{}` has unknown mode `{other}`",
                source.id
            ))),
        }
    }

    fn kind(&self) -> SourceKind {
        SourceKind::SocialNews
    }

    fn name(&self) -> &'static str {
        NAME
    }
}
