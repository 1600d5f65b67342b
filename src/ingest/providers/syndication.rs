// src/ingest/providers/syndication.rs
//! RSS 2.0 / Atom adapter.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use quick_xml::de::from_str;
use serde::Deserialize;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;

use crate::error::{FeedError, Result};
use crate::ingest::types::SourceAdapter;
use crate::ingest::{get_text, normalize_text, record_skipped};
use crate::model::{FeedItem, SourceConfig, SourceKind};

const NAME: &str = "syndication";

/// Element whose attributes we don't care about (`<guid isPermaLink>`, `<category domain>`).
#[derive(Debug, Default, Deserialize)]
struct TextNode {
    #[serde(rename = "$text", default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    title: Option<String>,
    link: Option<String>,
    guid: Option<TextNode>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    #[serde(rename = "content:encoded", alias = "encoded")]
    encoded: Option<String>,
    author: Option<String>,
    #[serde(rename = "dc:creator", alias = "creator")]
    creator: Option<String>,
    #[serde(rename = "category", default)]
    categories: Vec<TextNode>,
}

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    id: Option<String>,
    title: Option<TextNode>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    published: Option<String>,
    updated: Option<String>,
    summary: Option<TextNode>,
    content: Option<TextNode>,
    author: Option<AtomAuthor>,
    #[serde(rename = "category", default)]
    categories: Vec<AtomCategory>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: String,
    #[serde(rename = "@rel", default)]
    rel: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomAuthor {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomCategory {
    #[serde(rename = "@term")]
    term: String,
}

/// Parse RFC 2822 (RSS) or RFC 3339 (Atom); anything else becomes "now".
fn parse_date(ts: Option<&str>) -> DateTime<Utc> {
    let Some(ts) = ts.map(str::trim).filter(|s| !s.is_empty()) else {
        return Utc::now();
    };
    OffsetDateTime::parse(ts, &Rfc2822)
        .or_else(|_| OffsetDateTime::parse(ts, &Rfc3339))
        .ok()
        .and_then(|dt| Utc.timestamp_opt(dt.unix_timestamp(), 0).single())
        .or_else(|| {
            DateTime::parse_from_rfc2822(ts)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        })
        .unwrap_or_else(Utc::now)
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", "&#160;")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&hellip;", "...")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn category_tags<I: IntoIterator<Item = String>>(cats: I) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for c in cats {
        let t = c.trim().to_lowercase();
        if !t.is_empty() && !tags.contains(&t) {
            tags.push(t);
        }
    }
    tags
}

/// Turn a feed document into items. Records without a title or link are skipped.
pub fn parse_feed(xml: &str, source_url: &str) -> Result<Vec<FeedItem>> {
    let xml = scrub_html_entities_for_xml(xml);
    match from_str::<Rss>(&xml) {
        Ok(rss) => Ok(map_rss(rss, source_url)),
        Err(rss_err) => match from_str::<AtomFeed>(&xml) {
            Ok(atom) if xml.contains("<feed") => Ok(map_atom(atom, source_url)),
            _ => Err(FeedError::Parse(format!("not an RSS or Atom document: {rss_err}"))),
        },
    }
}

fn map_rss(rss: Rss, source_url: &str) -> Vec<FeedItem> {
    let mut out = Vec::with_capacity(rss.channel.items.len());
    for it in rss.channel.items {
        let (Some(title), Some(link)) = (non_empty(it.title), non_empty(it.link)) else {
            record_skipped(NAME, "rss item without title or link");
            continue;
        };
        let id = it
            .guid
            .map(|g| g.value.trim().to_string())
            .filter(|g| !g.is_empty())
            .unwrap_or_else(|| link.clone());
        let body = it.description.or(it.encoded).unwrap_or_default();

        let mut item = FeedItem::new(
            id,
            normalize_text(&title),
            normalize_text(&body),
            link,
            SourceKind::Syndication,
            source_url,
        );
        item.author = non_empty(it.author)
            .or_else(|| non_empty(it.creator))
            .unwrap_or_else(|| "Unknown".to_string());
        item.published_at = parse_date(it.pub_date.as_deref());
        item.tags = category_tags(it.categories.into_iter().map(|c| c.value));
        out.push(item);
    }
    out
}

fn map_atom(feed: AtomFeed, source_url: &str) -> Vec<FeedItem> {
    let mut out = Vec::with_capacity(feed.entries.len());
    for e in feed.entries {
        let link = e
            .links
            .iter()
            .find(|l| l.rel.as_deref().map_or(true, |r| r == "alternate"))
            .or_else(|| e.links.first())
            .map(|l| l.href.trim().to_string())
            .filter(|h| !h.is_empty());
        let title = non_empty(e.title.map(|t| t.value));
        let (Some(title), Some(link)) = (title, link) else {
            record_skipped(NAME, "atom entry without title or link");
            continue;
        };
        let id = non_empty(e.id).unwrap_or_else(|| link.clone());
        let body = e
            .summary
            .or(e.content)
            .map(|n| n.value)
            .unwrap_or_default();

        let mut item = FeedItem::new(
            id,
            normalize_text(&title),
            normalize_text(&body),
            link,
            SourceKind::Syndication,
            source_url,
        );
        item.author = non_empty(e.author.and_then(|a| a.name))
            .unwrap_or_else(|| "Unknown".to_string());
        item.published_at = parse_date(e.published.as_deref().or(e.updated.as_deref()));
        item.tags = category_tags(e.categories.into_iter().map(|c| c.term));
        out.push(item);
    }
    out
}

pub struct SyndicationAdapter {
    client: reqwest::Client,
}

impl SyndicationAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SourceAdapter for SyndicationAdapter {
    async fn fetch(&self, source: &SourceConfig) -> Result<Vec<FeedItem>> {
        let body = get_text(self.client.get(&source.url), &source.url).await?;
        let items = parse_feed(&body, &source.url)?;
        tracing::debug!(target: "ingest", source = %source.id, items = items.len(), "feed parsed");
        Ok(items)
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Syndication
    }

    fn name(&self) -> &'static str {
        NAME
    }
}
