// tests/adapters.rs
//
// Source adapters against a local mock HTTP server.
//
// Covered:
// - syndication RSS fetch through fetch_from_source
// - 403 / timeout become a failed FetchResult (never an Err)
// - the HTTP client follows the configured timeout
// - code-host query parameters + bearer token
// - social-news "top" mode (dead items skipped) and "search" mode

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use focus_feeds::ingest::providers::{
    code_host::CodeHostAdapter, social_news::SocialNewsAdapter, syndication::SyndicationAdapter,
};
use focus_feeds::ingest::types::SourceAdapter;
use focus_feeds::ingest::{fetch_from_source, http_client, AdapterRegistry, DEFAULT_FETCH_TIMEOUT};
use focus_feeds::model::{SourceConfig, SourceKind, SourceOptions};

const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel>
    <title>Example</title>
    <item>
      <title>Tokio 2.0 released</title>
      <link>https://example.com/tokio-2</link>
      <description>&lt;p&gt;The async runtime gets a &lt;b&gt;major&lt;/b&gt; release.&lt;/p&gt;</description>
      <dc:creator>Alice</dc:creator>
      <category>Rust</category>
      <pubDate>Mon, 10 Mar 2025 12:00:00 +0000</pubDate>
    </item>
    <item>
      <title></title>
      <link>https://example.com/untitled</link>
    </item>
  </channel>
</rss>"#;

fn source(kind: SourceKind, url: String, options: SourceOptions) -> SourceConfig {
    SourceConfig {
        id: "s1".into(),
        name: "Test source".into(),
        kind,
        url,
        fetch_interval: 60,
        weight: 1.0,
        enabled: true,
        options,
    }
}

#[tokio::test]
async fn syndication_feed_is_fetched_and_normalized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(RSS))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = SyndicationAdapter::new(http_client(DEFAULT_FETCH_TIMEOUT).unwrap());
    let src = source(
        SourceKind::Syndication,
        format!("{}/feed.xml", server.uri()),
        SourceOptions::default(),
    );
    let res = fetch_from_source(&adapter, &src, Duration::from_secs(5)).await;

    assert!(res.success, "error: {:?}", res.error);
    assert_eq!(res.item_count, 1, "untitled item is skipped");
    let it = &res.items[0];
    assert_eq!(it.title, "Tokio 2.0 released");
    assert_eq!(it.author, "Alice");
    assert_eq!(it.content, "The async runtime gets a major release.");
    assert!(it.tags.contains(&"rust".to_string()));
    assert_eq!(it.source, SourceKind::Syndication);
}

#[tokio::test]
async fn forbidden_response_becomes_failed_result() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let adapter = SyndicationAdapter::new(http_client(DEFAULT_FETCH_TIMEOUT).unwrap());
    let src = source(
        SourceKind::Syndication,
        format!("{}/feed.xml", server.uri()),
        SourceOptions::default(),
    );
    let res = fetch_from_source(&adapter, &src, Duration::from_secs(5)).await;

    assert!(!res.success);
    assert!(res.items.is_empty());
    let err = res.error.expect("error message");
    assert!(err.contains("403"), "unexpected error: {err}");
    assert!(err.starts_with("Test source"));
}

#[tokio::test]
async fn slow_source_times_out_as_failed_result() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(RSS)
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let adapter = SyndicationAdapter::new(http_client(DEFAULT_FETCH_TIMEOUT).unwrap());
    let src = source(SourceKind::Syndication, server.uri(), SourceOptions::default());
    let res = fetch_from_source(&adapter, &src, Duration::from_millis(200)).await;

    assert!(!res.success);
    assert!(res.error.unwrap().contains("timed out"));
}

#[tokio::test]
async fn client_uses_the_configured_request_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(RSS)
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let src = source(SourceKind::Syndication, server.uri(), SourceOptions::default());

    let short = SyndicationAdapter::new(http_client(Duration::from_millis(200)).unwrap());
    assert!(short.fetch(&src).await.is_err());

    let long = SyndicationAdapter::new(http_client(Duration::from_secs(30)).unwrap());
    assert_eq!(long.fetch(&src).await.unwrap().len(), 1);
}

#[tokio::test]
async fn code_host_sends_query_and_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/repositories"))
        .and(query_param("q", "async language:rust"))
        .and(query_param("sort", "stars"))
        .and(query_param("per_page", "5"))
        .and(header("authorization", "Bearer t0ken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_count": 2,
            "items": [
                {
                    "id": 1,
                    "full_name": "tokio-rs/tokio",
                    "name": "tokio",
                    "html_url": "https://github.com/tokio-rs/tokio",
                    "description": "A runtime for writing reliable asynchronous applications",
                    "stargazers_count": 25000,
                    "forks_count": 2300,
                    "language": "Rust",
                    "topics": ["async", "runtime"],
                    "owner": { "login": "tokio-rs" },
                    "created_at": "2016-07-25T00:00:00Z",
                    "updated_at": "2025-03-01T00:00:00Z"
                },
                { "id": "broken" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = CodeHostAdapter::new(http_client(DEFAULT_FETCH_TIMEOUT).unwrap());
    let src = source(
        SourceKind::CodeHost,
        server.uri(),
        SourceOptions {
            auth_token: Some("t0ken".into()),
            query: Some("async".into()),
            language: Some("Rust".into()),
            limit: Some(5),
            ..SourceOptions::default()
        },
    );
    let res = fetch_from_source(&adapter, &src, Duration::from_secs(5)).await;

    assert!(res.success, "error: {:?}", res.error);
    assert_eq!(res.item_count, 1, "malformed record skipped");
    let it = &res.items[0];
    assert_eq!(it.url, "https://github.com/tokio-rs/tokio");
    assert!(it.tags.contains(&"rust".to_string()));
    assert!(it.tags.contains(&"async".to_string()));
    assert_eq!(it.metadata.get("stars"), Some(&json!(25000)));
}

#[tokio::test]
async fn social_news_top_skips_dead_items() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/topstories.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([1, 2, 3, 4])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/item/1.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 1, "type": "story", "by": "pg", "time": 1741608000,
            "title": "Show HN: A Rust tokenizer", "url": "https://example.com/tok",
            "score": 120, "descendants": 30
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/item/2.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 2, "type": "story", "dead": true, "title": "spam"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/item/3.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 3, "type": "story", "by": "dang", "time": 1741608000,
            "title": "Ask HN: How do you learn Kubernetes?", "text": "Looking for tips",
            "score": 40, "descendants": 12
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/item/4.json"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let adapter = SocialNewsAdapter::new(http_client(DEFAULT_FETCH_TIMEOUT).unwrap());
    let src = source(
        SourceKind::SocialNews,
        server.uri(),
        SourceOptions {
            limit: Some(10),
            ..SourceOptions::default()
        },
    );
    let res = fetch_from_source(&adapter, &src, Duration::from_secs(5)).await;

    assert!(res.success, "error: {:?}", res.error);
    let ids: Vec<_> = res.items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["hn-1", "hn-3"]);
    assert_eq!(res.items[0].metadata.get("category"), Some(&json!("show")));
    assert_eq!(
        res.items[1].url, "https://news.ycombinator.com/item?id=3",
        "self posts fall back to the permalink"
    );
    assert!(res.items[1].tags.contains(&"kubernetes".to_string()));
}

#[tokio::test]
async fn social_news_search_mode_uses_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("query", "llm"))
        .and(query_param("tags", "story"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hits": [{
                "objectID": "99", "title": "Running an LLM on a laptop",
                "url": "https://example.com/llm", "author": "x",
                "created_at_i": 1741608000, "points": 10, "num_comments": 2
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let registry = AdapterRegistry::with_defaults(DEFAULT_FETCH_TIMEOUT).unwrap();
    let adapter = registry.get(SourceKind::SocialNews).unwrap();
    let src = source(
        SourceKind::SocialNews,
        server.uri(),
        SourceOptions {
            mode: Some("search".into()),
            query: Some("llm".into()),
            ..SourceOptions::default()
        },
    );
    let res = fetch_from_source(adapter.as_ref(), &src, Duration::from_secs(5)).await;
    assert!(res.success, "error: {:?}", res.error);
    assert_eq!(res.items[0].id, "hn-99");
}

#[tokio::test]
async fn search_mode_without_query_is_a_failed_result() {
    let adapter = SocialNewsAdapter::new(http_client(DEFAULT_FETCH_TIMEOUT).unwrap());
    let src = source(
        SourceKind::SocialNews,
        "http://127.0.0.1:9".into(),
        SourceOptions {
            mode: Some("search".into()),
            ..SourceOptions::default()
        },
    );
    let res = fetch_from_source(&adapter, &src, Duration::from_secs(1)).await;
    assert!(!res.success);
    assert!(res.error.unwrap().contains("needs a query"));
}
