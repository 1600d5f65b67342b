// src/ingest/types.rs
use crate::error::Result;
use crate::model::{FeedItem, SourceConfig, SourceKind};

/// One adapter per source kind. Converts a provider payload into `FeedItem`s.
///
/// Adapters skip malformed records (logging them) but return `Err` on transport
/// failure; `ingest::fetch_from_source` turns that into a failed `FetchResult`.
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    async fn fetch(&self, source: &SourceConfig) -> Result<Vec<FeedItem>>;
    fn kind(&self) -> SourceKind;
    fn name(&self) -> &'static str;
}
