// src/error.rs
//! Library error type. Transport failures are folded into result records by the callers;
//! only configuration and quota failures are expected to reach the API layer.

use crate::model::SourceKind;

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("no adapter registered for source kind {0:?}")]
    UnknownSourceKind(SourceKind),

    #[error("profile not found: {id}")]
    ProfileNotFound { id: String },

    #[error("source not found: {id}")]
    SourceNotFound { id: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("AI provider error: {0}")]
    Ai(String),

    #[error("rate limited by {provider}")]
    RateLimited { provider: String },

    #[error("daily quota exceeded for {key}")]
    QuotaExceeded { key: String },

    #[error("store error: {0}")]
    Store(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FeedError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, FeedError::RateLimited { .. })
            || matches!(self, FeedError::Status { status: 429, .. })
    }
}

pub type Result<T> = std::result::Result<T, FeedError>;
