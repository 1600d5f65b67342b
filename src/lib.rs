// src/lib.rs
// Public library surface for integration tests and the service binary.

pub mod aggregate;
pub mod ai;
pub mod analyze;
pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod history;
pub mod ingest;
pub mod metrics;
pub mod model;
pub mod store;

use std::sync::Arc;

use tracing::info;

pub use crate::aggregate::{Aggregator, FetchOptions};
pub use crate::api::{create_router, router, AppState};
pub use crate::cache::{CachePolicy, FeedGateway};
pub use crate::error::{FeedError, Result};

use crate::ai::{select_provider, AiEnhancer, EnhancerConfig};
use crate::config::{AiConfig, AppConfig, StaticCatalog};
use crate::history::{RunHistory, SeenLedger};
use crate::ingest::AdapterRegistry;
use crate::store::MemoryStore;

impl From<&AppConfig> for CachePolicy {
    fn from(cfg: &AppConfig) -> Self {
        CachePolicy {
            cache_duration: cfg.cache_duration(),
            daily_max: cfg.daily_quota,
        }
    }
}

/// Wire catalog, adapters, AI provider, store and gateway from configuration.
///
/// The AI provider is selected here once (probe-then-fallback) and kept for the
/// process lifetime.
pub async fn bootstrap(app: &AppConfig) -> anyhow::Result<AppState> {
    let catalog = match &app.catalog_path {
        Some(p) => StaticCatalog::load_from(p)?,
        None => StaticCatalog::load_default()?,
    };
    info!(
        sources = catalog.sources.len(),
        profiles = catalog.profiles.len(),
        "catalog loaded"
    );

    let ai_cfg = AiConfig::load_or_default(&app.ai_config_path);
    let providers = select_provider(&ai_cfg).await;
    let enhancer = Arc::new(AiEnhancer::new(
        providers.active(),
        EnhancerConfig::from(&ai_cfg),
    ));

    let aggregator = Aggregator::new(
        Arc::new(catalog),
        AdapterRegistry::with_defaults(app.fetch_timeout())?,
        Arc::new(MemoryStore::new()),
    )
    .with_enhancer(enhancer)
    .with_history(Arc::new(RunHistory::with_capacity(app.history_capacity)))
    .with_ledger(Arc::new(SeenLedger::with_capacity(app.seen_ledger_capacity)))
    .with_fetch_timeout(app.fetch_timeout())
    .with_similarity_threshold(app.similarity_threshold);

    let gateway = FeedGateway::new(Arc::new(aggregator), CachePolicy::from(app));
    Ok(AppState {
        gateway: Arc::new(gateway),
        providers,
    })
}
