// src/ai/mod.rs
//! AI enhancement: provider abstraction, prompts, response parsing and the batch pipeline.

pub mod mock;
pub mod openai;
pub mod parse;
pub mod pipeline;
pub mod prompts;
pub mod provider;

use std::sync::Arc;

use tracing::{info, warn};

pub use crate::ai::mock::MockProvider;
pub use crate::ai::openai::OpenAiProvider;
pub use crate::ai::pipeline::{AiEnhancer, BatchOutcome, BatchStats, EnhanceOptions, EnhancerConfig};
pub use crate::ai::provider::{AiProvider, AiRequest, AiResponse, ProviderStatsSnapshot, TokenUsage};

use crate::config::ai::AiConfig;

/// Every provider initialized at start-up plus the one selected for the process lifetime.
#[derive(Clone)]
pub struct ProviderSet {
    active: Arc<dyn AiProvider>,
    all: Vec<Arc<dyn AiProvider>>,
}

impl ProviderSet {
    pub fn new(active: Arc<dyn AiProvider>, all: Vec<Arc<dyn AiProvider>>) -> Self {
        let mut all = all;
        if !all.iter().any(|p| Arc::ptr_eq(p, &active)) {
            all.push(active.clone());
        }
        Self { active, all }
    }

    /// Only the mock; used when AI is disabled or in tests.
    pub fn mock_only() -> Self {
        let mock: Arc<dyn AiProvider> = Arc::new(MockProvider::new());
        Self::new(mock.clone(), vec![mock])
    }

    pub fn active(&self) -> Arc<dyn AiProvider> {
        self.active.clone()
    }

    pub fn active_name(&self) -> &'static str {
        self.active.name()
    }

    pub fn stats(&self) -> Vec<ProviderStatsSnapshot> {
        self.all.iter().map(|p| p.stats()).collect()
    }
}

/// Pick the provider once at start-up: the configured real provider when it has a key and
/// answers the probe, the mock otherwise.
pub async fn select_provider(cfg: &AiConfig) -> ProviderSet {
    let mock: Arc<dyn AiProvider> = Arc::new(MockProvider::new());

    if !cfg.enabled || cfg.provider == "mock" {
        info!(target: "ai", enabled = cfg.enabled, "using mock AI provider");
        return ProviderSet::new(mock.clone(), vec![mock]);
    }
    if cfg.provider != "openai" {
        warn!(target: "ai", provider = %cfg.provider, "unsupported AI provider, using mock");
        return ProviderSet::new(mock.clone(), vec![mock]);
    }
    if !cfg.has_api_key() {
        warn!(target: "ai", "no API key configured, using mock");
        return ProviderSet::new(mock.clone(), vec![mock]);
    }

    let real: Arc<dyn AiProvider> = match OpenAiProvider::from_config(cfg) {
        Ok(p) => Arc::new(p),
        Err(e) => {
            warn!(target: "ai", error = %e, "failed to build provider, using mock");
            return ProviderSet::new(mock.clone(), vec![mock]);
        }
    };

    // Safe diagnostics: only provider + model + key length
    info!(
        target: "ai",
        provider = real.name(),
        model = real.model(),
        key_len = cfg.api_key.len(),
        "probing AI provider"
    );
    if real.probe().await {
        info!(target: "ai", provider = real.name(), "AI provider ready");
        ProviderSet::new(real.clone(), vec![real, mock])
    } else {
        warn!(target: "ai", provider = real.name(), "probe failed, falling back to mock");
        ProviderSet::new(mock.clone(), vec![real, mock])
    }
}
