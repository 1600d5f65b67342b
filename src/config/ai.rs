// src/config/ai.rs
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path};

fn default_provider() -> String {
    "openai".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_max_concurrency() -> usize {
    5
}
fn default_chunk_delay_ms() -> u64 {
    1000
}
fn default_item_timeout_secs() -> u64 {
    30
}
fn default_cost_per_1k() -> f64 {
    0.002
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiConfig {
    #[serde(default)]
    pub enabled: bool,
    /// "openai" | "mock" (case-insensitive)
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Chat-completions base URL; `None` means the public endpoint.
    #[serde(default)]
    pub base_url: Option<String>,
    /// "ENV" means: read from OPENAI_API_KEY
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_chunk_delay_ms")]
    pub chunk_delay_ms: u64,
    #[serde(default = "default_item_timeout_secs")]
    pub item_timeout_secs: u64,
    /// USD per 1k tokens, used for the batch cost estimate.
    #[serde(default = "default_cost_per_1k")]
    pub cost_per_1k_tokens: f64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            api_key: String::new(),
            max_concurrency: default_max_concurrency(),
            chunk_delay_ms: default_chunk_delay_ms(),
            item_timeout_secs: default_item_timeout_secs(),
            cost_per_1k_tokens: default_cost_per_1k(),
        }
    }
}

impl AiConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)?;
        let cfg: AiConfig = serde_json::from_str(&data)?;
        Ok(cfg.normalized())
    }

    /// Config file if present, otherwise defaults with the key taken from the environment.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load_from_file(path.as_ref()) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::debug!(target: "ai", error = %e, path = %path.as_ref().display(), "AI config not loaded, using defaults");
                AiConfig {
                    enabled: true,
                    api_key: "ENV".to_string(),
                    ..AiConfig::default()
                }
                .normalized()
            }
        }
    }

    fn normalized(mut self) -> Self {
        self.provider = self.provider.trim().to_lowercase();

        // A missing key is not fatal: provider selection falls back to the mock.
        if self.api_key.trim().eq_ignore_ascii_case("env") {
            self.api_key = match self.provider.as_str() {
                "openai" => env::var("OPENAI_API_KEY").unwrap_or_default(),
                _ => String::new(),
            };
        }
        self.api_key = self.api_key.trim().to_string();

        if self.max_concurrency == 0 {
            self.max_concurrency = default_max_concurrency();
        }
        if self.item_timeout_secs == 0 {
            self.item_timeout_secs = default_item_timeout_secs();
        }
        if !self.cost_per_1k_tokens.is_finite() || self.cost_per_1k_tokens < 0.0 {
            self.cost_per_1k_tokens = default_cost_per_1k();
        }
        self
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.is_empty()
    }
}
