// src/config/app.rs
//! Process-wide settings: cache/quota policy, fetch timeout, dedup threshold, ledger sizes.

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PATH: &str = "FEEDS_CONFIG_PATH";
const ENV_CACHE_HOURS: &str = "FEEDS_CACHE_HOURS";
const ENV_DAILY_QUOTA: &str = "FEEDS_DAILY_QUOTA";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub cache_hours: u64,
    /// Non-forced fresh fetches allowed per profile (or `all`) and UTC day, shared by every
    /// request variant of that profile.
    pub daily_quota: u32,
    pub fetch_timeout_secs: u64,
    pub similarity_threshold: f32,
    pub history_capacity: usize,
    pub seen_ledger_capacity: usize,
    pub ai_config_path: PathBuf,
    pub catalog_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_hours: 12,
            daily_quota: 10,
            fetch_timeout_secs: 10,
            similarity_threshold: 0.8,
            history_capacity: 50,
            seen_ledger_capacity: 5_000,
            ai_config_path: PathBuf::from("config/ai.json"),
            catalog_path: None,
        }
    }
}

impl AppConfig {
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("reading app config from {}", path.display()))?;
        let cfg: AppConfig = toml::from_str(&s)?;
        Ok(cfg)
    }

    /// $FEEDS_CONFIG_PATH, then `config/app.toml`, then defaults; env overrides applied last.
    pub fn load() -> anyhow::Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else {
            let default_p = Path::new("config/app.toml");
            if default_p.exists() {
                Self::load_from(default_p)?
            } else {
                Self::default()
            }
        };
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        if let Ok(v) = std::env::var(ENV_CACHE_HOURS) {
            self.cache_hours = v
                .trim()
                .parse()
                .with_context(|| format!("{ENV_CACHE_HOURS}={v} is not a number"))?;
        }
        if let Ok(v) = std::env::var(ENV_DAILY_QUOTA) {
            self.daily_quota = v
                .trim()
                .parse()
                .with_context(|| format!("{ENV_DAILY_QUOTA}={v} is not a number"))?;
        }
        Ok(())
    }

    fn validate(&self) -> anyhow::Result<()> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(anyhow!(
                "similarity_threshold {} outside [0,1]",
                self.similarity_threshold
            ));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(anyhow!("fetch_timeout_secs must be positive"));
        }
        Ok(())
    }

    pub fn cache_duration(&self) -> Duration {
        Duration::from_secs(self.cache_hours * 3600)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}
