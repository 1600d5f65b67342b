// src/config/catalog.rs
//! Source and profile catalog: the configuration collaborator the aggregator reads from.

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::model::{FocusProfile, SourceConfig};

const ENV_PATH: &str = "FEEDS_CATALOG_PATH";

/// Read-only view of configured sources and profiles.
pub trait Catalog: Send + Sync {
    fn sources(&self) -> Vec<SourceConfig>;
    fn profiles(&self) -> Vec<FocusProfile>;

    fn source(&self, id: &str) -> Option<SourceConfig> {
        self.sources().into_iter().find(|s| s.id == id)
    }

    fn profile(&self, id: &str) -> Option<FocusProfile> {
        self.profiles().into_iter().find(|p| p.id == id)
    }

    fn enabled_profiles(&self) -> Vec<FocusProfile> {
        self.profiles().into_iter().filter(|p| p.enabled).collect()
    }

    /// Enabled sources referenced by `profile`, in the profile's order. Unknown ids are skipped.
    fn sources_for_profile(&self, profile: &FocusProfile) -> Vec<SourceConfig> {
        let all = self.sources();
        profile
            .sources
            .iter()
            .filter_map(|id| all.iter().find(|s| &s.id == id))
            .filter(|s| s.enabled)
            .cloned()
            .collect()
    }
}

/// In-memory catalog, usually loaded once from `config/catalog.{toml,json}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaticCatalog {
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub profiles: Vec<FocusProfile>,
}

impl StaticCatalog {
    pub fn new(sources: Vec<SourceConfig>, profiles: Vec<FocusProfile>) -> Self {
        Self { sources, profiles }
    }

    /// Load from an explicit path. Supports TOML or JSON formats.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading catalog from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cat = Self::parse(&content, ext.as_str())?;
        cat.validate()?;
        Ok(cat)
    }

    /// Load using env var + fallbacks:
    /// 1) $FEEDS_CATALOG_PATH
    /// 2) config/catalog.toml
    /// 3) config/catalog.json
    pub fn load_default() -> anyhow::Result<Self> {
        if let Ok(p) = std::env::var(ENV_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("{ENV_PATH} points to non-existent path"));
        }
        let toml_p = PathBuf::from("config/catalog.toml");
        if toml_p.exists() {
            return Self::load_from(&toml_p);
        }
        let json_p = PathBuf::from("config/catalog.json");
        if json_p.exists() {
            return Self::load_from(&json_p);
        }
        tracing::warn!(target: "config", "no catalog found, starting with no sources or profiles");
        Ok(Self::default())
    }

    fn parse(s: &str, hint_ext: &str) -> anyhow::Result<Self> {
        if hint_ext == "json" {
            return Ok(serde_json::from_str(s)?);
        }
        if hint_ext == "toml" {
            return Ok(toml::from_str(s)?);
        }
        if let Ok(v) = serde_json::from_str(s) {
            return Ok(v);
        }
        toml::from_str(s).map_err(|e| anyhow!("unsupported catalog format: {e}"))
    }

    fn validate(&self) -> anyhow::Result<()> {
        for s in &self.sources {
            s.validate()?;
        }
        for p in &self.profiles {
            p.validate()?;
            for id in &p.sources {
                if !self.sources.iter().any(|s| &s.id == id) {
                    tracing::warn!(target: "config", profile = %p.id, source = %id, "profile references unknown source");
                }
            }
        }
        Ok(())
    }
}

impl Catalog for StaticCatalog {
    fn sources(&self) -> Vec<SourceConfig> {
        self.sources.clone()
    }

    fn profiles(&self) -> Vec<FocusProfile> {
        self.profiles.clone()
    }
}
