use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub builder: BuilderConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// NDJSON boundary records (.gz accepted)
    pub boundaries: PathBuf,
    /// NDJSON place records (.gz accepted)
    pub places: PathBuf,
    /// Persisted hierarchy edges; rebuilt from geometry when absent
    pub edges: Option<PathBuf>,
}

/// Thresholds used by the fallback policy
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ResolverConfig {
    /// Maximum great-circle distance to a place match, metres
    pub search_radius_m: f64,
    /// Place matches farther than this are flagged approximate, metres
    pub exact_tolerance_m: f64,
    pub max_ascent_depth: usize,
    pub max_ascent_paths: usize,
    pub prefer_english_names: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            search_radius_m: 100_000.0,
            exact_tolerance_m: 5_000.0,
            max_ascent_depth: 16,
            max_ascent_paths: 64,
            prefer_english_names: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct BuilderConfig {
    /// Run the derived-edge pass on the rayon pool
    pub parallel: bool,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self { parallel: true }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        config.resolver.validate()?;
        Ok(config)
    }
}

impl ResolverConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.search_radius_m.is_finite() && self.search_radius_m >= 0.0) {
            anyhow::bail!("search_radius_m must be a non-negative number");
        }
        if !(self.exact_tolerance_m.is_finite() && self.exact_tolerance_m >= 0.0) {
            anyhow::bail!("exact_tolerance_m must be a non-negative number");
        }
        if self.max_ascent_depth == 0 || self.max_ascent_paths == 0 {
            anyhow::bail!("ascent limits must be at least 1");
        }
        Ok(())
    }
}
