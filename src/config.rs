//! Store configuration, read from `.craftchain/config.yaml`.

use crate::storage::STORE_DIR;
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration file name within the store directory.
const CONFIG_FILE: &str = "config.yaml";

/// Default number of activity records returned by the feed.
pub const DEFAULT_ACTIVITY_LIMIT: usize = 20;

/// Default daemon flush interval in milliseconds.
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 100;

/// Tunables for a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Cap on the recent-activity feed
    pub activity_limit: usize,

    /// Daemon flush tick
    pub flush_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            activity_limit: DEFAULT_ACTIVITY_LIMIT,
            flush_interval_ms: DEFAULT_FLUSH_INTERVAL_MS,
        }
    }
}

impl Config {
    /// Path of the config file for a store root.
    pub fn path(root: &Path) -> PathBuf {
        root.join(STORE_DIR).join(CONFIG_FILE)
    }

    /// Load config for a store root. A missing file yields defaults.
    pub fn load(root: &Path) -> Result<Self> {
        let path = Self::path(root);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config =
            serde_yaml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))?;

        if config.activity_limit == 0 {
            eyre::bail!("activity_limit must be at least 1");
        }

        log::debug!("Loaded config from {}: {:?}", path.display(), config);
        Ok(config)
    }

    /// Write config for a store root.
    pub fn save(&self, root: &Path) -> Result<()> {
        let path = Self::path(root);
        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;
        fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}
