//! Configuration for the crawler and indexer
//!
//! Loaded from an optional TOML file; CLI flags override individual fields.
//! Validation collects every problem at once so the user fixes the file in
//! one pass.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_workers() -> usize {
    20
}

fn default_rate_limit_seconds() -> f32 {
    1.0
}

fn default_user_agent() -> String {
    "DeiSearchBot/1.0".to_string()
}

fn default_batch_size() -> usize {
    crate::indexer::DEFAULT_BATCH_SIZE
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub indexer: IndexerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            crawler: CrawlerConfig::default(),
            indexer: IndexerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// Number of parallel crawl workers.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Minimum interval between fetches of the same host, in seconds.
    /// May be sub-second.
    #[serde(default = "default_rate_limit_seconds")]
    pub rate_limit_seconds: f32,
    /// Stop after persisting this many pages; 0 means unlimited.
    #[serde(default)]
    pub max_pages: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            rate_limit_seconds: default_rate_limit_seconds(),
            max_pages: 0,
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// Pages pulled and committed per transaction.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
        }
    }
}

impl Config {
    /// Load and validate a TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file '{}': {}", path.display(), e))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("failed to parse config file '{}': {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        if self.crawler.workers == 0 {
            errors.push("crawler workers must be positive".to_string());
        }
        if !self.crawler.rate_limit_seconds.is_finite() || self.crawler.rate_limit_seconds <= 0.0 {
            errors.push("rate_limit_seconds must be a positive number".to_string());
        }
        if self.crawler.user_agent.trim().is_empty() {
            errors.push("user_agent must not be empty".to_string());
        }
        if self.indexer.batch_size == 0 {
            errors.push("indexer batch_size must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            anyhow::bail!("invalid configuration:\n  - {}", errors.join("\n  - "))
        }
    }
}
