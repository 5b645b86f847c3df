//! Sources of a complete usage map: the live portal scrape, or a pre-built
//! JSON file for development without portal access.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::orchestrator;
use crate::types::UsageMap;

#[async_trait]
pub trait UsageProvider: Send + Sync {
    /// Produce one complete usage map, or fail; partial maps are never
    /// returned.
    async fn fetch_usage(&self) -> Result<UsageMap, ScraperError>;
}

/// Scrapes the portal via [`orchestrator::fetch_usage`].
pub struct LiveProvider {
    config: ScraperConfig,
}

impl LiveProvider {
    pub fn new(config: ScraperConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl UsageProvider for LiveProvider {
    async fn fetch_usage(&self) -> Result<UsageMap, ScraperError> {
        orchestrator::fetch_usage(&self.config).await
    }
}

/// Serves a usage map from a JSON file shaped like
/// `{"YYYY-MM-DD": {"HH:00": litres}}`.
pub struct DebugFileProvider {
    path: PathBuf,
}

impl DebugFileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl UsageProvider for DebugFileProvider {
    async fn fetch_usage(&self) -> Result<UsageMap, ScraperError> {
        info!("loading debug usage data from {:?}", self.path);
        let raw = tokio::fs::read(&self.path).await?;
        let usage: UsageMap = serde_json::from_slice(&raw)?;
        debug!("loaded {} days of debug data", usage.len());
        if usage.is_empty() {
            return Err(ScraperError::NoData("debug data file is empty".into()));
        }
        Ok(usage)
    }
}
