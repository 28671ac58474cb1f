//! Application configuration.
//!
//! One JSON file holds everything: scraping limits, extractor selector
//! strategies, gate endpoints, change policy and the record sources. Every
//! section has serde defaults so a partial file stays valid; a missing file
//! is created with the defaults on first load.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;

use super::extractor::ExtractorConfig;
use super::gate::GateConfig;
use super::http_client::FetcherConfig;
use crate::application::diff::ChangePolicy;
use crate::domain::constants::scraping;
use crate::domain::{Proxy, RecordSource};

/// Scraping limits and target addressing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapingConfig {
    /// Cap on simultaneously running extraction jobs within a source.
    pub max_concurrent: usize,
    /// Rows processed between write flushes.
    pub batch_size: usize,
    /// Record sources processed at once within a run.
    pub source_concurrency: usize,
    /// Product page URL prefix; the item key is appended.
    pub base_url: String,
    /// Query/path suffix appended after the item key.
    pub url_suffix: String,
    /// Draw a random proxy from the pool for each job.
    pub use_proxy: bool,
    pub proxies: Vec<Proxy>,
    /// Re-run the full pipeline on this interval; one-shot when absent.
    pub run_interval_minutes: Option<u64>,
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            max_concurrent: scraping::DEFAULT_MAX_CONCURRENT,
            batch_size: scraping::DEFAULT_BATCH_SIZE,
            source_concurrency: scraping::DEFAULT_SOURCE_CONCURRENCY,
            base_url: "https://www.amazon.com.au/dp/".to_string(),
            url_suffix: "/ref=olp-opf-redir?aod=1".to_string(),
            use_proxy: false,
            proxies: Vec::new(),
            run_interval_minutes: None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Also write a daily-rolled file under `directory`.
    pub file_output: bool,
    pub directory: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_output: false,
            directory: "logs".to_string(),
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scraping: ScrapingConfig,
    pub fetcher: FetcherConfig,
    pub extractor: ExtractorConfig,
    pub gate: GateConfig,
    pub policy: ChangePolicy,
    pub logging: LoggingConfig,
    /// Record sources to reconcile, processed independently.
    pub sources: Vec<RecordSource>,
    /// Root directory for the file-backed record store.
    pub store_root: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scraping: ScrapingConfig::default(),
            fetcher: FetcherConfig::default(),
            extractor: ExtractorConfig::default(),
            gate: GateConfig::default(),
            policy: ChangePolicy::default(),
            logging: LoggingConfig::default(),
            sources: Vec::new(),
            store_root: "data".to_string(),
        }
    }
}

impl AppConfig {
    /// Load from `path`, writing the defaults there first if nothing exists.
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            let defaults = Self::default();
            defaults.save(path).await?;
            info!("created default configuration at {}", path.display());
            return Ok(defaults);
        }

        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let bytes = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(path, bytes)
            .await
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.scraping.max_concurrent >= 1, "max_concurrent must be at least 1");
        anyhow::ensure!(self.scraping.batch_size >= 1, "batch_size must be at least 1");
        anyhow::ensure!(
            self.scraping.source_concurrency >= 1,
            "source_concurrency must be at least 1"
        );
        Url::parse(&self.scraping.base_url).context("base_url is not a valid URL")?;
        if self.scraping.use_proxy {
            anyhow::ensure!(
                !self.scraping.proxies.is_empty(),
                "use_proxy is set but the proxy pool is empty"
            );
        }
        Ok(())
    }
}
