use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use pricewatch::application::{Orchestrator, RunError, RunSettings};
use pricewatch::infrastructure::{
    AppConfig, ConnectivityGate, Extractor, JsonRecordStore, PageFetcher,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("pricewatch.json"));

    let config = AppConfig::load(&config_path).await?;
    pricewatch::infrastructure::logging::init_logging(&config.logging)?;
    info!(config = %config_path.display(), "pricewatch starting");

    if config.sources.is_empty() {
        anyhow::bail!("no record sources configured; add at least one to {}", config_path.display());
    }

    let fetcher = PageFetcher::new(config.fetcher.clone()).context("building page fetcher")?;
    let extractor = Extractor::new(config.extractor.clone(), Arc::new(fetcher))
        .with_proxy_pool(config.scraping.proxies.clone(), config.scraping.use_proxy);
    let store = Arc::new(JsonRecordStore::new(Path::new(&config.store_root)));
    let gate = ConnectivityGate::over_http(config.gate.clone())?;

    let orchestrator = Orchestrator::new(
        Arc::new(extractor),
        store,
        gate,
        config.sources.clone(),
        RunSettings {
            base_url: config.scraping.base_url.clone(),
            url_suffix: config.scraping.url_suffix.clone(),
            max_concurrent: config.scraping.max_concurrent,
            batch_size: config.scraping.batch_size,
            source_concurrency: config.scraping.source_concurrency,
            policy: config.policy.clone(),
        },
    );

    match config.scraping.run_interval_minutes {
        None => {
            orchestrator.run_all().await?;
        }
        Some(minutes) => {
            let mut ticker = tokio::time::interval(Duration::from_secs(minutes.max(1) * 60));
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match orchestrator.run_all().await {
                            Ok(_) => {}
                            Err(RunError::AlreadyRunning) => {
                                warn!("previous run still active, skipping this tick");
                            }
                            Err(err) => error!(%err, "run failed"),
                        }
                    }
                    _ = tokio::signal::ctrl_c() => {
                        info!("shutdown signal received");
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}
