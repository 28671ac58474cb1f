//! Connectivity/region pre-flight gate.
//!
//! Before a run touches the target, the gate confirms basic network
//! reachability and that the effective egress region matches the expected
//! one. Each round is one reachability check plus one region check; rounds
//! are separated by a long backoff. Failing every round means the run must be
//! skipped entirely rather than proceeding with unverified egress.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::domain::constants::gate;

/// Gate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Known-good endpoint for the reachability probe.
    pub probe_url: String,
    pub probe_timeout_secs: u64,
    /// Independent IP-geolocation endpoints, tried in order so one being
    /// rate-limited does not fail the round.
    pub region_endpoints: Vec<String>,
    /// Acceptable region answers (country code or name).
    pub expected_regions: Vec<String>,
    pub max_retries: u32,
    pub retry_delay_secs: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            probe_url: gate::DEFAULT_PROBE_URL.to_string(),
            probe_timeout_secs: gate::DEFAULT_PROBE_TIMEOUT_SECS,
            region_endpoints: vec![
                "https://ipinfo.io/json".to_string(),
                "https://api.myip.com".to_string(),
            ],
            expected_regions: vec!["US".to_string(), "United States".to_string()],
            max_retries: gate::DEFAULT_MAX_RETRIES,
            retry_delay_secs: gate::DEFAULT_RETRY_DELAY_SECS,
        }
    }
}

/// Probing seam: reachability plus the egress region answer, if any.
#[async_trait]
pub trait RegionProbe: Send + Sync {
    async fn is_connected(&self) -> bool;
    /// Region reported by the first geolocation endpoint returning a usable
    /// answer; `None` when every endpoint failed or was rate-limited.
    async fn egress_region(&self) -> Option<String>;
}

/// HTTP implementation of the probe.
pub struct HttpRegionProbe {
    client: reqwest::Client,
    config: GateConfig,
}

impl HttpRegionProbe {
    pub fn new(config: GateConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.probe_timeout_secs))
            .build()
            .context("Failed to create gate HTTP client")?;
        Ok(Self { client, config })
    }

    async fn query_endpoint(&self, url: &str) -> Option<serde_json::Value> {
        let response = match self.client.get(url).send().await {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                warn!("region endpoint {url} answered {}", r.status());
                return None;
            }
            Err(error) => {
                warn!("region endpoint {url} unreachable: {error}");
                return None;
            }
        };

        let data: serde_json::Value = match response.json().await {
            Ok(v) => v,
            Err(error) => {
                warn!("region endpoint {url} returned invalid JSON: {error}");
                return None;
            }
        };

        // Rate-limited answers carry an error body with a 200 status.
        if data.get("error").is_some()
            || data.get("reason").and_then(|r| r.as_str()) == Some("RateLimited")
        {
            warn!("region endpoint {url} rate-limited: {data}");
            return None;
        }
        Some(data)
    }
}

#[async_trait]
impl RegionProbe for HttpRegionProbe {
    async fn is_connected(&self) -> bool {
        match self.client.get(&self.config.probe_url).send().await {
            Ok(response) => response.status().is_success(),
            Err(error) => {
                warn!("reachability probe failed: {error}");
                false
            }
        }
    }

    async fn egress_region(&self) -> Option<String> {
        for url in &self.config.region_endpoints {
            if let Some(data) = self.query_endpoint(url).await {
                let country = data.get("country").and_then(|c| c.as_str());
                info!("region answer from {url}: {country:?}");
                if let Some(country) = country {
                    return Some(country.to_string());
                }
            }
        }
        warn!("all region endpoints rate-limited or failed");
        None
    }
}

/// The gate itself: bounded rounds of probe + region confirmation.
pub struct ConnectivityGate {
    probe: Arc<dyn RegionProbe>,
    config: GateConfig,
}

impl ConnectivityGate {
    pub fn new(probe: Arc<dyn RegionProbe>, config: GateConfig) -> Self {
        Self { probe, config }
    }

    /// Build the gate with the HTTP probe.
    pub fn over_http(config: GateConfig) -> Result<Self> {
        let probe = Arc::new(HttpRegionProbe::new(config.clone())?);
        Ok(Self::new(probe, config))
    }

    fn region_matches(&self, region: &str) -> bool {
        self.config
            .expected_regions
            .iter()
            .any(|expected| expected.eq_ignore_ascii_case(region))
    }

    /// `true` once reachability and the expected egress region are both
    /// confirmed; `false` after `max_retries` failed rounds.
    pub async fn ensure_ready(&self) -> bool {
        for attempt in 1..=self.config.max_retries {
            info!(
                "checking connectivity and egress region [round {attempt}/{}]",
                self.config.max_retries
            );

            if !self.probe.is_connected().await {
                warn!("network unreachable; will retry");
            } else {
                match self.probe.egress_region().await {
                    Some(region) if self.region_matches(&region) => {
                        info!("connectivity and region '{region}' confirmed");
                        return true;
                    }
                    Some(region) => {
                        warn!("egress region '{region}' does not match expectation");
                    }
                    None => warn!("no usable region answer"),
                }
            }

            if attempt < self.config.max_retries {
                tokio::time::sleep(Duration::from_secs(self.config.retry_delay_secs)).await;
            }
        }

        error!("connectivity gate failed after {} rounds", self.config.max_retries);
        false
    }
}
