//! Document retrieval for scraping with rate limiting and header rotation.
//!
//! The rest of the pipeline treats page retrieval as an opaque capability:
//! give it a URL (and optionally a proxy), get back a queryable document.
//! The production implementation fetches over HTTP with a randomized
//! user-agent, viewport hint and `Accept-Language`, a bounded timeout, and a
//! global request-rate cap so the target is never overwhelmed.

use std::num::NonZeroU32;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};
use reqwest::header::{ACCEPT_ENCODING, ACCEPT_LANGUAGE, CONNECTION, USER_AGENT};
use reqwest::Client;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

use crate::domain::constants::scraping;
use crate::domain::Proxy;

/// A navigable document snapshot. Queries are read-only; `None` means the
/// selector located nothing (yet), which strategy retries may absorb.
pub trait Document: Send + Sync {
    /// Text content of the first element matching the CSS selector, trimmed.
    /// Empty text counts as absent.
    fn select_text(&self, selector: &str) -> Option<String>;
}

/// Opaque document-retrieval capability.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch(&self, url: &str, proxy: Option<&Proxy>) -> Result<Box<dyn Document>>;
}

/// HTML snapshot backed by the raw response body.
///
/// `scraper::Html` is not `Send`, so the parse happens inside each query
/// instead of being held across await points; extraction futures stay
/// spawnable.
pub struct HtmlDocument {
    raw: String,
}

impl HtmlDocument {
    pub fn new(raw: String) -> Self {
        Self { raw }
    }
}

impl Document for HtmlDocument {
    fn select_text(&self, selector: &str) -> Option<String> {
        let selector = Selector::parse(selector).ok()?;
        let html = Html::parse_document(&self.raw);
        let text: String = html.select(&selector).next()?.text().collect();
        let text = text.trim().to_string();
        (!text.is_empty()).then_some(text)
    }
}

/// Fetcher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    pub timeout_seconds: u64,
    pub max_requests_per_second: u32,
    pub user_agents: Vec<String>,
    pub accept_languages: Vec<String>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: scraping::DEFAULT_PAGE_TIMEOUT_SECS,
            max_requests_per_second: 2,
            user_agents: vec![
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36".to_string(),
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36".to_string(),
                "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0".to_string(),
            ],
            accept_languages: vec![
                "en-US".to_string(),
                "en-GB".to_string(),
                "fr-FR".to_string(),
                "de-DE".to_string(),
            ],
        }
    }
}

/// HTTP-backed document fetcher.
pub struct PageFetcher {
    client: Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    config: FetcherConfig,
}

impl PageFetcher {
    pub fn new(config: FetcherConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("Failed to create HTTP client")?;

        let quota = Quota::per_second(
            NonZeroU32::new(config.max_requests_per_second)
                .context("Rate limit must be greater than 0")?,
        );

        Ok(Self {
            client,
            rate_limiter: RateLimiter::direct(quota),
            config,
        })
    }

    /// Per-proxy clients cannot be cached: credentials differ per job.
    fn proxied_client(&self, proxy: &Proxy) -> Result<Client> {
        let upstream = reqwest::Proxy::all(format!("http://{}:{}", proxy.host, proxy.port))
            .context("Invalid proxy endpoint")?
            .basic_auth(&proxy.username, &proxy.password);

        Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_seconds))
            .cookie_store(true)
            .proxy(upstream)
            .build()
            .context("Failed to create proxied HTTP client")
    }

    fn pick<'a>(pool: &'a [String]) -> &'a str {
        if pool.is_empty() {
            return "";
        }
        &pool[fastrand::usize(..pool.len())]
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }
}

#[async_trait]
impl DocumentFetcher for PageFetcher {
    async fn fetch(&self, url: &str, proxy: Option<&Proxy>) -> Result<Box<dyn Document>> {
        self.rate_limiter.until_ready().await;

        let client = match proxy {
            Some(p) => self.proxied_client(p)?,
            None => self.client.clone(),
        };

        tracing::debug!("Fetching document: {url}");

        let response = client
            .get(url)
            .header(USER_AGENT, Self::pick(&self.config.user_agents))
            .header(ACCEPT_LANGUAGE, Self::pick(&self.config.accept_languages))
            .header(ACCEPT_ENCODING, "gzip, deflate, br")
            .header(CONNECTION, "keep-alive")
            .header("Viewport-Width", fastrand::u32(1024..=1920).to_string())
            .send()
            .await
            .with_context(|| format!("Failed to fetch URL: {url}"))?;

        if !response.status().is_success() {
            anyhow::bail!("HTTP request failed with status {}: {url}", response.status());
        }

        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to read response body from: {url}"))?;

        tracing::debug!("Fetched {url} ({} chars)", body.len());
        Ok(Box::new(HtmlDocument::new(body)))
    }
}
