//! Extraction strategy chain.
//!
//! Every attribute has an ordered list of independent location strategies
//! (CSS paths into the document). A strategy gets a bounded number of
//! attempts separated by a short pause, absorbing late-rendering races; the
//! first attempt yielding non-empty text wins and the chain moves on. Price
//! additionally has a composite fallback that reconstructs the value from
//! separately located whole and fraction fragments.
//!
//! Strategy failures are logged and swallowed, never raised: unavailability
//! is a valid terminal outcome. The whole extraction (fresh document + full
//! chain) is wrapped in an outer retry; exhausting it degrades to a record
//! with every field set to the `"Error"` sentinel, so callers can treat
//! extraction as a total function.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::http_client::{Document, DocumentFetcher};
use crate::domain::constants::scraping;
use crate::domain::{Proxy, RawExtraction};

/// Ordered selector strategies per attribute, plus retry bounds. This is
/// configuration data: the chain itself is a uniform first-success-wins
/// combinator over these lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    pub price_selectors: Vec<String>,
    /// Composite fallback: whole and fractional price fragments located
    /// separately and joined with a decimal point.
    pub price_whole_selector: String,
    pub price_fraction_selector: String,
    pub seller_selectors: Vec<String>,
    pub stock_selectors: Vec<String>,
    pub delivery_selectors: Vec<String>,
    pub attempts_per_strategy: u32,
    pub strategy_pause_ms: u64,
    /// Outer whole-attempt retry cap.
    pub max_retries: u32,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            price_selectors: vec![
                "#aod-price-0 .a-price .a-offscreen".to_string(),
                "#aod-price-1 .a-price .a-offscreen".to_string(),
                "#corePrice_feature_div .a-price .a-offscreen".to_string(),
                "#corePriceDisplay_desktop_feature_div .a-price .a-offscreen".to_string(),
                "#corePrice_desktop .a-price .a-offscreen".to_string(),
                "#aod-price-0 .a-price-whole".to_string(),
            ],
            price_whole_selector: "#corePriceDisplay_desktop_feature_div .a-price-whole"
                .to_string(),
            price_fraction_selector: "#corePriceDisplay_desktop_feature_div .a-price-fraction"
                .to_string(),
            seller_selectors: vec![
                "#aod-offer-shipsFrom .a-fixed-left-grid-col.a-col-right span".to_string(),
                "#fulfillerInfoFeature_feature_div .offer-display-feature-text span".to_string(),
                "#sellerProfileTriggerId".to_string(),
            ],
            stock_selectors: vec!["#availability span".to_string()],
            delivery_selectors: vec![
                "#mir-layout-DELIVERY_BLOCK-slot-PRIMARY_DELIVERY_MESSAGE_LARGE .a-text-bold"
                    .to_string(),
                "#mir-layout-DELIVERY_BLOCK-slot-PRIMARY_DELIVERY_MESSAGE_LARGE span".to_string(),
                "#mir-layout-DELIVERY_BLOCK-slot-PRIMARY_DELIVERY_MESSAGE_LARGE".to_string(),
            ],
            attempts_per_strategy: scraping::DEFAULT_STRATEGY_ATTEMPTS,
            strategy_pause_ms: scraping::DEFAULT_STRATEGY_PAUSE_MS,
            max_retries: scraping::DEFAULT_MAX_RETRIES,
        }
    }
}

/// Runs the strategy chain against freshly retrieved documents.
pub struct Extractor {
    config: ExtractorConfig,
    fetcher: Arc<dyn DocumentFetcher>,
    proxy_pool: Vec<Proxy>,
    use_proxy: bool,
}

impl Extractor {
    pub fn new(config: ExtractorConfig, fetcher: Arc<dyn DocumentFetcher>) -> Self {
        Self {
            config,
            fetcher,
            proxy_pool: Vec::new(),
            use_proxy: false,
        }
    }

    /// Enable per-job random proxy selection from the given pool.
    pub fn with_proxy_pool(mut self, pool: Vec<Proxy>, enabled: bool) -> Self {
        self.proxy_pool = pool;
        self.use_proxy = enabled;
        self
    }

    fn pick_proxy(&self) -> Option<&Proxy> {
        if !self.use_proxy || self.proxy_pool.is_empty() {
            return None;
        }
        Some(&self.proxy_pool[fastrand::usize(..self.proxy_pool.len())])
    }

    /// One strategy: up to `attempts_per_strategy` queries separated by a
    /// fixed pause. Succeeds on the first non-empty text.
    async fn try_strategy(&self, doc: &dyn Document, selector: &str) -> Option<String> {
        for attempt in 1..=self.config.attempts_per_strategy {
            if let Some(text) = doc.select_text(selector) {
                return Some(text);
            }
            if attempt < self.config.attempts_per_strategy {
                tokio::time::sleep(Duration::from_millis(self.config.strategy_pause_ms)).await;
            }
        }
        None
    }

    /// The chain: first strategy to yield text wins.
    async fn locate(
        &self,
        doc: &dyn Document,
        selectors: &[String],
        attribute: &str,
    ) -> Option<String> {
        for (index, selector) in selectors.iter().enumerate() {
            if let Some(text) = self.try_strategy(doc, selector).await {
                debug!("{attribute} found with strategy #{}: {text:?}", index + 1);
                return Some(text);
            }
            debug!("{attribute} strategy #{} exhausted", index + 1);
        }
        debug!("all {attribute} strategies exhausted");
        None
    }

    async fn locate_price(&self, doc: &dyn Document) -> Option<String> {
        if let Some(text) = self.locate(doc, &self.config.price_selectors, "price").await {
            return Some(text);
        }

        // Composite fallback: whole and fraction fragments joined.
        for attempt in 1..=self.config.attempts_per_strategy {
            let whole = doc.select_text(&self.config.price_whole_selector);
            let fraction = doc.select_text(&self.config.price_fraction_selector);
            if let (Some(whole), Some(fraction)) = (whole, fraction) {
                let combined = format!("{whole}.{fraction}");
                debug!("price reconstructed from whole/fraction: {combined}");
                return Some(combined);
            }
            if attempt < self.config.attempts_per_strategy {
                tokio::time::sleep(Duration::from_millis(self.config.strategy_pause_ms)).await;
            }
        }
        None
    }

    /// Run the full chain over one already-retrieved document. Read-only;
    /// absence of one field never blocks extraction of the others.
    pub async fn extract(&self, doc: &dyn Document) -> RawExtraction {
        RawExtraction {
            price: self.locate_price(doc).await,
            seller: self.locate(doc, &self.config.seller_selectors, "seller").await,
            stock: self.locate(doc, &self.config.stock_selectors, "stock").await,
            delivery_text: self
                .locate(doc, &self.config.delivery_selectors, "delivery")
                .await,
        }
    }

    /// Fresh retrieval plus full chain, retried up to `max_retries` times on
    /// any retrieval failure. Each outer attempt is fully independent: a new
    /// proxy is drawn and no state carries over.
    pub async fn scrape_with_retry(&self, url: &str) -> RawExtraction {
        for attempt in 1..=self.config.max_retries {
            let proxy = self.pick_proxy();
            match self.fetcher.fetch(url, proxy).await {
                Ok(doc) => return self.extract(doc.as_ref()).await,
                Err(error) => {
                    warn!(
                        "attempt {attempt}/{} failed for {url}: {error:#}",
                        self.config.max_retries
                    );
                }
            }
        }
        warn!("extraction exhausted all retries for {url}");
        RawExtraction::error()
    }
}
