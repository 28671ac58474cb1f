//! Domain constants shared across the scraping and reconciliation pipeline.
//!
//! Sentinel strings, stock keyword sets and business-policy defaults live here
//! as named constants so the policy values are visible in one place instead of
//! being scattered through the pipeline.

/// Reserved sentinel strings standing in for "value intentionally absent".
pub mod sentinel {
    /// Price could not be located on the page.
    pub const NOT_FOUND: &str = "Not Found";

    /// Extraction failed entirely (all outer retries exhausted).
    pub const ERROR: &str = "Error";

    /// Offer exists but cannot currently be purchased.
    pub const UNAVAILABLE: &str = "Unavailable";

    /// Seller block could not be located.
    pub const SELLER_NOT_FOUND: &str = "Seller Not Found";

    /// Delivery estimate could not be located or parsed.
    pub const DELIVERY_NOT_FOUND: &str = "Delivery Not Found";

    /// Price cell values that force a needs-attention write regardless of
    /// the other fields.
    pub const INVALID_PRICES: &[&str] = &["0", "-1", NOT_FOUND, ERROR, UNAVAILABLE];
}

/// Keyword sets used to classify raw stock phrases.
pub mod stock {
    /// Phrases indicating the item can be purchased. Matching this set wins
    /// over the unavailable set since these phrases are more specific.
    pub const AVAILABLE: &[&str] = &[
        "in stock",
        "only",
        "left in stock",
        "nur noch",
        "vorrätig",
        "available to ship",
        "lieferbar",
        "versandbereit",
        "gewöhnlich versandfertig in",
        "usually ships within",
    ];

    /// Phrases indicating the item cannot be purchased.
    pub const UNAVAILABLE: &[&str] = &["out of stock", "nicht auf lager"];
}

/// Scraping defaults.
pub mod scraping {
    /// Default bound on simultaneously running extraction jobs.
    pub const DEFAULT_MAX_CONCURRENT: usize = 3;

    /// Default number of rows processed between write flushes.
    pub const DEFAULT_BATCH_SIZE: usize = 10;

    /// Default bound on record sources processed at once.
    pub const DEFAULT_SOURCE_CONCURRENCY: usize = 2;

    /// Default cap on whole-attempt extraction retries.
    pub const DEFAULT_MAX_RETRIES: u32 = 10;

    /// Default attempts per selector strategy.
    pub const DEFAULT_STRATEGY_ATTEMPTS: u32 = 6;

    /// Default pause between strategy attempts (milliseconds).
    pub const DEFAULT_STRATEGY_PAUSE_MS: u64 = 500;

    /// Default page retrieval timeout (seconds).
    pub const DEFAULT_PAGE_TIMEOUT_SECS: u64 = 60;
}

/// Change-detection policy defaults. These are business policy, not derived
/// values; they are surfaced in `ChangePolicy` so deployments can tune them.
pub mod policy {
    /// Delivery offsets above this many days flag the row for attention even
    /// when nothing textually changed.
    pub const DEFAULT_DELIVERY_EXCEEDED_DAYS: i64 = 10;

    /// A resolved date this many days or more in the past is treated as a
    /// year-boundary wraparound (e.g. a January date scraped in December)
    /// rather than a stale estimate.
    pub const YEAR_WRAP_LOOKBACK_DAYS: i64 = 183;
}

/// Connectivity gate defaults.
pub mod gate {
    /// Known-good endpoint for the reachability probe.
    pub const DEFAULT_PROBE_URL: &str = "https://www.google.com";

    /// Reachability/region probe timeout (seconds).
    pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 5;

    /// Full rounds of reachability + region checks before giving up.
    pub const DEFAULT_MAX_RETRIES: u32 = 6;

    /// Backoff between rounds (seconds).
    pub const DEFAULT_RETRY_DELAY_SECS: u64 = 300;
}
