//! End-to-end pipeline tests over stubbed fetching and storage.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;

use pricewatch::application::{ChangePolicy, Orchestrator, RunError, RunSettings};
use pricewatch::domain::{Proxy, RecordSource};
use pricewatch::infrastructure::record_store::{columns, RowUpdate, StoreError};
use pricewatch::infrastructure::{Document, DocumentFetcher, Extractor, ExtractorConfig,
    ConnectivityGate, GateConfig, RecordStore};
use pricewatch::infrastructure::gate::RegionProbe;

struct StubDocument {
    fields: HashMap<String, String>,
}

impl Document for StubDocument {
    fn select_text(&self, selector: &str) -> Option<String> {
        self.fields.get(selector).cloned()
    }
}

/// Serves one canned document per URL; unknown URLs fail every attempt.
struct StubFetcher {
    pages: HashMap<String, HashMap<String, String>>,
}

#[async_trait]
impl DocumentFetcher for StubFetcher {
    async fn fetch(&self, url: &str, _proxy: Option<&Proxy>) -> Result<Box<dyn Document>> {
        match self.pages.get(url) {
            Some(fields) => Ok(Box::new(StubDocument { fields: fields.clone() })),
            None => anyhow::bail!("connection refused"),
        }
    }
}

#[derive(Default)]
struct MemoryStore {
    rows: Mutex<Vec<Vec<String>>>,
    writes: Mutex<Vec<RowUpdate>>,
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn read_all(&self, _source: &RecordSource) -> Result<Vec<Vec<String>>, StoreError> {
        Ok(self.rows.lock().expect("rows").clone())
    }

    async fn write_row(&self, _source: &RecordSource, update: &RowUpdate) -> Result<(), StoreError> {
        self.writes.lock().expect("writes").push(update.clone());
        Ok(())
    }
}

struct OpenProbe;

#[async_trait]
impl RegionProbe for OpenProbe {
    async fn is_connected(&self) -> bool {
        true
    }

    async fn egress_region(&self) -> Option<String> {
        Some("US".to_string())
    }
}

struct ClosedProbe;

#[async_trait]
impl RegionProbe for ClosedProbe {
    async fn is_connected(&self) -> bool {
        false
    }

    async fn egress_region(&self) -> Option<String> {
        None
    }
}

fn header() -> Vec<String> {
    [
        columns::ITEM_KEY,
        columns::PRICE,
        columns::PRICE_CHANGED,
        columns::NEEDS_ATTENTION,
        columns::STOCK,
        columns::SELLER,
        columns::DELIVERY_TEXT,
        columns::DELIVERY_STATUS,
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn row(key: &str, price: &str, stock: &str, seller: &str, delivery: &str) -> Vec<String> {
    vec![
        key.to_string(),
        price.to_string(),
        "0".to_string(),
        "0".to_string(),
        stock.to_string(),
        seller.to_string(),
        delivery.to_string(),
        "0".to_string(),
    ]
}

fn product_page(price: &str, stock: &str, seller: &str, delivery: &str) -> HashMap<String, String> {
    let config = ExtractorConfig::default();
    let mut fields = HashMap::new();
    fields.insert(config.price_selectors[0].clone(), price.to_string());
    fields.insert(config.stock_selectors[0].clone(), stock.to_string());
    fields.insert(config.seller_selectors[0].clone(), seller.to_string());
    fields.insert(config.delivery_selectors[0].clone(), delivery.to_string());
    fields
}

fn fast_gate_config() -> GateConfig {
    GateConfig {
        max_retries: 2,
        retry_delay_secs: 0,
        ..GateConfig::default()
    }
}

fn fast_extractor_config() -> ExtractorConfig {
    ExtractorConfig {
        attempts_per_strategy: 1,
        strategy_pause_ms: 0,
        max_retries: 2,
        ..ExtractorConfig::default()
    }
}

fn settings() -> RunSettings {
    RunSettings {
        base_url: "https://shop.example/dp/".to_string(),
        url_suffix: "".to_string(),
        max_concurrent: 2,
        batch_size: 10,
        source_concurrency: 1,
        policy: ChangePolicy::default(),
    }
}

fn source() -> RecordSource {
    RecordSource {
        id: "main".to_string(),
        name: "Main".to_string(),
        credential_ref: "main.json".to_string(),
    }
}

fn orchestrator(
    fetcher: StubFetcher,
    store: Arc<MemoryStore>,
    probe: Arc<dyn RegionProbe>,
) -> Orchestrator {
    let extractor = Extractor::new(fast_extractor_config(), Arc::new(fetcher));
    let gate = ConnectivityGate::new(probe, fast_gate_config());
    Orchestrator::new(
        Arc::new(extractor),
        store,
        gate,
        vec![source()],
        settings(),
    )
}

#[tokio::test]
async fn changed_rows_are_written_and_unchanged_rows_skipped() {
    let mut pages = HashMap::new();
    // B001 drops in price; B002 matches its stored row exactly.
    pages.insert(
        "https://shop.example/dp/B001".to_string(),
        product_page("$15.99", "In stock", "Acme", "FREE delivery"),
    );
    pages.insert(
        "https://shop.example/dp/B002".to_string(),
        product_page("$29.99", "In stock", "Acme", "FREE delivery"),
    );

    let store = Arc::new(MemoryStore::default());
    {
        let mut rows = store.rows.lock().expect("rows");
        rows.push(header());
        rows.push(row("B001", "19.99", "In Stock", "Acme", "FREE delivery"));
        rows.push(row("B002", "29.99", "In Stock", "Acme", "FREE delivery"));
    }

    let orch = orchestrator(
        StubFetcher { pages },
        Arc::clone(&store),
        Arc::new(OpenProbe),
    );
    let summary = orch.run_all().await.expect("run");

    assert_eq!(summary.items_checked, 2);
    assert_eq!(summary.rows_written, 1);

    let writes = store.writes.lock().expect("writes");
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].row, 2);
    assert_eq!(writes[0].values[0], "15.99");
    assert_eq!(writes[0].values[1], "1");
}

#[tokio::test]
async fn unreachable_pages_end_as_flagged_error_rows() {
    let store = Arc::new(MemoryStore::default());
    {
        let mut rows = store.rows.lock().expect("rows");
        rows.push(header());
        rows.push(row("B404", "19.99", "In Stock", "Acme", "FREE delivery"));
    }

    // No pages at all: every fetch fails until retries run out.
    let orch = orchestrator(
        StubFetcher { pages: HashMap::new() },
        Arc::clone(&store),
        Arc::new(OpenProbe),
    );
    let summary = orch.run_all().await.expect("run");
    assert_eq!(summary.rows_written, 1);

    let writes = store.writes.lock().expect("writes");
    assert_eq!(writes[0].values[0], "0");
    assert_eq!(writes[0].values[2], "1");
    assert_eq!(writes[0].values[3], "Out of Stock");
}

#[tokio::test]
async fn gate_failure_fails_the_source_without_scraping() {
    let store = Arc::new(MemoryStore::default());
    {
        let mut rows = store.rows.lock().expect("rows");
        rows.push(header());
        rows.push(row("B001", "19.99", "In Stock", "Acme", "FREE delivery"));
    }

    let orch = orchestrator(
        StubFetcher { pages: HashMap::new() },
        Arc::clone(&store),
        Arc::new(ClosedProbe),
    );
    let summary = orch.run_all().await.expect("run");

    assert_eq!(summary.sources_failed, 1);
    assert_eq!(summary.items_checked, 0);
    assert!(store.writes.lock().expect("writes").is_empty());
}

/// Fetcher with a per-URL delay, counting how many fetches have settled.
struct SlowFetcher {
    pages: HashMap<String, (u64, HashMap<String, String>)>,
    settled: Arc<std::sync::atomic::AtomicUsize>,
}

#[async_trait]
impl DocumentFetcher for SlowFetcher {
    async fn fetch(&self, url: &str, _proxy: Option<&Proxy>) -> Result<Box<dyn Document>> {
        let (delay_ms, fields) = self
            .pages
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("connection refused"))?;
        tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
        self.settled
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(Box::new(StubDocument { fields }))
    }
}

/// Store that records how many fetches had settled when each write landed.
struct BarrierStore {
    rows: Vec<Vec<String>>,
    settled: Arc<std::sync::atomic::AtomicUsize>,
    settled_at_write: Mutex<Vec<usize>>,
}

#[async_trait]
impl RecordStore for BarrierStore {
    async fn read_all(&self, _source: &RecordSource) -> Result<Vec<Vec<String>>, StoreError> {
        Ok(self.rows.clone())
    }

    async fn write_row(&self, _source: &RecordSource, _update: &RowUpdate) -> Result<(), StoreError> {
        self.settled_at_write
            .lock()
            .expect("writes")
            .push(self.settled.load(std::sync::atomic::Ordering::SeqCst));
        Ok(())
    }
}

#[tokio::test]
async fn no_row_is_written_until_the_whole_batch_settles() {
    let settled = Arc::new(std::sync::atomic::AtomicUsize::new(0));

    // Both rows change; the second page takes much longer to come back.
    let mut pages = HashMap::new();
    pages.insert(
        "https://shop.example/dp/B001".to_string(),
        (0, product_page("$15.99", "In stock", "Acme", "FREE delivery")),
    );
    pages.insert(
        "https://shop.example/dp/B002".to_string(),
        (400, product_page("$25.99", "In stock", "Acme", "FREE delivery")),
    );

    let store = Arc::new(BarrierStore {
        rows: vec![
            header(),
            row("B001", "19.99", "In Stock", "Acme", "FREE delivery"),
            row("B002", "29.99", "In Stock", "Acme", "FREE delivery"),
        ],
        settled: Arc::clone(&settled),
        settled_at_write: Mutex::new(Vec::new()),
    });

    let extractor = Extractor::new(
        fast_extractor_config(),
        Arc::new(SlowFetcher {
            pages,
            settled: Arc::clone(&settled),
        }),
    );
    let gate = ConnectivityGate::new(Arc::new(OpenProbe) as Arc<dyn RegionProbe>, fast_gate_config());
    let orch = Orchestrator::new(
        Arc::new(extractor),
        Arc::clone(&store) as Arc<dyn RecordStore>,
        gate,
        vec![source()],
        settings(),
    );

    let summary = orch.run_all().await.expect("run");
    assert_eq!(summary.rows_written, 2);

    // Every write must observe the full batch already fetched.
    let seen = store.settled_at_write.lock().expect("writes").clone();
    assert_eq!(seen, vec![2, 2]);
}

/// Probe that parks callers until permits are released, holding a run open
/// inside the gate.
struct ParkedProbe {
    release: tokio::sync::Semaphore,
}

#[async_trait]
impl RegionProbe for ParkedProbe {
    async fn is_connected(&self) -> bool {
        let _ = self.release.acquire().await;
        false
    }

    async fn egress_region(&self) -> Option<String> {
        None
    }
}

#[tokio::test]
async fn overlapping_runs_are_rejected_not_queued() {
    let store = Arc::new(MemoryStore::default());
    let probe = Arc::new(ParkedProbe {
        release: tokio::sync::Semaphore::new(0),
    });

    let extractor = Extractor::new(fast_extractor_config(), Arc::new(StubFetcher {
        pages: HashMap::new(),
    }));
    let gate = ConnectivityGate::new(
        Arc::clone(&probe) as Arc<dyn RegionProbe>,
        fast_gate_config(),
    );
    let orch = Arc::new(Orchestrator::new(
        Arc::new(extractor),
        store,
        gate,
        vec![source()],
        settings(),
    ));

    let first = tokio::spawn({
        let orch = Arc::clone(&orch);
        async move { orch.run_all().await }
    });
    while !orch.is_running() {
        tokio::task::yield_now().await;
    }

    assert!(matches!(orch.run_all().await, Err(RunError::AlreadyRunning)));

    probe.release.add_permits(8);
    let summary = first.await.expect("join").expect("run");
    assert_eq!(summary.sources_failed, 1);
    assert!(!orch.is_running());
}

/// Probe that tracks how many sources are inside the gate at once.
struct CountingProbe {
    active: std::sync::atomic::AtomicUsize,
    peak: std::sync::atomic::AtomicUsize,
}

#[async_trait]
impl RegionProbe for CountingProbe {
    async fn is_connected(&self) -> bool {
        use std::sync::atomic::Ordering;
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        true
    }

    async fn egress_region(&self) -> Option<String> {
        Some("US".to_string())
    }
}

#[tokio::test]
async fn sources_run_concurrently_up_to_the_bound() {
    let store = Arc::new(MemoryStore::default());
    store.rows.lock().expect("rows").push(header());

    let probe = Arc::new(CountingProbe {
        active: std::sync::atomic::AtomicUsize::new(0),
        peak: std::sync::atomic::AtomicUsize::new(0),
    });

    let sources = vec![
        RecordSource {
            id: "a".to_string(),
            name: "A".to_string(),
            credential_ref: "a.json".to_string(),
        },
        RecordSource {
            id: "b".to_string(),
            name: "B".to_string(),
            credential_ref: "b.json".to_string(),
        },
    ];
    let extractor = Extractor::new(fast_extractor_config(), Arc::new(StubFetcher {
        pages: HashMap::new(),
    }));
    let gate = ConnectivityGate::new(
        Arc::clone(&probe) as Arc<dyn RegionProbe>,
        fast_gate_config(),
    );
    let orch = Orchestrator::new(
        Arc::new(extractor),
        store,
        gate,
        sources,
        RunSettings {
            source_concurrency: 2,
            ..settings()
        },
    );

    let summary = orch.run_all().await.expect("run");
    assert_eq!(summary.sources_processed, 2);
    assert_eq!(probe.peak.load(std::sync::atomic::Ordering::SeqCst), 2);
}

#[tokio::test]
async fn unknown_source_id_is_rejected() {
    let store = Arc::new(MemoryStore::default());
    let orch = orchestrator(
        StubFetcher { pages: HashMap::new() },
        store,
        Arc::new(OpenProbe),
    );

    assert!(matches!(
        orch.run_one("nope").await,
        Err(RunError::UnknownSource(_))
    ));
}
