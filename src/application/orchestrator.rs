//! Run coordination across record sources.
//!
//! One run walks every configured source: gate check, read the stored rows,
//! scrape each item through the bounded scheduler, then write back only the
//! rows change detection flagged. At most one run is active at a time;
//! overlapping starts are rejected, never queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::diff::{plan_update, ChangePolicy};
use super::scheduler::Scheduler;
use crate::domain::RecordSource;
use crate::infrastructure::extractor::Extractor;
use crate::infrastructure::gate::ConnectivityGate;
use crate::infrastructure::parsing::normalize;
use crate::infrastructure::record_store::{RecordStore, ResolvedSchema, StoreError};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("a run is already in progress")]
    AlreadyRunning,
    #[error("connectivity gate failed for source '{0}'")]
    GateFailed(String),
    #[error("no source with id '{0}'")]
    UnknownSource(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Tally of one run, per source contributions summed.
#[derive(Debug, Default, Clone, Copy)]
pub struct RunSummary {
    pub sources_processed: usize,
    pub sources_failed: usize,
    pub items_checked: usize,
    pub rows_written: usize,
}

/// Addressing knobs the orchestrator needs from configuration.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub base_url: String,
    pub url_suffix: String,
    pub max_concurrent: usize,
    pub batch_size: usize,
    /// Record sources processed at once within a run.
    pub source_concurrency: usize,
    pub policy: ChangePolicy,
}

pub struct Orchestrator {
    extractor: Arc<Extractor>,
    store: Arc<dyn RecordStore>,
    gate: ConnectivityGate,
    sources: Vec<RecordSource>,
    settings: RunSettings,
    running: AtomicBool,
}

/// Clears the active flag when a run ends, normally or by early return.
struct RunGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

impl Orchestrator {
    pub fn new(
        extractor: Arc<Extractor>,
        store: Arc<dyn RecordStore>,
        gate: ConnectivityGate,
        sources: Vec<RecordSource>,
        settings: RunSettings,
    ) -> Self {
        Self {
            extractor,
            store,
            gate,
            sources,
            settings,
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn acquire(&self) -> Result<RunGuard<'_>, RunError> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| RunError::AlreadyRunning)?;
        Ok(RunGuard { flag: &self.running })
    }

    /// Process every configured source, at most `source_concurrency` at a
    /// time. A source that fails is logged and skipped; the run carries on
    /// with the rest.
    pub async fn run_all(&self) -> Result<RunSummary, RunError> {
        let _guard = self.acquire()?;
        let mut summary = RunSummary::default();

        let jobs: Vec<_> = self
            .sources
            .iter()
            .map(|source| async move { (source, self.run_source(source).await) })
            .collect();
        let results: Vec<_> = stream::iter(jobs)
            .buffer_unordered(self.settings.source_concurrency.max(1))
            .collect()
            .await;

        for (source, result) in results {
            match result {
                Ok(partial) => {
                    summary.sources_processed += 1;
                    summary.items_checked += partial.items_checked;
                    summary.rows_written += partial.rows_written;
                }
                Err(err) => {
                    summary.sources_failed += 1;
                    error!(source = %source.name, %err, "source run failed");
                }
            }
        }

        info!(
            processed = summary.sources_processed,
            failed = summary.sources_failed,
            checked = summary.items_checked,
            written = summary.rows_written,
            "run complete"
        );
        Ok(summary)
    }

    /// Process a single source by id.
    pub async fn run_one(&self, source_id: &str) -> Result<RunSummary, RunError> {
        let source = self
            .sources
            .iter()
            .find(|s| s.id == source_id)
            .cloned()
            .ok_or_else(|| RunError::UnknownSource(source_id.to_string()))?;

        let _guard = self.acquire()?;
        let partial = self.run_source(&source).await?;
        Ok(RunSummary {
            sources_processed: 1,
            ..partial
        })
    }

    async fn run_source(&self, source: &RecordSource) -> Result<RunSummary, RunError> {
        info!(source = %source.name, "starting source run");

        if !self.gate.ensure_ready().await {
            return Err(RunError::GateFailed(source.name.clone()));
        }

        let rows = self.store.read_all(source).await?;
        let Some((header, data)) = rows.split_first() else {
            warn!(source = %source.name, "source range is empty");
            return Ok(RunSummary::default());
        };
        let schema = ResolvedSchema::resolve(header)?;

        let items: Vec<_> = data
            .iter()
            .enumerate()
            // Data starts on row 2; the header occupies row 1.
            .map(|(offset, cells)| schema.item(cells, offset + 2))
            .filter(|item| !item.key.trim().is_empty())
            .collect();
        info!(source = %source.name, items = items.len(), "tracking items loaded");

        let scheduler = Scheduler::new(self.settings.max_concurrent);
        let mut summary = RunSummary::default();

        for batch in items.chunks(self.settings.batch_size) {
            let mut handles = Vec::with_capacity(batch.len());
            for item in batch {
                let extractor = Arc::clone(&self.extractor);
                let url = format!(
                    "{}{}{}",
                    self.settings.base_url, item.key, self.settings.url_suffix
                );
                handles.push(scheduler.submit(async move {
                    let raw = extractor.scrape_with_retry(&url).await;
                    normalize(&raw, Utc::now().date_naive())
                }));
            }

            // Batch barrier: every job settles before any row is written.
            let mut settled = Vec::with_capacity(batch.len());
            for (item, handle) in batch.iter().zip(handles) {
                summary.items_checked += 1;
                match handle.join().await {
                    Ok(fresh) => settled.push((item, fresh)),
                    Err(err) => warn!(key = %item.key, %err, "extraction job aborted"),
                }
            }

            for (item, fresh) in settled {
                let Some(update) = plan_update(item, &fresh, &schema, &self.settings.policy)
                else {
                    continue;
                };
                debug!(key = %item.key, range = %update.a1_range(&source.name), "writing row");
                match self.store.write_row(source, &update).await {
                    Ok(()) => summary.rows_written += 1,
                    Err(err) => {
                        warn!(key = %item.key, row = update.row, %err, "row write failed")
                    }
                }
            }
        }

        info!(
            source = %source.name,
            checked = summary.items_checked,
            written = summary.rows_written,
            "source run complete"
        );
        Ok(summary)
    }
}
