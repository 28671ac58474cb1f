//! Bounded-concurrency job scheduler.
//!
//! Jobs are admitted strictly in submission order and at most
//! `max_concurrent` run at once. Each finished job frees a slot and pulls
//! the next pending one, so the pool stays full whenever work is queued.
//! A panicking job only poisons its own [`JobHandle`]; the slot is still
//! reclaimed and the queue keeps draining.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::BoxFuture;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::debug;

#[derive(Debug, Error)]
pub enum JobError {
    /// The job panicked or was dropped before producing a result.
    #[error("job terminated without a result")]
    Aborted,
}

/// Await side of a submitted job.
pub struct JobHandle<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> JobHandle<T> {
    pub async fn join(self) -> Result<T, JobError> {
        self.rx.await.map_err(|_| JobError::Aborted)
    }
}

struct SlotGuard {
    scheduler: Arc<Scheduler>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.scheduler.release_slot();
    }
}

struct Inner {
    pending: VecDeque<BoxFuture<'static, ()>>,
    running: usize,
}

pub struct Scheduler {
    inner: Mutex<Inner>,
    max_concurrent: usize,
}

impl Scheduler {
    pub fn new(max_concurrent: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner {
                pending: VecDeque::new(),
                running: 0,
            }),
            max_concurrent: max_concurrent.max(1),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a job. It starts immediately if a slot is free, otherwise it
    /// waits its turn behind earlier submissions.
    pub fn submit<F, T>(self: &Arc<Self>, job: F) -> JobHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let wrapped: BoxFuture<'static, ()> = Box::pin(async move {
            let _ = tx.send(job.await);
        });

        self.lock().pending.push_back(wrapped);
        self.try_admit();

        JobHandle { rx }
    }

    /// Start queued jobs until the pool is full or the queue is empty.
    fn try_admit(self: &Arc<Self>) {
        loop {
            let job = {
                let mut inner = self.lock();
                if inner.running >= self.max_concurrent {
                    return;
                }
                match inner.pending.pop_front() {
                    Some(job) => {
                        inner.running += 1;
                        job
                    }
                    None => return,
                }
            };

            let scheduler = Arc::clone(self);
            tokio::spawn(async move {
                // Releases the slot even if the job panics.
                let _slot = SlotGuard { scheduler };
                job.await;
            });
        }
    }

    fn release_slot(self: &Arc<Self>) {
        let (running, queued) = {
            let mut inner = self.lock();
            inner.running -= 1;
            (inner.running, inner.pending.len())
        };
        debug!(running, queued, "job slot released");
        self.try_admit();
    }

    /// Jobs currently executing.
    pub fn running(&self) -> usize {
        self.lock().running
    }

    /// Jobs waiting for a slot.
    pub fn queued(&self) -> usize {
        self.lock().pending.len()
    }
}
