//! Queue-consuming worker loop.
//!
//! Polls the [`BatchQueue`] every `poll_interval`, draining all pending
//! batches one after another before waiting for the next tick. On start
//! the runner releases any batches still claimed under its name.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use varia_core::batch::BatchOutcome;
use varia_core::types::DbId;
use varia_db::queue::{BatchQueue, QueueError};

use crate::executor::JobExecutor;

/// Default polling interval for the runner loop.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Attempts at recording a batch outcome before leaving the batch to be
/// reclaimed.
pub const FINISH_ATTEMPTS: u32 = 3;

/// Delay before the first retry of a failed finish; doubles each retry.
pub const FINISH_RETRY_DELAY: Duration = Duration::from_millis(100);

/// A single long-lived task that executes one batch at a time.
pub struct WorkerRunner {
    name: String,
    queue: Arc<dyn BatchQueue>,
    executor: JobExecutor,
    poll_interval: Duration,
}

impl WorkerRunner {
    pub fn new(name: impl Into<String>, queue: Arc<dyn BatchQueue>, executor: JobExecutor) -> Self {
        Self {
            name: name.into(),
            queue,
            executor,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run until the cancellation token is triggered.
    ///
    /// Cancellation is only observed between batches; a batch that has
    /// been claimed always runs to completion.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        tracing::info!(
            worker = %self.name,
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Worker runner started",
        );

        match self.queue.release(&self.name).await {
            Ok(0) => {}
            Ok(released) => {
                tracing::warn!(worker = %self.name, released, "Released batches from a previous run");
            }
            Err(e) => {
                tracing::error!(worker = %self.name, error = %e, "Failed to release previous claims");
            }
        }

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(worker = %self.name, "Worker runner shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.drain(&cancel).await {
                        tracing::error!(worker = %self.name, error = %e, "Worker poll cycle failed");
                    }
                }
            }
        }
    }

    /// Claim and execute batches until the queue is empty or shutdown begins.
    async fn drain(&self, cancel: &CancellationToken) -> Result<(), QueueError> {
        while !cancel.is_cancelled() {
            if !self.run_once().await? {
                break;
            }
        }
        Ok(())
    }

    /// Claim and execute at most one batch. Returns whether one was found.
    pub async fn run_once(&self) -> Result<bool, QueueError> {
        let Some(batch) = self.queue.claim(&self.name).await? else {
            return Ok(false);
        };

        tracing::info!(
            worker = %self.name,
            batch_id = batch.batch_id,
            session_id = %batch.request.session_id,
            jobs = batch.request.jobs,
            "Batch claimed",
        );

        let outcome = self.executor.run(&batch.request).await;
        self.finish(batch.batch_id, &outcome).await?;

        tracing::info!(
            worker = %self.name,
            batch_id = batch.batch_id,
            outcome = outcome.label(),
            "Batch finished",
        );
        Ok(true)
    }

    /// Record the outcome, retrying transient queue errors. If every
    /// attempt fails the batch stays claimed and is delivered again later.
    async fn finish(&self, batch_id: DbId, outcome: &BatchOutcome) -> Result<(), QueueError> {
        let mut delay = FINISH_RETRY_DELAY;
        let mut attempt = 1;
        loop {
            match self.queue.finish(batch_id, outcome).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < FINISH_ATTEMPTS => {
                    tracing::warn!(
                        worker = %self.name,
                        batch_id,
                        attempt,
                        error = %e,
                        "Failed to record batch outcome, retrying",
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
