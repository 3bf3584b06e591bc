//! The job-submission boundary between the serving layer and workers.
//!
//! A [`VariationRequest`] is serialised to JSON on [`BatchQueue::submit`]
//! and decoded again on [`BatchQueue::claim`], so both implementations
//! exercise the same exact-round-trip contract.
//!
//! Delivery is at-least-once: a batch claimed by a worker that never
//! finishes it becomes claimable again, either when that worker releases
//! its claims on restart or, for the Postgres queue, when the claim's
//! lease expires. Executors must therefore tolerate re-running a batch.

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Mutex;
use varia_core::batch::BatchOutcome;
use varia_core::request::VariationRequest;
use varia_core::types::DbId;

use crate::repositories::BatchRepo;
use crate::DbPool;

/// How long a claim stays exclusive before the batch may be reclaimed.
/// Must exceed the longest expected batch run.
pub const DEFAULT_CLAIM_LEASE: Duration = Duration::from_secs(30 * 60);

/// Claims allowed per batch before it is failed as abandoned.
pub const DEFAULT_MAX_ATTEMPTS: i32 = 3;

/// Finished outcomes kept by [`MemoryBatchQueue`] for inspection.
pub const MEMORY_OUTCOME_RETENTION: usize = 256;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Acknowledgement returned to the submitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchTicket {
    pub batch_id: DbId,
}

/// A batch handed to a worker for execution.
#[derive(Debug, Clone)]
pub struct ClaimedBatch {
    pub batch_id: DbId,
    pub request: VariationRequest,
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Batch payload could not be encoded or decoded: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Durable hand-off of variation batches to workers.
#[async_trait]
pub trait BatchQueue: Send + Sync {
    /// Enqueue a request for asynchronous processing.
    async fn submit(&self, request: &VariationRequest) -> Result<BatchTicket, QueueError>;

    /// Take the oldest pending batch, if any, on behalf of `worker`.
    async fn claim(&self, worker: &str) -> Result<Option<ClaimedBatch>, QueueError>;

    /// Record how a claimed batch ended.
    async fn finish(&self, batch_id: DbId, outcome: &BatchOutcome) -> Result<(), QueueError>;

    /// Return every unfinished batch claimed by `worker` to the queue.
    /// Returns how many batches were released.
    async fn release(&self, worker: &str) -> Result<u64, QueueError>;
}

// ---------------------------------------------------------------------------
// Postgres
// ---------------------------------------------------------------------------

/// Queue backed by the `variation_batches` table; safe across processes.
pub struct PgBatchQueue {
    pool: DbPool,
    lease: Duration,
    max_attempts: i32,
}

impl PgBatchQueue {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            lease: DEFAULT_CLAIM_LEASE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: i32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }
}

#[async_trait]
impl BatchQueue for PgBatchQueue {
    async fn submit(&self, request: &VariationRequest) -> Result<BatchTicket, QueueError> {
        let payload = serde_json::to_value(request)?;
        let batch =
            BatchRepo::enqueue(&self.pool, &request.session_id, request.user_id, &payload).await?;
        tracing::info!(
            batch_id = batch.id,
            user_id = request.user_id,
            jobs = request.jobs,
            "Variation batch enqueued",
        );
        Ok(BatchTicket { batch_id: batch.id })
    }

    async fn claim(&self, worker: &str) -> Result<Option<ClaimedBatch>, QueueError> {
        let abandoned = BatchRepo::fail_exhausted(&self.pool, self.lease, self.max_attempts).await?;
        if abandoned > 0 {
            tracing::warn!(
                count = abandoned,
                max_attempts = self.max_attempts,
                "Failed batches that were never finished",
            );
        }

        let Some(batch) =
            BatchRepo::claim_next(&self.pool, worker, self.lease, self.max_attempts).await?
        else {
            return Ok(None);
        };

        if batch.attempts > 1 {
            tracing::warn!(
                batch_id = batch.id,
                worker,
                attempts = batch.attempts,
                "Reclaimed batch after an unfinished claim",
            );
        }

        match serde_json::from_value::<VariationRequest>(batch.request) {
            Ok(request) => Ok(Some(ClaimedBatch {
                batch_id: batch.id,
                request,
            })),
            Err(e) => {
                tracing::error!(batch_id = batch.id, error = %e, "Stored batch request is undecodable");
                BatchRepo::reject(&self.pool, batch.id, &e.to_string()).await?;
                Err(QueueError::Payload(e))
            }
        }
    }

    async fn finish(&self, batch_id: DbId, outcome: &BatchOutcome) -> Result<(), QueueError> {
        BatchRepo::finish(&self.pool, batch_id, outcome).await?;
        Ok(())
    }

    async fn release(&self, worker: &str) -> Result<u64, QueueError> {
        Ok(BatchRepo::release_claims(&self.pool, worker).await?)
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

struct MemoryBatch {
    id: DbId,
    payload: String,
}

#[derive(Default)]
struct MemoryState {
    next_id: DbId,
    pending: VecDeque<MemoryBatch>,
    /// Claimed, unfinished batches by id, with the claiming worker.
    running: BTreeMap<DbId, (String, MemoryBatch)>,
    /// Most recent outcomes, oldest first, capped at
    /// [`MEMORY_OUTCOME_RETENTION`].
    outcomes: VecDeque<(DbId, BatchOutcome)>,
}

/// In-process FIFO queue for single-process deployments and tests.
///
/// Batches do not survive a restart. Only the most recent
/// [`MEMORY_OUTCOME_RETENTION`] outcomes are kept.
#[derive(Default)]
pub struct MemoryBatchQueue {
    state: Mutex<MemoryState>,
}

impl MemoryBatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of batches waiting to be claimed.
    pub async fn pending_len(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    /// Number of claimed batches not yet finished.
    pub async fn running_len(&self) -> usize {
        self.state.lock().await.running.len()
    }

    /// Recorded outcome of a recently finished batch.
    pub async fn outcome(&self, batch_id: DbId) -> Option<BatchOutcome> {
        self.state
            .lock()
            .await
            .outcomes
            .iter()
            .find(|(id, _)| *id == batch_id)
            .map(|(_, outcome)| *outcome)
    }
}

#[async_trait]
impl BatchQueue for MemoryBatchQueue {
    async fn submit(&self, request: &VariationRequest) -> Result<BatchTicket, QueueError> {
        let payload = serde_json::to_string(request)?;
        let mut state = self.state.lock().await;
        state.next_id += 1;
        let batch_id = state.next_id;
        state.pending.push_back(MemoryBatch {
            id: batch_id,
            payload,
        });
        tracing::debug!(batch_id, jobs = request.jobs, "Variation batch queued in memory");
        Ok(BatchTicket { batch_id })
    }

    async fn claim(&self, worker: &str) -> Result<Option<ClaimedBatch>, QueueError> {
        let mut state = self.state.lock().await;
        let Some(batch) = state.pending.pop_front() else {
            return Ok(None);
        };
        let batch_id = batch.id;
        let decoded = serde_json::from_str::<VariationRequest>(&batch.payload);
        match decoded {
            Ok(request) => {
                state.running.insert(batch_id, (worker.to_string(), batch));
                tracing::debug!(batch_id, worker, "Variation batch claimed");
                Ok(Some(ClaimedBatch { batch_id, request }))
            }
            Err(e) => {
                tracing::error!(batch_id, error = %e, "Queued batch request is undecodable");
                Err(QueueError::Payload(e))
            }
        }
    }

    async fn finish(&self, batch_id: DbId, outcome: &BatchOutcome) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        state.running.remove(&batch_id);
        state.outcomes.push_back((batch_id, *outcome));
        while state.outcomes.len() > MEMORY_OUTCOME_RETENTION {
            state.outcomes.pop_front();
        }
        Ok(())
    }

    async fn release(&self, worker: &str) -> Result<u64, QueueError> {
        let mut state = self.state.lock().await;
        let held: Vec<DbId> = state
            .running
            .iter()
            .filter(|(_, (owner, _))| owner == worker)
            .map(|(id, _)| *id)
            .collect();

        // Re-queue ahead of newer work, oldest first.
        for id in held.iter().rev() {
            if let Some((_, batch)) = state.running.remove(id) {
                state.pending.push_front(batch);
            }
        }
        Ok(held.len() as u64)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use varia_core::request::{RequestOrigin, VariationForm};
    use varia_core::types::SessionId;

    use super::*;

    fn request(name: &str) -> VariationRequest {
        VariationRequest::from_form(
            VariationForm {
                attribute_flags: vec!["true".into()],
                entire_track: Some("true".into()),
                jobs: Some(3),
                ..Default::default()
            },
            RequestOrigin {
                input_path: PathBuf::from(format!("uploads/1/{name}")),
                output_name: name.to_string(),
                session_id: SessionId::new("sid"),
                user_id: 1,
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn claims_in_submission_order() {
        let queue = MemoryBatchQueue::new();
        let first = queue.submit(&request("a.mid")).await.unwrap();
        let second = queue.submit(&request("b.mid")).await.unwrap();
        assert_ne!(first, second);
        assert_eq!(queue.pending_len().await, 2);

        let claimed = queue.claim("w1").await.unwrap().unwrap();
        assert_eq!(claimed.batch_id, first.batch_id);
        assert_eq!(claimed.request, request("a.mid"));

        let claimed = queue.claim("w2").await.unwrap().unwrap();
        assert_eq!(claimed.batch_id, second.batch_id);

        assert!(queue.claim("w1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn release_requeues_only_that_workers_claims() {
        let queue = MemoryBatchQueue::new();
        let first = queue.submit(&request("a.mid")).await.unwrap();
        let second = queue.submit(&request("b.mid")).await.unwrap();
        let third = queue.submit(&request("c.mid")).await.unwrap();

        queue.claim("w1").await.unwrap().unwrap();
        queue.claim("w2").await.unwrap().unwrap();
        assert_eq!(queue.running_len().await, 2);

        assert_eq!(queue.release("w1").await.unwrap(), 1);
        assert_eq!(queue.running_len().await, 1);

        let reclaimed = queue.claim("w3").await.unwrap().unwrap();
        assert_eq!(reclaimed.batch_id, first.batch_id);
        let next = queue.claim("w3").await.unwrap().unwrap();
        assert_eq!(next.batch_id, third.batch_id);
        assert_ne!(next.batch_id, second.batch_id);
    }

    #[tokio::test]
    async fn retained_outcomes_are_bounded() {
        let queue = MemoryBatchQueue::new();
        let mut ids = Vec::new();
        for _ in 0..MEMORY_OUTCOME_RETENTION + 10 {
            let ticket = queue.submit(&request("a.mid")).await.unwrap();
            let claimed = queue.claim("w1").await.unwrap().unwrap();
            queue
                .finish(claimed.batch_id, &BatchOutcome::Completed { jobs: 3 })
                .await
                .unwrap();
            ids.push(ticket.batch_id);
        }

        assert_eq!(queue.state.lock().await.outcomes.len(), MEMORY_OUTCOME_RETENTION);
        assert_eq!(queue.outcome(ids[0]).await, None);
        assert_eq!(
            queue.outcome(*ids.last().unwrap()).await,
            Some(BatchOutcome::Completed { jobs: 3 })
        );
        assert_eq!(queue.running_len().await, 0);
    }

    #[tokio::test]
    async fn finish_records_outcome() {
        let queue = MemoryBatchQueue::new();
        let ticket = queue.submit(&request("a.mid")).await.unwrap();
        let claimed = queue.claim("w1").await.unwrap().unwrap();

        queue
            .finish(claimed.batch_id, &BatchOutcome::InvalidInput { job: 2 })
            .await
            .unwrap();

        assert_eq!(
            queue.outcome(ticket.batch_id).await,
            Some(BatchOutcome::InvalidInput { job: 2 })
        );
    }
}
