//! Repository for the `variation_batches` table.
//!
//! Uses [`BatchStatus`] for every status transition; no status literals
//! appear in the SQL below.

use std::time::Duration;

use sqlx::PgPool;
use varia_core::batch::BatchOutcome;
use varia_core::types::{DbId, SessionId};

use crate::models::batch::VariationBatch;
use crate::models::status::BatchStatus;

/// Column list for `variation_batches` queries.
const COLUMNS: &str = "\
    id, status_id, session_id, user_id, request, claimed_by, attempts, outcome, \
    error_message, submitted_at, claimed_at, completed_at";

/// Outcome label for batches whose payload could not be decoded.
pub const OUTCOME_REJECTED: &str = "rejected";

/// Outcome label for batches that used up their claim attempts.
pub const OUTCOME_ABANDONED: &str = "abandoned";

/// Queue operations on variation batches.
pub struct BatchRepo;

impl BatchRepo {
    /// Insert a new pending batch carrying the serialised request.
    pub async fn enqueue(
        pool: &PgPool,
        session_id: &SessionId,
        user_id: DbId,
        request: &serde_json::Value,
    ) -> Result<VariationBatch, sqlx::Error> {
        let query = format!(
            "INSERT INTO variation_batches (status_id, session_id, user_id, request) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, VariationBatch>(&query)
            .bind(BatchStatus::Pending.id())
            .bind(session_id.as_str())
            .bind(user_id)
            .bind(request)
            .fetch_one(pool)
            .await
    }

    /// Atomically claim the oldest claimable batch for a worker.
    ///
    /// A batch is claimable while pending, or while running under a claim
    /// older than `lease`, as long as it has been claimed fewer than
    /// `max_attempts` times. Uses `SELECT FOR UPDATE SKIP LOCKED` so
    /// concurrent workers never claim the same batch.
    pub async fn claim_next(
        pool: &PgPool,
        worker: &str,
        lease: Duration,
        max_attempts: i32,
    ) -> Result<Option<VariationBatch>, sqlx::Error> {
        let query = format!(
            "UPDATE variation_batches \
             SET status_id = $1, claimed_by = $2, claimed_at = NOW(), attempts = attempts + 1 \
             WHERE id = ( \
                 SELECT id FROM variation_batches \
                 WHERE (status_id = $3 \
                        OR (status_id = $1 AND claimed_at < NOW() - make_interval(secs => $4))) \
                   AND attempts < $5 \
                 ORDER BY submitted_at ASC, id ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, VariationBatch>(&query)
            .bind(BatchStatus::Running.id())
            .bind(worker)
            .bind(BatchStatus::Pending.id())
            .bind(lease.as_secs_f64())
            .bind(max_attempts)
            .fetch_optional(pool)
            .await
    }

    /// Return a worker's running batches to the pending state.
    ///
    /// Called when a worker starts, so batches it held before a restart
    /// under the same name do not wait for their lease to expire.
    pub async fn release_claims(pool: &PgPool, worker: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE variation_batches \
             SET status_id = $1, claimed_by = NULL, claimed_at = NULL \
             WHERE status_id = $2 AND claimed_by = $3",
        )
        .bind(BatchStatus::Pending.id())
        .bind(BatchStatus::Running.id())
        .bind(worker)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Fail batches that can no longer be claimed because every attempt
    /// has been used: pending ones, and running ones past their lease.
    pub async fn fail_exhausted(
        pool: &PgPool,
        lease: Duration,
        max_attempts: i32,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE variation_batches \
             SET status_id = $1, outcome = $2, error_message = $3, completed_at = NOW() \
             WHERE attempts >= $4 \
               AND (status_id = $5 \
                    OR (status_id = $6 AND claimed_at < NOW() - make_interval(secs => $7)))",
        )
        .bind(BatchStatus::Failed.id())
        .bind(OUTCOME_ABANDONED)
        .bind(format!("Batch was not finished after {max_attempts} claims"))
        .bind(max_attempts)
        .bind(BatchStatus::Pending.id())
        .bind(BatchStatus::Running.id())
        .bind(lease.as_secs_f64())
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Record how a claimed batch ended.
    pub async fn finish(
        pool: &PgPool,
        batch_id: DbId,
        outcome: &BatchOutcome,
    ) -> Result<(), sqlx::Error> {
        let status = if outcome.is_success() {
            BatchStatus::Completed
        } else {
            BatchStatus::Failed
        };

        sqlx::query(
            "UPDATE variation_batches \
             SET status_id = $2, outcome = $3, error_message = $4, completed_at = NOW() \
             WHERE id = $1",
        )
        .bind(batch_id)
        .bind(status.id())
        .bind(outcome.label())
        .bind(outcome.failure_summary())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Mark a claimed batch whose stored request cannot be decoded as failed.
    pub async fn reject(pool: &PgPool, batch_id: DbId, reason: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE variation_batches \
             SET status_id = $2, outcome = $3, error_message = $4, completed_at = NOW() \
             WHERE id = $1",
        )
        .bind(batch_id)
        .bind(BatchStatus::Failed.id())
        .bind(OUTCOME_REJECTED)
        .bind(reason)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Find a batch by its ID.
    pub async fn find_by_id(
        pool: &PgPool,
        batch_id: DbId,
    ) -> Result<Option<VariationBatch>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM variation_batches WHERE id = $1");
        sqlx::query_as::<_, VariationBatch>(&query)
            .bind(batch_id)
            .fetch_optional(pool)
            .await
    }
}
