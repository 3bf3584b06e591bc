//! Variation batch rows.

use serde::Serialize;
use sqlx::FromRow;
use varia_core::types::{DbId, Timestamp};

use super::status::StatusId;

/// A row from the `variation_batches` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct VariationBatch {
    pub id: DbId,
    pub status_id: StatusId,
    pub session_id: String,
    pub user_id: DbId,
    /// Serialised `VariationRequest`.
    pub request: serde_json::Value,
    pub claimed_by: Option<String>,
    /// How many times the batch has been claimed.
    pub attempts: i32,
    pub outcome: Option<String>,
    pub error_message: Option<String>,
    pub submitted_at: Timestamp,
    pub claimed_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
}
