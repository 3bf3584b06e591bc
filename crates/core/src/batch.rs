//! Failure taxonomy and terminal outcome of one variation batch.

use serde::{Deserialize, Serialize};

use crate::progress::ProgressEvent;

/// Coarse class of a failed repetition; the only failure detail that is
/// ever reported back to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The request parameters are invalid for this particular input
    /// (for example a bar range past the end of the track). Deterministic.
    InvalidInput,
    /// Anything else: generator crash, transport or I/O failure.
    Internal,
}

impl FailureKind {
    /// The terminal event reported for a repetition failing this way.
    pub fn event(self, filename: impl Into<String>, job: u32) -> ProgressEvent {
        let filename = filename.into();
        match self {
            FailureKind::InvalidInput => ProgressEvent::InvalidInput { filename, job },
            FailureKind::Internal => ProgressEvent::JobFailed { filename, job },
        }
    }

    /// The batch outcome when repetition `job` fails this way.
    pub fn outcome(self, job: u32) -> BatchOutcome {
        match self {
            FailureKind::InvalidInput => BatchOutcome::InvalidInput { job },
            FailureKind::Internal => BatchOutcome::Failed { job },
        }
    }
}

/// How a batch ended. Produced by the job executor and recorded by the
/// queue when the batch is finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BatchOutcome {
    /// Every repetition succeeded.
    Completed { jobs: u32 },
    /// Repetition `job` was rejected because of the request parameters.
    InvalidInput { job: u32 },
    /// Repetition `job` failed for an internal reason.
    Failed { job: u32 },
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, BatchOutcome::Completed { .. })
    }

    /// Short label stored alongside the batch record.
    pub fn label(&self) -> &'static str {
        match self {
            BatchOutcome::Completed { .. } => "completed",
            BatchOutcome::InvalidInput { .. } => "invalid_input",
            BatchOutcome::Failed { .. } => "failed",
        }
    }

    /// Human-readable summary for the operational record, if the batch
    /// did not complete.
    pub fn failure_summary(&self) -> Option<String> {
        match self {
            BatchOutcome::Completed { .. } => None,
            BatchOutcome::InvalidInput { job } => {
                Some(format!("Invalid input detected at job {job}"))
            }
            BatchOutcome::Failed { job } => Some(format!("Job {job} failed")),
        }
    }
}
