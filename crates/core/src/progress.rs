//! Progress event protocol for variation batches.
//!
//! Events are serialised as JSON objects tagged by `"type"` and delivered
//! to the browser session that submitted the batch. Only the coarse event
//! kind, the output filename and the 1-based job index ever cross this
//! boundary; failure details stay in the server log.

use serde::{Deserialize, Serialize};

use crate::types::SessionId;

/// Wire tag of a successfully finished repetition.
pub const MSG_TYPE_JOB_COMPLETE: &str = "job_complete";

/// Wire tag sent once every repetition of a batch has finished.
pub const MSG_TYPE_BATCH_COMPLETE: &str = "processing_complete";

/// Wire tag of a repetition rejected because of the request parameters.
pub const MSG_TYPE_INVALID_INPUT: &str = "invalid_input";

/// Wire tag of a repetition that failed for any other reason.
pub const MSG_TYPE_JOB_FAILED: &str = "job_failed";

/// Wire tag of the hello frame telling a new connection its session id.
pub const MSG_TYPE_SESSION: &str = "session";

/// A progress notification for one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProgressEvent {
    #[serde(rename = "job_complete")]
    JobComplete { filename: String, job: u32 },

    #[serde(rename = "processing_complete")]
    BatchComplete { filename: String },

    #[serde(rename = "invalid_input")]
    InvalidInput { filename: String, job: u32 },

    #[serde(rename = "job_failed")]
    JobFailed { filename: String, job: u32 },
}

impl ProgressEvent {
    /// The wire tag of this event.
    pub fn kind(&self) -> &'static str {
        match self {
            ProgressEvent::JobComplete { .. } => MSG_TYPE_JOB_COMPLETE,
            ProgressEvent::BatchComplete { .. } => MSG_TYPE_BATCH_COMPLETE,
            ProgressEvent::InvalidInput { .. } => MSG_TYPE_INVALID_INPUT,
            ProgressEvent::JobFailed { .. } => MSG_TYPE_JOB_FAILED,
        }
    }

    pub fn filename(&self) -> &str {
        match self {
            ProgressEvent::JobComplete { filename, .. }
            | ProgressEvent::BatchComplete { filename }
            | ProgressEvent::InvalidInput { filename, .. }
            | ProgressEvent::JobFailed { filename, .. } => filename,
        }
    }

    /// The 1-based repetition this event refers to, if any.
    pub fn job(&self) -> Option<u32> {
        match self {
            ProgressEvent::JobComplete { job, .. }
            | ProgressEvent::InvalidInput { job, .. }
            | ProgressEvent::JobFailed { job, .. } => Some(*job),
            ProgressEvent::BatchComplete { .. } => None,
        }
    }

    /// Whether this event ends its batch.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProgressEvent::JobComplete { .. })
    }
}

/// A [`ProgressEvent`] addressed to a session, as carried between processes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub session_id: SessionId,
    pub event: ProgressEvent,
}

impl SessionEvent {
    pub fn new(session_id: SessionId, event: ProgressEvent) -> Self {
        Self { session_id, event }
    }
}

/// Build the hello frame sent when a live connection is established.
pub fn session_hello(session_id: &SessionId) -> serde_json::Value {
    serde_json::json!({
        "type": MSG_TYPE_SESSION,
        "sid": session_id,
    })
}
