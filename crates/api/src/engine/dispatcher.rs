//! Upload-triggered batch submission.
//!
//! [`VariationDispatcher::dispatch`] validates the upload, persists the
//! input under the user's namespace, builds the [`VariationRequest`] and
//! hands it to the [`BatchQueue`]. It returns as soon as the batch is
//! queued; execution and progress reporting happen asynchronously.

use std::sync::Arc;

use axum::body::Bytes;
use serde::Serialize;
use varia_core::error::CoreError;
use varia_core::request::{RequestOrigin, VariationForm, VariationRequest};
use varia_core::storage::{sanitize_filename, StorageLayout};
use varia_core::types::{DbId, SessionId};
use varia_db::queue::BatchQueue;

use crate::error::{AppError, AppResult};

/// Error message when the multipart body has no `file` part.
pub const MSG_NO_FILE_PART: &str = "No file part";

/// Error message when the `file` part has an empty filename.
pub const MSG_NO_SELECTED_FILE: &str = "No selected file";

/// An uploaded file as received from the client.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Client-supplied filename, not yet sanitised.
    pub filename: String,
    pub data: Bytes,
}

/// Everything an upload request carries.
#[derive(Debug, Clone)]
pub struct Submission {
    pub user_id: DbId,
    pub session_id: SessionId,
    /// `None` when the request had no `file` part.
    pub file: Option<UploadedFile>,
    pub form: VariationForm,
}

/// Acknowledgement of a queued batch.
#[derive(Debug, Clone, Serialize)]
pub struct Accepted {
    /// Sanitised filename the progress events will refer to.
    pub filename: String,
    pub batch_id: DbId,
}

/// Accepts uploads and submits them for asynchronous processing.
pub struct VariationDispatcher {
    queue: Arc<dyn BatchQueue>,
    storage: StorageLayout,
}

impl VariationDispatcher {
    pub fn new(queue: Arc<dyn BatchQueue>, storage: StorageLayout) -> Self {
        Self { queue, storage }
    }

    /// Validate, persist and enqueue one upload.
    ///
    /// A missing or unnamed file and any invalid form field are rejected
    /// before anything is written or queued. The user's upload directory
    /// must already exist.
    pub async fn dispatch(&self, submission: Submission) -> AppResult<Accepted> {
        let file = submission
            .file
            .ok_or_else(|| AppError::BadRequest(MSG_NO_FILE_PART.into()))?;
        if file.filename.is_empty() {
            return Err(AppError::BadRequest(MSG_NO_SELECTED_FILE.into()));
        }

        let filename = sanitize_filename(&file.filename).ok_or_else(|| {
            AppError::Core(CoreError::Validation(format!(
                "Unusable filename '{}'",
                file.filename
            )))
        })?;

        let request = VariationRequest::from_form(
            submission.form,
            RequestOrigin {
                input_path: self.storage.upload_path(submission.user_id, &filename),
                output_name: filename.clone(),
                session_id: submission.session_id,
                user_id: submission.user_id,
            },
        )?;

        tokio::fs::write(&request.input_path, &file.data)
            .await
            .map_err(|e| {
                AppError::InternalError(format!(
                    "Failed to store upload {}: {e}",
                    request.input_path.display()
                ))
            })?;

        let ticket = self.queue.submit(&request).await?;

        tracing::info!(
            batch_id = ticket.batch_id,
            user_id = request.user_id,
            session_id = %request.session_id,
            filename = %filename,
            jobs = request.jobs,
            bytes = file.data.len(),
            "Upload accepted for processing",
        );

        Ok(Accepted {
            filename,
            batch_id: ticket.batch_id,
        })
    }
}
