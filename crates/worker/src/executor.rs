//! The per-batch job loop.
//!
//! Repetitions run strictly in order. The first failure of either class
//! publishes its terminal event and ends the batch; only a batch whose
//! every repetition succeeded publishes `processing_complete`.

use std::io;
use std::path::{Path, PathBuf};

use varia_core::batch::{BatchOutcome, FailureKind};
use varia_core::progress::ProgressEvent;
use varia_core::request::VariationRequest;
use varia_generator::{GenerationParams, GeneratorError};

use crate::context::WorkerContext;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a single repetition failed.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error(transparent)]
    Generation(#[from] GeneratorError),

    #[error("Failed to write variation to {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl JobError {
    pub fn kind(&self) -> FailureKind {
        match self {
            JobError::Generation(e) => e.kind(),
            JobError::Persist { .. } => FailureKind::Internal,
        }
    }
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

/// Runs one batch at a time against the shared [`WorkerContext`].
#[derive(Clone)]
pub struct JobExecutor {
    ctx: WorkerContext,
}

impl JobExecutor {
    pub fn new(ctx: WorkerContext) -> Self {
        Self { ctx }
    }

    /// Execute every repetition of `request` and publish its progress.
    ///
    /// Never returns early without having published exactly one terminal
    /// event for the batch.
    pub async fn run(&self, request: &VariationRequest) -> BatchOutcome {
        let session = &request.session_id;
        let filename = request.output_name.as_str();

        for job in 1..=request.jobs {
            match self.run_job(request, job).await {
                Ok(path) => {
                    tracing::info!(
                        session_id = %session,
                        user_id = request.user_id,
                        job,
                        path = %path.display(),
                        "Variation job complete",
                    );
                    self.ctx
                        .publisher
                        .publish(
                            session,
                            ProgressEvent::JobComplete {
                                filename: filename.to_string(),
                                job,
                            },
                        )
                        .await;
                }
                Err(e) => {
                    let kind = e.kind();
                    tracing::error!(
                        session_id = %session,
                        user_id = request.user_id,
                        job,
                        jobs = request.jobs,
                        input = %request.input_path.display(),
                        failure = ?kind,
                        error = %e,
                        "Variation job failed, aborting batch",
                    );
                    self.ctx
                        .publisher
                        .publish(session, kind.event(filename, job))
                        .await;
                    return kind.outcome(job);
                }
            }
        }

        self.ctx
            .publisher
            .publish(
                session,
                ProgressEvent::BatchComplete {
                    filename: filename.to_string(),
                },
            )
            .await;
        tracing::info!(session_id = %session, jobs = request.jobs, "Variation batch complete");

        BatchOutcome::Completed { jobs: request.jobs }
    }

    /// Generate and persist repetition `job`, returning the written path.
    async fn run_job(&self, request: &VariationRequest, job: u32) -> Result<PathBuf, JobError> {
        let path = self
            .ctx
            .storage
            .variation_path(request.user_id, job, &request.output_name);

        let params = GenerationParams::for_repetition(request);
        let variation = self.ctx.generator.generate(&params).await?;

        persist(&path, &variation.data).await?;
        Ok(path)
    }
}

async fn persist(path: &Path, data: &[u8]) -> Result<(), JobError> {
    let wrap = |source| JobError::Persist {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(wrap)?;
    }
    tokio::fs::write(path, data).await.map_err(wrap)
}
