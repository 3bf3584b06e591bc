use varia_core::batch::FailureKind;

/// Errors from a generation call, split by [`FailureKind`].
#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    /// The request is semantically invalid for this input, e.g. a selected
    /// bar range lies outside the track.
    #[error("Invalid generation input: {reason}")]
    InvalidInput { reason: String },

    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("Generator request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The generator service answered with an error status.
    #[error("Generator service error ({status}): {body}")]
    Service { status: u16, body: String },

    /// The generator reported success but produced no data.
    #[error("Generator returned an empty variation")]
    EmptyOutput,
}

impl GeneratorError {
    pub fn kind(&self) -> FailureKind {
        match self {
            GeneratorError::InvalidInput { .. } => FailureKind::InvalidInput,
            GeneratorError::Request(_)
            | GeneratorError::Service { .. }
            | GeneratorError::EmptyOutput => FailureKind::Internal,
        }
    }
}
