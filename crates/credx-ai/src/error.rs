use credx_core::ModelError;
use credx_store::StoreError;
use thiserror::Error;

/// Classification-service errors. All propagate to the caller; the
/// service never retries and never substitutes a fallback label.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("embedding failed: {0}")]
    Embedding(anyhow::Error),

    #[error("unknown label: {0}")]
    UnknownLabel(String),

    #[error("scoring failed: {0}")]
    Scoring(#[from] ModelError),

    #[error("persistence failed: {0}")]
    Persistence(#[from] StoreError),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("no trained bundle in storage")]
    BundleMissing,

    #[error("inconsistent bundle: {0}")]
    InconsistentBundle(String),

    #[error("bundle was trained with embedder {expected}, service has {actual}")]
    EmbedderMismatch { expected: String, actual: String },
}

impl ClassifierError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}
