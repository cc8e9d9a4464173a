//! Pipeline error types.

use thiserror::Error;

use companion_embeddings::EmbeddingError;
use companion_storage::StoreError;

/// Errors that abort an embedding pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Generation attempted before the backend reached Ready
    #[error("embedding backend is not ready")]
    BackendNotReady,

    /// A backend call failed; fatal to the run, message verbatim
    #[error("{0}")]
    Embedding(#[from] EmbeddingError),

    /// Persisting a completed category failed
    #[error("persistence failed: {0}")]
    Store(#[from] StoreError),
}
