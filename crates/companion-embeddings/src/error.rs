//! Embedding backend error types.

use thiserror::Error;

/// Errors that can occur during embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Generation was attempted before the backend reached Ready
    #[error("embedding backend is not ready")]
    NotReady,

    /// Backend initialization failed
    #[error("failed to initialize embedding backend: {0}")]
    Initialize(String),

    /// A text-embedding call failed; the message is surfaced verbatim
    #[error("embedding backend error: {0}")]
    Backend(String),
}
