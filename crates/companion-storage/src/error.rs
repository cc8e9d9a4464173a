//! Storage error types.

use thiserror::Error;

/// Errors that can occur in the keyed store or a repository.
#[derive(Debug, Error)]
pub enum StoreError {
    /// RocksDB error
    #[error("database error: {0}")]
    Database(#[from] rocksdb::Error),

    /// Payload (de)serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Store-level invariant failure (e.g. poisoned lock)
    #[error("store error: {0}")]
    Store(String),
}
