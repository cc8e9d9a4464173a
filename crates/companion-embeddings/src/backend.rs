//! Embedding backend trait and status state machine.
//!
//! The text-embedding model is an external capability: something that can
//! be initialized once and then asked to turn text into a vector. This
//! module owns only the seam and the status bookkeeping; concrete model
//! hosting lives with the caller.

use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::EmbeddingError;

/// Lifecycle status of an embedding backend.
///
/// Transitions: `Uninitialized -> Loading -> Ready | Error`. A failed
/// backend may be re-initialized, which moves it back through Loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BackendStatus {
    /// Not yet initialized
    #[default]
    Uninitialized,
    /// Initialization in flight
    Loading,
    /// Ready to embed text
    Ready,
    /// Initialization failed; message is human-readable
    Error {
        /// What went wrong
        message: String,
    },
}

impl BackendStatus {
    /// Whether the backend can serve `embed_text` calls.
    pub fn is_ready(&self) -> bool {
        matches!(self, BackendStatus::Ready)
    }
}

/// Capability for generating text embeddings.
///
/// Implementations must be thread-safe (`Send + Sync`). Calls carry no
/// timeout; a hung backend stalls its caller, by contract of the batch
/// pipeline.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Initialize the backend, driving status through Loading to Ready
    /// or Error. At most one initialization may be in flight.
    async fn initialize(&self) -> Result<(), EmbeddingError>;

    /// Current lifecycle status.
    fn status(&self) -> BackendStatus;

    /// Embed a single text into a fixed-dimension vector.
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

/// Shared status bookkeeping for backend implementations.
///
/// Enforces the at-most-one-initialization rule: `begin_loading` only
/// succeeds from Uninitialized or Error, so a second concurrent
/// `initialize` observes Loading and backs off.
#[derive(Debug, Default)]
pub struct StatusCell {
    inner: RwLock<BackendStatus>,
}

impl StatusCell {
    /// Create a cell in the Uninitialized state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the current status.
    pub fn get(&self) -> BackendStatus {
        self.inner
            .read()
            .map(|s| s.clone())
            .unwrap_or(BackendStatus::Error {
                message: "status lock poisoned".to_string(),
            })
    }

    /// Try to move into Loading.
    ///
    /// Returns `false` if initialization is already in flight or the
    /// backend is already Ready, in which case the caller must not start
    /// another initialization.
    pub fn begin_loading(&self) -> bool {
        let mut status = match self.inner.write() {
            Ok(guard) => guard,
            Err(_) => return false,
        };
        match *status {
            BackendStatus::Uninitialized | BackendStatus::Error { .. } => {
                *status = BackendStatus::Loading;
                true
            }
            BackendStatus::Loading | BackendStatus::Ready => false,
        }
    }

    /// Mark initialization complete.
    pub fn mark_ready(&self) {
        if let Ok(mut status) = self.inner.write() {
            *status = BackendStatus::Ready;
            info!("embedding backend ready");
        }
    }

    /// Mark initialization failed with a human-readable message.
    pub fn mark_error(&self, message: impl Into<String>) {
        let message = message.into();
        warn!(error = %message, "embedding backend failed to initialize");
        if let Ok(mut status) = self.inner.write() {
            *status = BackendStatus::Error { message };
        }
    }

    /// Whether the backend is Ready.
    pub fn is_ready(&self) -> bool {
        self.get().is_ready()
    }
}
