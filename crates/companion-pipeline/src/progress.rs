//! Per-category pipeline progress.
//!
//! Ephemeral state: reset at the start of every run, observable at any
//! time, never persisted.

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

/// Snapshot of one category pipeline's progress.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryProgress {
    /// Items still waiting for an embedding in the current run
    pub pending: usize,

    /// Items handled so far in the current run (embedded or skipped)
    pub processed: usize,

    /// Last status message
    pub message: String,

    /// Whether a run is active for this category
    pub running: bool,
}

/// Shared handle to a category's progress.
#[derive(Debug, Clone, Default)]
pub struct ProgressHandle {
    inner: Arc<RwLock<CategoryProgress>>,
}

impl ProgressHandle {
    /// Create a handle in the idle state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the current progress.
    pub fn snapshot(&self) -> CategoryProgress {
        self.inner
            .read()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    /// Start a run with `pending` items to process.
    pub fn begin(&self, pending: usize, message: impl Into<String>) {
        if let Ok(mut progress) = self.inner.write() {
            *progress = CategoryProgress {
                pending,
                processed: 0,
                message: message.into(),
                running: true,
            };
        }
    }

    /// One item handled: processed goes up, pending goes down.
    ///
    /// The processed counter is monotonic within a run.
    pub fn advance(&self) {
        if let Ok(mut progress) = self.inner.write() {
            progress.processed += 1;
            progress.pending = progress.pending.saturating_sub(1);
        }
    }

    /// End the run successfully.
    pub fn finish(&self, message: impl Into<String>) {
        if let Ok(mut progress) = self.inner.write() {
            progress.running = false;
            progress.message = message.into();
        }
    }

    /// End the run with a failure message.
    pub fn fail(&self, message: impl Into<String>) {
        if let Ok(mut progress) = self.inner.write() {
            progress.running = false;
            progress.message = message.into();
        }
    }
}
