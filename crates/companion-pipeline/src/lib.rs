//! # companion-pipeline
//!
//! Batch embedding maintenance for the companion memory subsystem.
//!
//! ## Key Components
//!
//! - [`EmbeddingPipeline`]: fills in missing embeddings for one category,
//!   chunked and strictly sequential, fail-fast on backend errors
//! - [`BatchOrchestrator`]: runs the four category pipelines in fixed
//!   order under a single exclusivity guard and publishes status
//! - [`ItemCollector`]: normalizes the four collections into one node
//!   list for the similarity graph
//! - [`CategoryProgress`]: per-category run state, orchestrator-owned
//!
//! ## Architecture
//!
//! A run is idempotent and resumable by construction: the pending set is
//! recomputed from embedding presence, so re-running after a failure only
//! re-sends items that still lack a vector. Each category persists once,
//! after all of its items are processed; an aborted category keeps its
//! in-memory progress but flushes nothing.

pub mod collector;
pub mod error;
pub mod orchestrator;
pub mod pipeline;
pub mod progress;

pub use collector::{CollectorConfig, ItemCollector};
pub use error::PipelineError;
pub use orchestrator::{
    BatchOrchestrator, OrchestratorConfig, OrchestratorStatus, RunOutcome, RunState,
};
pub use pipeline::{EmbeddingPipeline, GenerateOutcome, PipelineConfig};
pub use progress::{CategoryProgress, ProgressHandle};
