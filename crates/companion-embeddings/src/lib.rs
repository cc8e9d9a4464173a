//! # companion-embeddings
//!
//! Embedding backend capability for the companion memory subsystem.
//!
//! The model itself lives outside this system; this crate defines the seam
//! the pipeline depends on:
//! - [`EmbeddingBackend`]: async `initialize` / `embed_text` capability
//! - [`BackendStatus`]: `uninitialized -> loading -> ready | error`
//! - [`StatusCell`]: status bookkeeping with at-most-one-initialize
//! - [`EmbeddingError`]: error taxonomy, messages surfaced verbatim

pub mod backend;
pub mod error;

pub use backend::{BackendStatus, EmbeddingBackend, StatusCell};
pub use error::EmbeddingError;
