//! # companion-types
//!
//! Shared domain types for the companion memory subsystem.
//!
//! This crate defines the core data structures used throughout the system:
//! - Source records: characters, lorebooks with nested entries, memories,
//!   style preferences
//! - The [`EmbeddableRecord`] seam the embedding pipeline works through
//! - Visualization primitives: [`EmbeddableNode`] and [`SimilarityEdge`]
//! - Shard-key derivation for partitioned memory persistence

pub mod category;
pub mod collections;
pub mod node;
pub mod records;
pub mod shard;

pub use category::{Category, MemoryScope};
pub use collections::CollectionSet;
pub use node::{EmbeddableNode, SimilarityEdge};
pub use records::{
    Character, EmbeddableRecord, Lorebook, LorebookEntry, MemoryRecord, StylePreference,
};
pub use shard::{
    is_memory_shard_key, shard_key, CHARACTER_SHARD_PREFIX, CONVERSATION_SHARD_PREFIX,
    GLOBAL_MEMORIES_KEY,
};
