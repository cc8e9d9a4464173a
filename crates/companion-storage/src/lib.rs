//! Storage layer for the companion memory subsystem.
//!
//! Provides the flat keyed store and the per-category repositories:
//! - [`KeyedStore`]: `get`/`set`/`keys` over byte values
//! - [`RocksStore`]: RocksDB-backed durable store
//! - [`MemoryStore`]: in-memory store for tests and embedded hosts
//! - [`RecordRepository`]: shape-agnostic load/upsert capability with
//!   flat, nested-lorebook, and sharded-memory implementations

pub mod error;
pub mod keys;
pub mod repository;
pub mod store;

pub use error::StoreError;
pub use keys::{CHARACTERS_KEY, LOREBOOKS_KEY, STYLE_PREFERENCES_KEY};
pub use repository::{
    FlatRepository, LorebookRepository, MemoryShardRepository, RecordRepository,
};
pub use store::{load_array, save_array, KeyedStore, MemoryStore, RocksStore};
