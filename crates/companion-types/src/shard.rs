//! Shard-key derivation for memory persistence.
//!
//! Memories are persisted in per-scope shards inside the keyed store. The
//! derivation is a pure function of the record's scope and owner ids so
//! the same record always lands in the same shard.

use crate::category::MemoryScope;

/// Shard holding all global-scope memories.
pub const GLOBAL_MEMORIES_KEY: &str = "global_memories";

/// Prefix for character-scoped memory shards.
pub const CHARACTER_SHARD_PREFIX: &str = "memories_character_";

/// Prefix for conversation-scoped memory shards.
pub const CONVERSATION_SHARD_PREFIX: &str = "memories_conversation_";

/// Derive the persistence shard key for a memory.
///
/// A scoped record missing its owner id degrades to the global shard,
/// keeping the derivation total and deterministic.
pub fn shard_key(
    scope: MemoryScope,
    character_id: Option<&str>,
    conversation_id: Option<&str>,
) -> String {
    match scope {
        MemoryScope::Global => GLOBAL_MEMORIES_KEY.to_string(),
        MemoryScope::Character => match character_id {
            Some(id) => format!("{CHARACTER_SHARD_PREFIX}{id}"),
            None => GLOBAL_MEMORIES_KEY.to_string(),
        },
        MemoryScope::Conversation => match conversation_id {
            Some(id) => format!("{CONVERSATION_SHARD_PREFIX}{id}"),
            None => GLOBAL_MEMORIES_KEY.to_string(),
        },
    }
}

/// Whether a store key names a memory shard.
///
/// Used to enumerate memory shards without tracking them separately.
pub fn is_memory_shard_key(key: &str) -> bool {
    key == GLOBAL_MEMORIES_KEY
        || key.starts_with(CHARACTER_SHARD_PREFIX)
        || key.starts_with(CONVERSATION_SHARD_PREFIX)
}
