//! The in-memory aggregate of all source collections.

use serde::{Deserialize, Serialize};

use crate::records::{Character, Lorebook, MemoryRecord, StylePreference};

/// All four source collections, as held in memory by the host.
///
/// The batch orchestrator mutates embeddings in place here; everything
/// else treats the set as read-only input.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionSet {
    /// Character cards
    #[serde(default)]
    pub characters: Vec<Character>,

    /// Lorebooks with nested entries
    #[serde(default)]
    pub lorebooks: Vec<Lorebook>,

    /// Memories across all scopes
    #[serde(default)]
    pub memories: Vec<MemoryRecord>,

    /// Style preferences
    #[serde(default)]
    pub style_preferences: Vec<StylePreference>,
}

impl CollectionSet {
    /// Total number of records across all collections, counting lorebook
    /// entries rather than books.
    pub fn record_count(&self) -> usize {
        self.characters.len()
            + self.lorebooks.iter().map(|b| b.entries.len()).sum::<usize>()
            + self.memories.len()
            + self.style_preferences.len()
    }
}
