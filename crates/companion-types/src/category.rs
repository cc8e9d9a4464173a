//! Item categories and memory scopes.
//!
//! Every embeddable item belongs to exactly one [`Category`]. The category
//! fixes the node weight and display color used by the visualization and
//! the id prefix used for cross-category namespacing.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Category of an embeddable item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// A character card (persona description).
    Character,
    /// A single entry inside a lorebook.
    LorebookEntry,
    /// A memory record (conversation, character, or global scope).
    Memory,
    /// A writing-style preference.
    StylePreference,
}

impl Category {
    /// All categories in batch-generation phase order:
    /// memory, character, lorebook entry, style.
    pub const PHASE_ORDER: [Category; 4] = [
        Category::Memory,
        Category::Character,
        Category::LorebookEntry,
        Category::StylePreference,
    ];

    /// Fixed visualization weight for nodes of this category.
    pub fn weight(self) -> u32 {
        match self {
            Category::Character => 15,
            Category::LorebookEntry => 5,
            Category::Memory => 3,
            Category::StylePreference => 4,
        }
    }

    /// Prefix used to namespace raw record ids into node ids.
    pub fn id_prefix(self) -> &'static str {
        match self {
            Category::Character => "char",
            Category::LorebookEntry => "lore",
            Category::Memory => "mem",
            Category::StylePreference => "style",
        }
    }

    /// Fixed display color forwarded to the layout sink.
    pub fn color(self) -> &'static str {
        match self {
            Category::Character => "#e0a458",
            Category::LorebookEntry => "#7d9b76",
            Category::Memory => "#6d8fc9",
            Category::StylePreference => "#b07ba8",
        }
    }

    /// Build a globally unique node id from a raw record id.
    ///
    /// Raw ids only need to be unique within their own collection; the
    /// prefix guarantees uniqueness across categories.
    pub fn node_id(self, raw_id: &str) -> String {
        format!("{}:{}", self.id_prefix(), raw_id)
    }

    /// Human-readable phase label used in orchestrator status messages.
    pub fn label(self) -> &'static str {
        match self {
            Category::Character => "characters",
            Category::LorebookEntry => "lorebook entries",
            Category::Memory => "memories",
            Category::StylePreference => "style preferences",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Scope of a memory record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryScope {
    /// Tied to a single conversation.
    Conversation,
    /// Tied to a character across conversations.
    Character,
    /// Visible everywhere.
    Global,
}

impl fmt::Display for MemoryScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MemoryScope::Conversation => "conversation",
            MemoryScope::Character => "character",
            MemoryScope::Global => "global",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_weights() {
        assert_eq!(Category::Character.weight(), 15);
        assert_eq!(Category::LorebookEntry.weight(), 5);
        assert_eq!(Category::Memory.weight(), 3);
        assert_eq!(Category::StylePreference.weight(), 4);
    }

    #[test]
    fn test_node_id_namespacing() {
        // The same raw id in two collections yields distinct node ids.
        let a = Category::Character.node_id("42");
        let b = Category::Memory.node_id("42");
        assert_eq!(a, "char:42");
        assert_eq!(b, "mem:42");
        assert_ne!(a, b);
    }

    #[test]
    fn test_phase_order() {
        assert_eq!(
            Category::PHASE_ORDER,
            [
                Category::Memory,
                Category::Character,
                Category::LorebookEntry,
                Category::StylePreference,
            ]
        );
    }

    #[test]
    fn test_scope_serialization() {
        let json = serde_json::to_string(&MemoryScope::Conversation).unwrap();
        assert_eq!(json, "\"conversation\"");
        let back: MemoryScope = serde_json::from_str(&json).unwrap();
        assert_eq!(back, MemoryScope::Conversation);
    }

    #[test]
    fn test_category_display() {
        assert_eq!(Category::Memory.to_string(), "memories");
        assert_eq!(Category::StylePreference.to_string(), "style preferences");
    }
}
