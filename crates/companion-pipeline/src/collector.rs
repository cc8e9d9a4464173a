//! Normalizes the four source collections into one node list.
//!
//! The collector is the single place where heterogeneous records become
//! comparable: every record with a non-empty embedding turns into an
//! [`EmbeddableNode`] with a category-prefixed id. Records without an
//! embedding are silently excluded; they simply have not been through the
//! pipeline yet.

use serde::{Deserialize, Serialize};
use tracing::debug;

use companion_types::{Category, CollectionSet, EmbeddableNode, EmbeddableRecord};

/// Longest display text before truncation.
const DISPLAY_TEXT_MAX_CHARS: usize = 80;

/// Collector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Character id of the system/assistant persona, excluded from the
    /// graph (default: "assistant")
    pub assistant_character_id: String,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            assistant_character_id: "assistant".to_string(),
        }
    }
}

impl CollectorConfig {
    /// Set the excluded assistant character id.
    pub fn with_assistant_character_id(mut self, id: impl Into<String>) -> Self {
        self.assistant_character_id = id.into();
        self
    }
}

/// Builds the normalized node list from the in-memory collections.
#[derive(Debug, Clone, Default)]
pub struct ItemCollector {
    config: CollectorConfig,
}

impl ItemCollector {
    /// Create a collector with the given configuration.
    pub fn new(config: CollectorConfig) -> Self {
        Self { config }
    }

    /// Collect every embeddable node across all four collections.
    pub fn collect(&self, collections: &CollectionSet) -> Vec<EmbeddableNode> {
        let mut nodes = Vec::new();

        for character in &collections.characters {
            if character.id == self.config.assistant_character_id {
                continue;
            }
            if !character.has_embedding() {
                continue;
            }
            nodes.push(EmbeddableNode::new(
                Category::Character,
                &character.id,
                &character.name,
                character.embedding.clone(),
            ));
        }

        for book in &collections.lorebooks {
            for entry in &book.entries {
                if !entry.has_embedding() {
                    continue;
                }
                nodes.push(EmbeddableNode::new(
                    Category::LorebookEntry,
                    &entry.id,
                    format!("{} ({})", entry.title, book.name),
                    entry.embedding.clone(),
                ));
            }
        }

        for memory in &collections.memories {
            if !memory.has_embedding() {
                continue;
            }
            nodes.push(
                EmbeddableNode::new(
                    Category::Memory,
                    &memory.id,
                    display_excerpt(&memory.content),
                    memory.embedding.clone(),
                )
                .with_scope(memory.scope),
            );
        }

        for style in &collections.style_preferences {
            if !style.has_embedding() {
                continue;
            }
            nodes.push(EmbeddableNode::new(
                Category::StylePreference,
                &style.id,
                &style.name,
                style.embedding.clone(),
            ));
        }

        debug!(
            nodes = nodes.len(),
            records = collections.record_count(),
            "collected embeddable nodes"
        );
        nodes
    }
}

/// Truncate memory content to a display-sized excerpt, on a char
/// boundary.
fn display_excerpt(text: &str) -> String {
    if text.chars().count() <= DISPLAY_TEXT_MAX_CHARS {
        return text.to_string();
    }
    let mut excerpt: String = text.chars().take(DISPLAY_TEXT_MAX_CHARS).collect();
    excerpt.push_str("...");
    excerpt
}
