//! Durable source records and the embeddable-record seam.
//!
//! Each record owns its embedding vector; an empty vector means the record
//! has not been embedded yet. Everything else about a record is opaque to
//! the pipeline, which only works through [`EmbeddableRecord`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::category::MemoryScope;
use crate::shard::shard_key;

/// Seam between the embedding pipeline and concrete record shapes.
///
/// Content resolution walks `primary_text` then `content_text` then
/// `name_text` and embeds the first non-blank candidate. A record with no
/// usable text is skipped by the pipeline without a backend call.
pub trait EmbeddableRecord {
    /// Raw id, unique within the record's own collection.
    fn record_id(&self) -> &str;

    /// Current embedding vector; empty means not yet embedded.
    fn embedding(&self) -> &[f32];

    /// Replace the embedding vector.
    fn set_embedding(&mut self, embedding: Vec<f32>);

    /// The field this record kind prefers to embed.
    fn primary_text(&self) -> Option<&str> {
        None
    }

    /// Generic content fallback.
    fn content_text(&self) -> Option<&str> {
        None
    }

    /// Generic name fallback.
    fn name_text(&self) -> Option<&str> {
        None
    }

    /// First non-blank candidate in resolution order.
    fn embedding_text(&self) -> Option<&str> {
        [self.primary_text(), self.content_text(), self.name_text()]
            .into_iter()
            .flatten()
            .find(|text| !text.trim().is_empty())
    }

    /// Whether this record already carries an embedding.
    fn has_embedding(&self) -> bool {
        !self.embedding().is_empty()
    }
}

/// A character card.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Character {
    /// Unique character id
    pub id: String,

    /// Display name
    pub name: String,

    /// Persona description, the text that gets embedded
    pub persona: String,

    /// Embedding vector; empty until generated
    #[serde(default)]
    pub embedding: Vec<f32>,

    /// Creation timestamp
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl Character {
    /// Create a new character with a generated id and no embedding.
    pub fn new(name: impl Into<String>, persona: impl Into<String>) -> Self {
        Self {
            id: Ulid::new().to_string(),
            name: name.into(),
            persona: persona.into(),
            embedding: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

impl EmbeddableRecord for Character {
    fn record_id(&self) -> &str {
        &self.id
    }

    fn embedding(&self) -> &[f32] {
        &self.embedding
    }

    fn set_embedding(&mut self, embedding: Vec<f32>) {
        self.embedding = embedding;
    }

    fn primary_text(&self) -> Option<&str> {
        Some(&self.persona)
    }

    fn name_text(&self) -> Option<&str> {
        Some(&self.name)
    }
}

/// A lorebook holding a nested list of entries.
///
/// The book itself is never embedded; its entries are.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lorebook {
    /// Unique lorebook id
    pub id: String,

    /// Book name, used to tag entry nodes for display
    pub name: String,

    /// Entries, embedded individually
    #[serde(default)]
    pub entries: Vec<LorebookEntry>,
}

impl Lorebook {
    /// Create an empty lorebook with a generated id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Ulid::new().to_string(),
            name: name.into(),
            entries: Vec::new(),
        }
    }

    /// Append an entry.
    pub fn with_entry(mut self, entry: LorebookEntry) -> Self {
        self.entries.push(entry);
        self
    }
}

/// A single entry inside a lorebook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LorebookEntry {
    /// Entry id, unique across all lorebooks
    pub id: String,

    /// Short title
    pub title: String,

    /// Entry body, the text that gets embedded
    pub content: String,

    /// Embedding vector; empty until generated
    #[serde(default)]
    pub embedding: Vec<f32>,
}

impl LorebookEntry {
    /// Create a new entry with a generated id and no embedding.
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Ulid::new().to_string(),
            title: title.into(),
            content: content.into(),
            embedding: Vec::new(),
        }
    }
}

impl EmbeddableRecord for LorebookEntry {
    fn record_id(&self) -> &str {
        &self.id
    }

    fn embedding(&self) -> &[f32] {
        &self.embedding
    }

    fn set_embedding(&mut self, embedding: Vec<f32>) {
        self.embedding = embedding;
    }

    fn primary_text(&self) -> Option<&str> {
        Some(&self.content)
    }

    fn name_text(&self) -> Option<&str> {
        Some(&self.title)
    }
}

/// A memory record.
///
/// Memories are persisted sharded by scope; see [`MemoryRecord::shard_key`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Unique memory id
    pub id: String,

    /// Scope this memory belongs to
    pub scope: MemoryScope,

    /// Owning character, for character-scoped memories
    #[serde(default)]
    pub character_id: Option<String>,

    /// Owning conversation, for conversation-scoped memories
    #[serde(default)]
    pub conversation_id: Option<String>,

    /// Memory text, the text that gets embedded
    pub content: String,

    /// Embedding vector; empty until generated
    #[serde(default)]
    pub embedding: Vec<f32>,

    /// Creation timestamp
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl MemoryRecord {
    /// Create a global-scope memory with a generated id.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: Ulid::new().to_string(),
            scope: MemoryScope::Global,
            character_id: None,
            conversation_id: None,
            content: content.into(),
            embedding: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Scope this memory to a character.
    pub fn for_character(mut self, character_id: impl Into<String>) -> Self {
        self.scope = MemoryScope::Character;
        self.character_id = Some(character_id.into());
        self
    }

    /// Scope this memory to a conversation.
    pub fn for_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.scope = MemoryScope::Conversation;
        self.conversation_id = Some(conversation_id.into());
        self
    }

    /// Persistence shard key for this record.
    pub fn shard_key(&self) -> String {
        shard_key(
            self.scope,
            self.character_id.as_deref(),
            self.conversation_id.as_deref(),
        )
    }
}

impl EmbeddableRecord for MemoryRecord {
    fn record_id(&self) -> &str {
        &self.id
    }

    fn embedding(&self) -> &[f32] {
        &self.embedding
    }

    fn set_embedding(&mut self, embedding: Vec<f32>) {
        self.embedding = embedding;
    }

    fn primary_text(&self) -> Option<&str> {
        Some(&self.content)
    }
}

/// A writing-style preference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StylePreference {
    /// Unique preference id
    pub id: String,

    /// Short name
    pub name: String,

    /// Description, the text that gets embedded
    pub description: String,

    /// Embedding vector; empty until generated
    #[serde(default)]
    pub embedding: Vec<f32>,
}

impl StylePreference {
    /// Create a new style preference with a generated id.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: Ulid::new().to_string(),
            name: name.into(),
            description: description.into(),
            embedding: Vec::new(),
        }
    }
}

impl EmbeddableRecord for StylePreference {
    fn record_id(&self) -> &str {
        &self.id
    }

    fn embedding(&self) -> &[f32] {
        &self.embedding
    }

    fn set_embedding(&mut self, embedding: Vec<f32>) {
        self.embedding = embedding;
    }

    fn primary_text(&self) -> Option<&str> {
        Some(&self.description)
    }

    fn name_text(&self) -> Option<&str> {
        Some(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::MemoryScope;

    #[test]
    fn test_embedding_text_prefers_primary() {
        let character = Character::new("Mira", "A wandering cartographer.");
        assert_eq!(character.embedding_text(), Some("A wandering cartographer."));
    }

    #[test]
    fn test_embedding_text_falls_back_to_name() {
        let character = Character::new("Mira", "   ");
        assert_eq!(character.embedding_text(), Some("Mira"));
    }

    #[test]
    fn test_embedding_text_none_when_all_blank() {
        let character = Character::new("", "");
        assert_eq!(character.embedding_text(), None);
    }

    #[test]
    fn test_has_embedding() {
        let mut memory = MemoryRecord::new("Likes rainy evenings");
        assert!(!memory.has_embedding());
        memory.set_embedding(vec![0.1, 0.2]);
        assert!(memory.has_embedding());
    }

    #[test]
    fn test_memory_scoping_builders() {
        let memory = MemoryRecord::new("x").for_character("c1");
        assert_eq!(memory.scope, MemoryScope::Character);
        assert_eq!(memory.character_id.as_deref(), Some("c1"));

        let memory = MemoryRecord::new("y").for_conversation("conv9");
        assert_eq!(memory.scope, MemoryScope::Conversation);
        assert_eq!(memory.conversation_id.as_deref(), Some("conv9"));
    }

    #[test]
    fn test_record_serde_round_trip() {
        let entry = LorebookEntry::new("The Vale", "A fog-bound valley.");
        let json = serde_json::to_vec(&entry).unwrap();
        let back: LorebookEntry = serde_json::from_slice(&json).unwrap();
        assert_eq!(back.id, entry.id);
        assert_eq!(back.title, "The Vale");
        assert!(back.embedding.is_empty());
    }

    #[test]
    fn test_embedding_field_defaults_when_missing() {
        // Records written before embeddings existed deserialize cleanly.
        let json = r#"{"id":"s1","name":"terse","description":"Short sentences."}"#;
        let style: StylePreference = serde_json::from_str(json).unwrap();
        assert!(style.embedding.is_empty());
    }
}
