//! Visualization primitives: nodes and similarity edges.
//!
//! Nodes and edges are ephemeral. They are rebuilt from source records on
//! demand and never persisted; only the embedding vector inside a source
//! record is durable.

use serde::{Deserialize, Serialize};

use crate::category::{Category, MemoryScope};

/// A source record normalized into the comparison space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddableNode {
    /// Category-prefixed id, globally unique across collections
    pub id: String,

    /// Raw id of the owning record (non-owning back-reference; the
    /// category identifies which collection to look in)
    pub source_id: String,

    /// Category the record came from
    pub category: Category,

    /// Text shown for this node in the visualization
    pub display_text: String,

    /// Fixed per-category weight
    pub weight: u32,

    /// Embedding vector, always non-empty for a collected node
    pub embedding: Vec<f32>,

    /// Memory scope, set for memory nodes only
    #[serde(default)]
    pub scope: Option<MemoryScope>,
}

impl EmbeddableNode {
    /// Build a node from a raw record id and its category.
    pub fn new(
        category: Category,
        source_id: impl Into<String>,
        display_text: impl Into<String>,
        embedding: Vec<f32>,
    ) -> Self {
        let source_id = source_id.into();
        Self {
            id: category.node_id(&source_id),
            source_id,
            category,
            display_text: display_text.into(),
            weight: category.weight(),
            embedding,
            scope: None,
        }
    }

    /// Tag a memory node with its scope.
    pub fn with_scope(mut self, scope: MemoryScope) -> Self {
        self.scope = Some(scope);
        self
    }
}

/// An undirected similarity edge between two nodes.
///
/// Enumerated once per unordered pair; `weight` is the cosine similarity
/// in `[-1, 1]` and is always strictly above the build threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityEdge {
    /// Node id of one endpoint
    pub source: String,

    /// Node id of the other endpoint
    pub target: String,

    /// Cosine similarity between the endpoints
    pub weight: f32,
}
