//! All-pairs similarity graph construction.
//!
//! Exhaustive pairwise comparison is the design point: at hundreds to low
//! thousands of items, O(n²·d) is cheaper than maintaining any index, and
//! the graph is rebuilt from scratch on every source or threshold change.

use serde::{Deserialize, Serialize};
use tracing::debug;

use companion_types::{EmbeddableNode, SimilarityEdge};

use crate::similarity::cosine_similarity;

/// A node as handed to the layout sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    /// Category-prefixed node id
    pub id: String,

    /// Display text
    pub label: String,

    /// Fixed per-category weight
    pub weight: u32,

    /// Fixed per-category color
    pub color: String,
}

/// The computed graph: nodes plus thresholded similarity edges.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimilarityGraph {
    /// All collected nodes
    pub nodes: Vec<GraphNode>,

    /// Edges with similarity strictly above the build threshold
    pub edges: Vec<SimilarityEdge>,
}

impl SimilarityGraph {
    /// Whether there is nothing to render. The caller shows an explicit
    /// "no items" state for this, not an error.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Builds the similarity graph from collected nodes.
pub struct SimilarityGraphBuilder;

impl SimilarityGraphBuilder {
    /// Compute the graph at `threshold`.
    ///
    /// Each unordered pair is compared once; an edge is kept iff its
    /// cosine similarity is strictly greater than `threshold`.
    pub fn build(nodes: &[EmbeddableNode], threshold: f32) -> SimilarityGraph {
        let graph_nodes: Vec<GraphNode> = nodes
            .iter()
            .map(|node| GraphNode {
                id: node.id.clone(),
                label: node.display_text.clone(),
                weight: node.weight,
                color: node.category.color().to_string(),
            })
            .collect();

        let mut edges = Vec::new();
        for i in 0..nodes.len() {
            for j in (i + 1)..nodes.len() {
                let similarity = cosine_similarity(&nodes[i].embedding, &nodes[j].embedding);
                if similarity > threshold {
                    edges.push(SimilarityEdge {
                        source: nodes[i].id.clone(),
                        target: nodes[j].id.clone(),
                        weight: similarity,
                    });
                }
            }
        }

        debug!(
            nodes = graph_nodes.len(),
            edges = edges.len(),
            threshold = threshold,
            "similarity graph built"
        );

        SimilarityGraph {
            nodes: graph_nodes,
            edges,
        }
    }
}
