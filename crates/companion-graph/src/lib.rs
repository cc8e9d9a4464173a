//! # companion-graph
//!
//! Semantic similarity graph for the companion memory visualization.
//!
//! ## Key Components
//!
//! - [`cosine_similarity`]: total cosine over raw vectors (degenerate
//!   inputs compare as 0, never an error)
//! - [`SimilarityGraphBuilder`]: all-pairs graph construction with a
//!   strict similarity threshold
//! - [`LayoutSink`]: seam to the external force-directed layout engine
//! - [`LayoutParameterController`]: live tuning; physics changes reheat,
//!   threshold changes rebuild
//! - [`RebuildScheduler`]: cancellable deferred rebuild task
//!
//! The graph is ephemeral: it is recomputed in full from the collected
//! nodes whenever the sources or the threshold change.

pub mod builder;
pub mod layout;
pub mod schedule;
pub mod similarity;

pub use builder::{GraphNode, SimilarityGraph, SimilarityGraphBuilder};
pub use layout::{
    LayoutParameterController, LayoutParams, LayoutSink, NodeProvider, DEFAULT_REBUILD_DELAY,
};
pub use schedule::RebuildScheduler;
pub use similarity::cosine_similarity;
