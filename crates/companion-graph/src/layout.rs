//! Layout sink seam and live parameter tuning.
//!
//! The force-directed layout engine is an external consumer: it receives
//! graphs and physics values and is never read back. Physics changes
//! (repulsion, link distance) reconfigure the running simulation and
//! reheat it; only threshold changes and source-collection changes force
//! a graph rebuild.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use companion_types::EmbeddableNode;

use crate::builder::{SimilarityGraph, SimilarityGraphBuilder};
use crate::schedule::RebuildScheduler;

/// External force-directed layout engine, consumer-only.
pub trait LayoutSink: Send + Sync {
    /// Replace the rendered graph.
    fn apply_graph(&self, graph: &SimilarityGraph);

    /// Reconfigure node repulsion (charge strength).
    fn set_charge_strength(&self, strength: f32);

    /// Reconfigure target link distance.
    fn set_link_distance(&self, distance: f32);

    /// Restart the physics simulation so new parameters take effect.
    fn reheat(&self);
}

/// Source of the current collected node list.
///
/// Implemented by whatever owns the collections (typically the item
/// collector over the in-memory aggregate). Async because providers
/// usually read a shared, lock-guarded collection set.
#[async_trait]
pub trait NodeProvider: Send + Sync {
    /// Collect the current embeddable nodes.
    async fn nodes(&self) -> Vec<EmbeddableNode>;
}

/// Tunable visualization parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutParams {
    /// Minimum similarity for an edge to be kept (strict)
    pub threshold: f32,

    /// Node repulsion forwarded to the layout engine
    pub repulsion: f32,

    /// Target edge length forwarded to the layout engine
    pub link_distance: f32,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            repulsion: 180.0,
            link_distance: 80.0,
        }
    }
}

/// Default delay before a scheduled rebuild starts.
///
/// Long enough for the host to paint a loading indicator, short enough to
/// feel immediate. Correctness does not depend on the value.
pub const DEFAULT_REBUILD_DELAY: Duration = Duration::from_millis(30);

/// Holds the current layout parameters and routes changes.
///
/// Repulsion and link-distance changes are pure pass-through: push the
/// value into the sink and reheat. Threshold changes and collection
/// refreshes schedule a full rebuild through [`RebuildScheduler`].
pub struct LayoutParameterController {
    params: Mutex<LayoutParams>,
    provider: Arc<dyn NodeProvider>,
    sink: Arc<dyn LayoutSink>,
    rebuilds: RebuildScheduler,
    rebuild_delay: Duration,
}

impl LayoutParameterController {
    /// Create a controller with default parameters.
    pub fn new(provider: Arc<dyn NodeProvider>, sink: Arc<dyn LayoutSink>) -> Self {
        Self {
            params: Mutex::new(LayoutParams::default()),
            provider,
            sink,
            rebuilds: RebuildScheduler::new(),
            rebuild_delay: DEFAULT_REBUILD_DELAY,
        }
    }

    /// Override the initial parameters.
    pub fn with_params(mut self, params: LayoutParams) -> Self {
        self.params = Mutex::new(params);
        self
    }

    /// Override the rebuild delay (tests use a tighter value).
    pub fn with_rebuild_delay(mut self, delay: Duration) -> Self {
        self.rebuild_delay = delay;
        self
    }

    /// Snapshot the current parameters.
    pub fn params(&self) -> LayoutParams {
        *self
            .params
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Change node repulsion. Reconfigures and reheats the simulation;
    /// never rebuilds the graph.
    pub fn set_repulsion(&self, repulsion: f32) {
        {
            let mut params = self
                .params
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            params.repulsion = repulsion;
        }
        self.sink.set_charge_strength(repulsion);
        self.sink.reheat();
    }

    /// Change link distance. Reconfigures and reheats the simulation;
    /// never rebuilds the graph.
    pub fn set_link_distance(&self, distance: f32) {
        {
            let mut params = self
                .params
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            params.link_distance = distance;
        }
        self.sink.set_link_distance(distance);
        self.sink.reheat();
    }

    /// Change the similarity threshold and schedule a full rebuild.
    pub fn set_threshold(&self, threshold: f32) {
        {
            let mut params = self
                .params
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            params.threshold = threshold;
        }
        debug!(threshold = threshold, "threshold changed, rebuild scheduled");
        self.schedule_rebuild();
    }

    /// Source collections changed: schedule a full rebuild at the current
    /// threshold.
    pub fn refresh(&self) {
        self.schedule_rebuild();
    }

    fn schedule_rebuild(&self) {
        let threshold = self.params().threshold;
        let provider = Arc::clone(&self.provider);
        let sink = Arc::clone(&self.sink);
        self.rebuilds.schedule(self.rebuild_delay, async move {
            let graph = SimilarityGraphBuilder::build(&provider.nodes().await, threshold);
            sink.apply_graph(&graph);
        });
    }
}
