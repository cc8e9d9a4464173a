//! End-to-end test harness for the companion memory subsystem.
//!
//! Wires the real pipeline, orchestrator, collector, and graph builder
//! over an in-memory store and a scripted embedding backend, the same way
//! a host application would assemble them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::RwLock;

use companion_embeddings::{BackendStatus, EmbeddingBackend, EmbeddingError, StatusCell};
use companion_graph::{LayoutSink, NodeProvider, SimilarityGraph};
use companion_pipeline::{BatchOrchestrator, CollectorConfig, ItemCollector, OrchestratorConfig};
use companion_storage::{
    FlatRepository, KeyedStore, LorebookRepository, MemoryShardRepository, MemoryStore,
    RecordRepository, CHARACTERS_KEY, STYLE_PREFERENCES_KEY,
};
use companion_types::{
    Character, CollectionSet, EmbeddableNode, Lorebook, LorebookEntry, MemoryRecord,
    StylePreference,
};

/// Install a test logger once; `RUST_LOG` controls verbosity.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Embedding backend with scriptable vectors and failures.
///
/// Unscripted texts embed deterministically from their bytes, so any two
/// identical texts always land on the same vector.
pub struct ScriptedBackend {
    status: StatusCell,
    calls: AtomicUsize,
    vectors: Mutex<HashMap<String, Vec<f32>>>,
    fail_on: Mutex<Option<String>>,
}

impl ScriptedBackend {
    /// Create an uninitialized backend.
    pub fn new() -> Self {
        Self {
            status: StatusCell::new(),
            calls: AtomicUsize::new(0),
            vectors: Mutex::new(HashMap::new()),
            fail_on: Mutex::new(None),
        }
    }

    /// Create a backend already in the Ready state.
    pub fn ready() -> Self {
        let backend = Self::new();
        backend.status.begin_loading();
        backend.status.mark_ready();
        backend
    }

    /// Pin the vector returned for an exact text.
    pub fn script(&self, text: impl Into<String>, vector: Vec<f32>) {
        self.vectors.lock().unwrap().insert(text.into(), vector);
    }

    /// Fail any call whose text contains `marker`.
    pub fn fail_on(&self, marker: impl Into<String>) {
        *self.fail_on.lock().unwrap() = Some(marker.into());
    }

    /// Stop failing.
    pub fn clear_failure(&self) {
        *self.fail_on.lock().unwrap() = None;
    }

    /// Number of `embed_text` calls made.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fallback_vector(text: &str) -> Vec<f32> {
        let mut acc = [0.0f32; 4];
        for (i, byte) in text.bytes().enumerate() {
            acc[i % 4] += f32::from(byte) / 255.0;
        }
        acc.to_vec()
    }
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingBackend for ScriptedBackend {
    async fn initialize(&self) -> Result<(), EmbeddingError> {
        if self.status.begin_loading() {
            self.status.mark_ready();
        }
        Ok(())
    }

    fn status(&self) -> BackendStatus {
        self.status.get()
    }

    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(marker) = self.fail_on.lock().unwrap().as_deref() {
            if text.contains(marker) {
                return Err(EmbeddingError::Backend(format!(
                    "embedding service rejected text containing '{marker}'"
                )));
            }
        }
        if let Some(vector) = self.vectors.lock().unwrap().get(text) {
            return Ok(vector.clone());
        }
        Ok(Self::fallback_vector(text))
    }
}

/// Layout sink that records everything pushed into it.
#[derive(Default)]
pub struct RecordingSink {
    /// Graphs applied, in order
    pub graphs: Mutex<Vec<SimilarityGraph>>,
    /// Charge-strength values pushed
    pub charge: Mutex<Vec<f32>>,
    /// Link-distance values pushed
    pub distance: Mutex<Vec<f32>>,
    /// Reheat calls
    pub reheats: AtomicUsize,
}

impl LayoutSink for RecordingSink {
    fn apply_graph(&self, graph: &SimilarityGraph) {
        self.graphs.lock().unwrap().push(graph.clone());
    }

    fn set_charge_strength(&self, strength: f32) {
        self.charge.lock().unwrap().push(strength);
    }

    fn set_link_distance(&self, distance: f32) {
        self.distance.lock().unwrap().push(distance);
    }

    fn reheat(&self) {
        self.reheats.fetch_add(1, Ordering::SeqCst);
    }
}

/// Collector-backed node provider over the shared collections.
///
/// This is the assembly a host uses to feed the layout controller:
/// collect on demand from whatever the collections currently hold.
pub struct CollectionNodeProvider {
    collections: Arc<RwLock<CollectionSet>>,
    collector: ItemCollector,
}

impl CollectionNodeProvider {
    /// Build a provider over shared collections.
    pub fn new(collections: Arc<RwLock<CollectionSet>>, collector: ItemCollector) -> Self {
        Self {
            collections,
            collector,
        }
    }
}

#[async_trait]
impl NodeProvider for CollectionNodeProvider {
    async fn nodes(&self) -> Vec<EmbeddableNode> {
        let collections = self.collections.read().await;
        self.collector.collect(&collections)
    }
}

/// Full assembly: store, collections, backend, orchestrator.
pub struct TestHarness {
    /// In-memory keyed store
    pub store: Arc<dyn KeyedStore>,
    /// Shared in-memory collections
    pub collections: Arc<RwLock<CollectionSet>>,
    /// Scripted embedding backend
    pub backend: Arc<ScriptedBackend>,
    /// Orchestrator under test
    pub orchestrator: BatchOrchestrator,
}

impl TestHarness {
    /// Build a harness around `collections`, seeding the store the way a
    /// host would have persisted them.
    pub fn new(collections: CollectionSet) -> Self {
        init_test_logging();

        let store: Arc<dyn KeyedStore> = Arc::new(MemoryStore::new());
        seed_store(&store, &collections);

        let backend = Arc::new(ScriptedBackend::ready());
        let shared = Arc::new(RwLock::new(collections));
        let orchestrator = BatchOrchestrator::new(
            backend.clone(),
            Arc::clone(&store),
            Arc::clone(&shared),
            OrchestratorConfig::default().with_idle_reset_ms(20),
        );

        Self {
            store,
            collections: shared,
            backend,
            orchestrator,
        }
    }

    /// Collect the current embeddable nodes.
    pub async fn nodes(&self) -> Vec<EmbeddableNode> {
        let collections = self.collections.read().await;
        ItemCollector::new(CollectorConfig::default()).collect(&collections)
    }

    /// Memory shard repository over the harness store.
    pub fn memory_repo(&self) -> MemoryShardRepository {
        MemoryShardRepository::new(Arc::clone(&self.store))
    }

    /// Character repository over the harness store.
    pub fn character_repo(&self) -> FlatRepository<Character> {
        FlatRepository::new(Arc::clone(&self.store), CHARACTERS_KEY)
    }

    /// Lorebook repository over the harness store.
    pub fn lorebook_repo(&self) -> LorebookRepository {
        LorebookRepository::new(Arc::clone(&self.store))
    }

    /// Style-preference repository over the harness store.
    pub fn style_repo(&self) -> FlatRepository<StylePreference> {
        FlatRepository::new(Arc::clone(&self.store), STYLE_PREFERENCES_KEY)
    }
}

/// Persist `collections` into `store` as a host would have.
pub fn seed_store(store: &Arc<dyn KeyedStore>, collections: &CollectionSet) {
    FlatRepository::<Character>::new(Arc::clone(store), CHARACTERS_KEY)
        .upsert_many(&collections.characters)
        .expect("seed characters");
    LorebookRepository::new(Arc::clone(store))
        .save_books(&collections.lorebooks)
        .expect("seed lorebooks");
    MemoryShardRepository::new(Arc::clone(store))
        .upsert_many(&collections.memories)
        .expect("seed memories");
    FlatRepository::<StylePreference>::new(Arc::clone(store), STYLE_PREFERENCES_KEY)
        .upsert_many(&collections.style_preferences)
        .expect("seed style preferences");
}

/// A small, varied collection set: one character, one lorebook with two
/// entries, three memories across scopes, one style preference.
pub fn sample_collections() -> CollectionSet {
    CollectionSet {
        characters: vec![Character::new(
            "Mira",
            "A wandering cartographer who collects half-finished maps.",
        )],
        lorebooks: vec![Lorebook::new("Atlas of the Vale")
            .with_entry(LorebookEntry::new(
                "The Vale",
                "A fog-bound valley where compasses spin freely.",
            ))
            .with_entry(LorebookEntry::new(
                "The Spire",
                "A basalt tower visible from every hill.",
            ))],
        memories: vec![
            MemoryRecord::new("Prefers tea over coffee on rainy evenings."),
            MemoryRecord::new("Asked about the northern trade routes.").for_character("c1"),
            MemoryRecord::new("Mentioned an upcoming festival.").for_conversation("v1"),
        ],
        style_preferences: vec![StylePreference::new(
            "terse",
            "Short sentences, no filler words.",
        )],
    }
}
