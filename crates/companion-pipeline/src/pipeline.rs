//! Batch embedding pipeline for one category.
//!
//! The pipeline fills in missing embedding vectors. The pending set is
//! recomputed from embedding presence on every run, so a run after a
//! failure naturally resumes where the failure happened: items embedded
//! earlier are no longer pending.
//!
//! Failure policy is fail-fast: the first backend error aborts the run.
//! Persistence is one shot per category, after every item is processed;
//! a run that aborts mid-category keeps its in-memory progress but
//! flushes nothing.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use companion_embeddings::EmbeddingBackend;
use companion_storage::RecordRepository;
use companion_types::{Category, EmbeddableRecord};

use crate::error::PipelineError;
use crate::progress::{CategoryProgress, ProgressHandle};

/// Pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pending items per chunk (default: 10)
    ///
    /// Chunking bounds backend load per scheduling tick; it does not
    /// change processing order, which always follows the collection.
    pub chunk_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { chunk_size: 10 }
    }
}

impl PipelineConfig {
    /// Set the chunk size.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }
}

/// Result of one `generate` run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateOutcome {
    /// Items that were pending at the start of the run
    pub pending: usize,

    /// Items embedded by this run
    pub embedded: usize,

    /// Items skipped because they resolved to no usable text
    pub skipped: usize,
}

impl GenerateOutcome {
    /// Whether there was nothing to do.
    pub fn already_complete(&self) -> bool {
        self.pending == 0
    }
}

/// Embedding pipeline for a single category.
pub struct EmbeddingPipeline {
    category: Category,
    backend: Arc<dyn EmbeddingBackend>,
    config: PipelineConfig,
    progress: ProgressHandle,
}

impl EmbeddingPipeline {
    /// Create a pipeline for `category` over the given backend.
    pub fn new(
        category: Category,
        backend: Arc<dyn EmbeddingBackend>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            category,
            backend,
            config,
            progress: ProgressHandle::new(),
        }
    }

    /// The category this pipeline serves.
    pub fn category(&self) -> Category {
        self.category
    }

    /// Snapshot this category's progress.
    pub fn progress(&self) -> CategoryProgress {
        self.progress.snapshot()
    }

    /// Fill in missing embeddings for `items`, persisting through
    /// `repository` once the whole category has been processed.
    ///
    /// Items are processed in collection order, in chunks, strictly
    /// sequentially, with a cooperative yield between items. A fully
    /// embedded collection is left untouched and costs no backend calls.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::BackendNotReady`] if there is pending
    /// work but the backend is not Ready, [`PipelineError::Embedding`]
    /// on the first failed backend call (fail-fast, no retry), and
    /// [`PipelineError::Store`] if the post-run persistence fails.
    pub async fn generate<T, R>(
        &self,
        items: &mut [T],
        repository: &R,
    ) -> Result<GenerateOutcome, PipelineError>
    where
        T: EmbeddableRecord + Clone,
        R: RecordRepository<T>,
    {
        let pending: Vec<usize> = items
            .iter()
            .enumerate()
            .filter(|(_, record)| !record.has_embedding())
            .map(|(index, _)| index)
            .collect();

        if pending.is_empty() {
            info!(category = %self.category, "embeddings already complete");
            self.progress
                .finish(format!("{} already complete", self.category));
            return Ok(GenerateOutcome::default());
        }

        if !self.backend.status().is_ready() {
            return Err(PipelineError::BackendNotReady);
        }

        info!(
            category = %self.category,
            pending = pending.len(),
            "starting embedding generation"
        );
        self.progress.begin(
            pending.len(),
            format!("Generating embeddings for {}", self.category),
        );

        let mut outcome = GenerateOutcome {
            pending: pending.len(),
            ..Default::default()
        };
        let mut updated: Vec<T> = Vec::new();

        for chunk in pending.chunks(self.config.chunk_size) {
            for &index in chunk {
                match items[index].embedding_text().map(str::to_owned) {
                    None => {
                        // Nothing to embed; still counts as handled.
                        debug!(
                            category = %self.category,
                            id = %items[index].record_id(),
                            "no embeddable text, skipping"
                        );
                        outcome.skipped += 1;
                    }
                    Some(text) => {
                        let vector = match self.backend.embed_text(&text).await {
                            Ok(vector) => vector,
                            Err(error) => {
                                warn!(
                                    category = %self.category,
                                    id = %items[index].record_id(),
                                    error = %error,
                                    "embedding call failed, aborting run"
                                );
                                self.progress.fail(error.to_string());
                                return Err(PipelineError::Embedding(error));
                            }
                        };
                        items[index].set_embedding(vector);
                        updated.push(items[index].clone());
                        outcome.embedded += 1;
                    }
                }
                self.progress.advance();
                tokio::task::yield_now().await;
            }
        }

        // One-shot persistence: only a fully processed category is
        // flushed. Records the run skipped carry no new state.
        repository.upsert_many(&updated)?;

        info!(
            category = %self.category,
            embedded = outcome.embedded,
            skipped = outcome.skipped,
            "embedding generation complete"
        );
        self.progress.finish(format!(
            "{}: {} embedded, {} skipped",
            self.category, outcome.embedded, outcome.skipped
        ));
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use companion_embeddings::{BackendStatus, EmbeddingError, StatusCell};
    use companion_storage::{FlatRepository, KeyedStore, MemoryStore, RecordRepository};
    use companion_types::MemoryRecord;

    /// Backend that embeds deterministically and can be scripted to fail
    /// when the text contains a marker.
    struct MockBackend {
        status: StatusCell,
        calls: AtomicUsize,
        fail_on: Option<String>,
    }

    impl MockBackend {
        fn ready() -> Self {
            let status = StatusCell::new();
            status.begin_loading();
            status.mark_ready();
            Self {
                status,
                calls: AtomicUsize::new(0),
                fail_on: None,
            }
        }

        fn failing_on(marker: &str) -> Self {
            let mut backend = Self::ready();
            backend.fail_on = Some(marker.to_string());
            backend
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EmbeddingBackend for MockBackend {
        async fn initialize(&self) -> Result<(), EmbeddingError> {
            Ok(())
        }

        fn status(&self) -> BackendStatus {
            self.status.get()
        }

        async fn embed_text(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(marker) = &self.fail_on {
                if text.contains(marker) {
                    return Err(EmbeddingError::Backend("model exploded".to_string()));
                }
            }
            Ok(vec![text.len() as f32, 1.0])
        }
    }

    fn memory_repo() -> (Arc<dyn KeyedStore>, FlatRepository<MemoryRecord>) {
        let store: Arc<dyn KeyedStore> = Arc::new(MemoryStore::new());
        let repo = FlatRepository::new(Arc::clone(&store), "test_memories");
        (store, repo)
    }

    fn pipeline(backend: Arc<dyn EmbeddingBackend>) -> EmbeddingPipeline {
        EmbeddingPipeline::new(Category::Memory, backend, PipelineConfig::default())
    }

    #[tokio::test]
    async fn test_pending_only_items_are_sent() {
        // Scenario: two memories already embedded, one pending.
        let backend = Arc::new(MockBackend::ready());
        let pipeline = pipeline(backend.clone());
        let (_, repo) = memory_repo();

        let mut a = MemoryRecord::new("first");
        a.embedding = vec![1.0, 0.0];
        let mut b = MemoryRecord::new("second");
        b.embedding = vec![0.0, 1.0];
        let c = MemoryRecord::new("third");

        let mut items = vec![a, b, c];
        let outcome = pipeline.generate(&mut items, &repo).await.unwrap();

        assert_eq!(backend.call_count(), 1);
        assert_eq!(outcome.pending, 1);
        assert_eq!(outcome.embedded, 1);
        assert!(items[2].has_embedding());
        // Already embedded vectors are untouched.
        assert_eq!(items[0].embedding, vec![1.0, 0.0]);
        assert_eq!(pipeline.progress().pending, 0);
    }

    #[tokio::test]
    async fn test_idempotent_when_fully_embedded() {
        let backend = Arc::new(MockBackend::ready());
        let pipeline = pipeline(backend.clone());
        let (store, repo) = memory_repo();

        let mut a = MemoryRecord::new("first");
        a.embedding = vec![1.0];
        let mut items = vec![a];

        let outcome = pipeline.generate(&mut items, &repo).await.unwrap();
        assert!(outcome.already_complete());
        assert_eq!(backend.call_count(), 0);
        // Nothing was persisted either.
        assert!(store.get("test_memories").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_blank_content_skipped_but_counted() {
        let backend = Arc::new(MockBackend::ready());
        let pipeline = pipeline(backend.clone());
        let (_, repo) = memory_repo();

        let mut items = vec![MemoryRecord::new("   "), MemoryRecord::new("real content")];
        let outcome = pipeline.generate(&mut items, &repo).await.unwrap();

        assert_eq!(backend.call_count(), 1);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.embedded, 1);
        assert_eq!(pipeline.progress().processed, 2);
        assert!(!items[0].has_embedding());
    }

    #[tokio::test]
    async fn test_failure_aborts_without_persisting() {
        let backend = Arc::new(MockBackend::failing_on("poison"));
        let pipeline = pipeline(backend.clone());
        let (store, repo) = memory_repo();

        let mut items = vec![
            MemoryRecord::new("fine"),
            MemoryRecord::new("poison pill"),
            MemoryRecord::new("never reached"),
        ];
        let error = pipeline.generate(&mut items, &repo).await.unwrap_err();
        assert!(matches!(error, PipelineError::Embedding(_)));
        assert!(error.to_string().contains("model exploded"));

        // The first item kept its in-memory embedding, the third was
        // never attempted, and nothing was flushed.
        assert!(items[0].has_embedding());
        assert!(!items[2].has_embedding());
        assert_eq!(backend.call_count(), 2);
        assert!(store.get("test_memories").unwrap().is_none());
        assert!(!pipeline.progress().running);
    }

    #[tokio::test]
    async fn test_rerun_after_failure_resumes() {
        let backend = Arc::new(MockBackend::failing_on("poison"));
        let pipeline = pipeline(backend.clone());
        let (_, repo) = memory_repo();

        let mut items = vec![
            MemoryRecord::new("fine"),
            MemoryRecord::new("poison pill"),
            MemoryRecord::new("tail"),
        ];
        pipeline.generate(&mut items, &repo).await.unwrap_err();
        assert_eq!(backend.call_count(), 2);

        // Heal the record and re-run: only the still-missing items go out.
        items[1].content = "healed".to_string();
        let outcome = pipeline.generate(&mut items, &repo).await.unwrap();
        assert_eq!(outcome.pending, 2);
        assert_eq!(outcome.embedded, 2);
        // 2 calls in the first run, 2 in the second; "fine" never resent.
        assert_eq!(backend.call_count(), 4);
    }

    #[tokio::test]
    async fn test_persists_after_full_run() {
        let backend = Arc::new(MockBackend::ready());
        let pipeline = pipeline(backend);
        let (_, repo) = memory_repo();

        let mut items = vec![MemoryRecord::new("alpha"), MemoryRecord::new("beta")];
        pipeline.generate(&mut items, &repo).await.unwrap();

        let persisted = repo.load().unwrap();
        assert_eq!(persisted.len(), 2);
        assert!(persisted.iter().all(|m| !m.embedding.is_empty()));
    }

    #[tokio::test]
    async fn test_not_ready_backend_rejected_when_work_exists() {
        let backend = Arc::new(MockBackend {
            status: StatusCell::new(),
            calls: AtomicUsize::new(0),
            fail_on: None,
        });
        let pipeline = pipeline(backend.clone());
        let (_, repo) = memory_repo();

        // No pending work: fine without a backend.
        let mut embedded = vec![{
            let mut m = MemoryRecord::new("x");
            m.embedding = vec![1.0];
            m
        }];
        pipeline.generate(&mut embedded, &repo).await.unwrap();

        // Pending work: rejected before any call.
        let mut items = vec![MemoryRecord::new("y")];
        let error = pipeline.generate(&mut items, &repo).await.unwrap_err();
        assert!(matches!(error, PipelineError::BackendNotReady));
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_processing_preserves_collection_order() {
        let backend = Arc::new(MockBackend::ready());
        let pipeline = EmbeddingPipeline::new(
            Category::Memory,
            backend,
            PipelineConfig::default().with_chunk_size(2),
        );
        let (_, repo) = memory_repo();

        let mut items: Vec<MemoryRecord> = (0..5)
            .map(|i| MemoryRecord::new(format!("memory number {i}")))
            .collect();
        let outcome = pipeline.generate(&mut items, &repo).await.unwrap();

        assert_eq!(outcome.embedded, 5);
        // Mock embeds by text length; order of content is unchanged.
        for (i, item) in items.iter().enumerate() {
            assert_eq!(item.content, format!("memory number {i}"));
            assert!(item.has_embedding());
        }
    }
}
