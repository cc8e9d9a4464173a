//! Batch orchestration across the four category pipelines.
//!
//! One orchestrator owns the exclusivity guard, the per-category
//! pipelines, and the published status. Phases run strictly in order
//! (memory, character, lorebook entry, style); the first failure stops
//! the run and later phases never execute.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{watch, RwLock};
use tracing::{error, info};

use companion_embeddings::EmbeddingBackend;
use companion_storage::{
    FlatRepository, KeyedStore, LorebookRepository, MemoryShardRepository, CHARACTERS_KEY,
    STYLE_PREFERENCES_KEY,
};
use companion_types::{Category, Character, CollectionSet, LorebookEntry, StylePreference};

use crate::error::PipelineError;
use crate::pipeline::{EmbeddingPipeline, GenerateOutcome, PipelineConfig};
use crate::progress::CategoryProgress;

/// Orchestrator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Pipeline settings shared by all four categories
    pub pipeline: PipelineConfig,

    /// How long a final status stays visible before the orchestrator
    /// returns to idle (default: 5000 ms)
    pub idle_reset_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            idle_reset_ms: 5_000,
        }
    }
}

impl OrchestratorConfig {
    /// Set the idle-reset delay in milliseconds.
    pub fn with_idle_reset_ms(mut self, idle_reset_ms: u64) -> Self {
        self.idle_reset_ms = idle_reset_ms;
        self
    }

    /// Set the pipeline configuration.
    pub fn with_pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.pipeline = pipeline;
        self
    }
}

/// Coarse orchestrator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Nothing running, no message
    Idle,
    /// A batch run is in progress
    Running,
    /// Last run finished; message still visible
    Completed,
    /// Last run failed; message still visible
    Failed,
}

/// Published orchestrator status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    /// Coarse state
    pub state: RunState,

    /// Human-readable status line; `None` when idle
    pub message: Option<String>,
}

impl OrchestratorStatus {
    /// The idle status: no run, no message.
    pub fn idle() -> Self {
        Self {
            state: RunState::Idle,
            message: None,
        }
    }

    fn running(message: String) -> Self {
        Self {
            state: RunState::Running,
            message: Some(message),
        }
    }

    fn completed(message: String) -> Self {
        Self {
            state: RunState::Completed,
            message: Some(message),
        }
    }

    fn failed(message: String) -> Self {
        Self {
            state: RunState::Failed,
            message: Some(message),
        }
    }
}

/// Result of a `run_all` request.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Every phase completed
    Completed {
        /// Total records embedded across all phases
        embedded: usize,
    },
    /// Preconditions not met; nothing ran
    Rejected {
        /// User-facing reason
        reason: String,
    },
    /// A phase failed; later phases never ran
    Failed {
        /// The failing phase
        phase: Category,
        /// The failure message, verbatim
        message: String,
    },
}

/// RAII release of the exclusivity flag, also on early return.
struct RunGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Runs the four category pipelines as one exclusive batch.
pub struct BatchOrchestrator {
    backend: Arc<dyn EmbeddingBackend>,
    collections: Arc<RwLock<CollectionSet>>,

    memory_pipeline: EmbeddingPipeline,
    character_pipeline: EmbeddingPipeline,
    lorebook_pipeline: EmbeddingPipeline,
    style_pipeline: EmbeddingPipeline,

    memory_repo: MemoryShardRepository,
    character_repo: FlatRepository<Character>,
    lorebook_repo: LorebookRepository,
    style_repo: FlatRepository<StylePreference>,

    running: Arc<AtomicBool>,
    run_seq: Arc<AtomicU64>,
    status_tx: watch::Sender<OrchestratorStatus>,
    idle_reset: Duration,
}

impl BatchOrchestrator {
    /// Create an orchestrator over the backend, store, and in-memory
    /// collections.
    pub fn new(
        backend: Arc<dyn EmbeddingBackend>,
        store: Arc<dyn KeyedStore>,
        collections: Arc<RwLock<CollectionSet>>,
        config: OrchestratorConfig,
    ) -> Self {
        let pipeline = |category| {
            EmbeddingPipeline::new(category, Arc::clone(&backend), config.pipeline.clone())
        };
        let memory_pipeline = pipeline(Category::Memory);
        let character_pipeline = pipeline(Category::Character);
        let lorebook_pipeline = pipeline(Category::LorebookEntry);
        let style_pipeline = pipeline(Category::StylePreference);
        let (status_tx, _) = watch::channel(OrchestratorStatus::idle());

        Self {
            memory_pipeline,
            character_pipeline,
            lorebook_pipeline,
            style_pipeline,

            memory_repo: MemoryShardRepository::new(Arc::clone(&store)),
            character_repo: FlatRepository::new(Arc::clone(&store), CHARACTERS_KEY),
            lorebook_repo: LorebookRepository::new(Arc::clone(&store)),
            style_repo: FlatRepository::new(store, STYLE_PREFERENCES_KEY),

            backend,
            collections,
            running: Arc::new(AtomicBool::new(false)),
            run_seq: Arc::new(AtomicU64::new(0)),
            status_tx,
            idle_reset: Duration::from_millis(config.idle_reset_ms),
        }
    }

    /// Whether any pipeline run is active.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Snapshot the published status.
    pub fn status(&self) -> OrchestratorStatus {
        self.status_tx.borrow().clone()
    }

    /// Subscribe to status updates.
    pub fn subscribe(&self) -> watch::Receiver<OrchestratorStatus> {
        self.status_tx.subscribe()
    }

    /// Snapshot one category's pipeline progress.
    pub fn progress(&self, category: Category) -> CategoryProgress {
        self.pipeline_for(category).progress()
    }

    /// Run all four category pipelines in order.
    ///
    /// Precondition violations (backend not ready, run already active)
    /// are rejected with a message, not an error.
    pub async fn run_all(&self) -> RunOutcome {
        if !self.backend.status().is_ready() {
            return RunOutcome::Rejected {
                reason: "embedding backend is not ready".to_string(),
            };
        }
        let Some(_guard) = self.try_begin() else {
            return RunOutcome::Rejected {
                reason: "embedding generation is already running".to_string(),
            };
        };
        let seq = self.run_seq.fetch_add(1, Ordering::SeqCst) + 1;

        info!("starting batch embedding run");
        let mut embedded = 0;
        for category in Category::PHASE_ORDER {
            self.publish(OrchestratorStatus::running(format!(
                "Generating embeddings for {category}"
            )));

            match self.run_phase(category).await {
                Ok(outcome) => embedded += outcome.embedded,
                Err(e) => {
                    let message = e.to_string();
                    error!(phase = %category, error = %message, "batch embedding run failed");
                    self.publish(OrchestratorStatus::failed(format!(
                        "embedding {category} failed: {message}"
                    )));
                    self.schedule_idle_reset(seq);
                    return RunOutcome::Failed {
                        phase: category,
                        message,
                    };
                }
            }
        }

        info!(embedded = embedded, "batch embedding run complete");
        self.publish(OrchestratorStatus::completed(format!(
            "Embedding generation complete: {embedded} records embedded"
        )));
        self.schedule_idle_reset(seq);
        RunOutcome::Completed { embedded }
    }

    fn pipeline_for(&self, category: Category) -> &EmbeddingPipeline {
        match category {
            Category::Memory => &self.memory_pipeline,
            Category::Character => &self.character_pipeline,
            Category::LorebookEntry => &self.lorebook_pipeline,
            Category::StylePreference => &self.style_pipeline,
        }
    }

    async fn run_phase(&self, category: Category) -> Result<GenerateOutcome, PipelineError> {
        match category {
            Category::Memory => {
                let mut collections = self.collections.write().await;
                self.memory_pipeline
                    .generate(&mut collections.memories, &self.memory_repo)
                    .await
            }
            Category::Character => {
                let mut collections = self.collections.write().await;
                self.character_pipeline
                    .generate(&mut collections.characters, &self.character_repo)
                    .await
            }
            Category::LorebookEntry => self.run_lorebook_phase().await,
            Category::StylePreference => {
                let mut collections = self.collections.write().await;
                self.style_pipeline
                    .generate(&mut collections.style_preferences, &self.style_repo)
                    .await
            }
        }
    }

    /// Lorebook entries live nested inside books: flatten them out for
    /// the pipeline, then write results back into their parent books.
    async fn run_lorebook_phase(&self) -> Result<GenerateOutcome, PipelineError> {
        let mut collections = self.collections.write().await;
        let mut entries: Vec<LorebookEntry> = collections
            .lorebooks
            .iter()
            .flat_map(|book| book.entries.iter().cloned())
            .collect();

        let result = self
            .lorebook_pipeline
            .generate(&mut entries, &self.lorebook_repo)
            .await;

        // Reconcile the aggregate even when the run failed, so entries
        // embedded before the failure keep their vectors in memory like
        // every other category.
        for entry in entries {
            let slot = collections
                .lorebooks
                .iter_mut()
                .flat_map(|book| book.entries.iter_mut())
                .find(|e| e.id == entry.id);
            if let Some(slot) = slot {
                *slot = entry;
            }
        }
        result
    }

    fn try_begin(&self) -> Option<RunGuard> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            Some(RunGuard {
                flag: Arc::clone(&self.running),
            })
        } else {
            None
        }
    }

    fn publish(&self, status: OrchestratorStatus) {
        self.status_tx.send_replace(status);
    }

    /// Clear the final status after the idle delay, unless a newer run
    /// has started in the meantime.
    fn schedule_idle_reset(&self, seq: u64) {
        let status_tx = self.status_tx.clone();
        let run_seq = Arc::clone(&self.run_seq);
        let delay = self.idle_reset;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if run_seq.load(Ordering::SeqCst) == seq {
                status_tx.send_replace(OrchestratorStatus::idle());
            }
        });
    }
}
