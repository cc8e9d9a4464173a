//! Cancellable deferred rebuild task.
//!
//! Graph rebuilds are deferred a short delay so the host can paint a
//! loading indicator before the O(n²) work starts. Scheduling a new
//! rebuild cancels the superseded one, so a rapid sequence of threshold
//! changes computes only the final graph.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Single-slot scheduler: at most one pending rebuild at a time.
#[derive(Debug, Default)]
pub struct RebuildScheduler {
    current: Mutex<Option<CancellationToken>>,
}

impl RebuildScheduler {
    /// Create an idle scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `task` to run after `delay`, cancelling any rebuild that
    /// is still waiting out its delay.
    ///
    /// Cancellation only wins during the delay window; once the task body
    /// starts it runs to completion.
    pub fn schedule<F>(&self, delay: Duration, task: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let previous = {
            let mut slot = self
                .current
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            slot.replace(token.clone())
        };
        if let Some(previous) = previous {
            previous.cancel();
        }

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("superseded rebuild cancelled");
                }
                _ = tokio::time::sleep(delay) => {
                    task.await;
                }
            }
        })
    }

    /// Cancel the pending rebuild, if any.
    pub fn cancel(&self) {
        let token = {
            let mut slot = self
                .current
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            slot.take()
        };
        if let Some(token) = token {
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_task_runs_after_delay() {
        let scheduler = RebuildScheduler::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let counter = runs.clone();
        let handle = scheduler.schedule(Duration::from_millis(50), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        handle.await.unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_reschedule_cancels_superseded() {
        let scheduler = RebuildScheduler::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let first = {
            let counter = runs.clone();
            scheduler.schedule(Duration::from_millis(50), async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        };
        let second = {
            let counter = runs.clone();
            scheduler.schedule(Duration::from_millis(50), async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        };

        first.await.unwrap();
        second.await.unwrap();

        // Only the last scheduled rebuild ran.
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_cancel() {
        let scheduler = RebuildScheduler::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let counter = runs.clone();
        let handle = scheduler.schedule(Duration::from_millis(50), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        scheduler.cancel();

        handle.await.unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
}
