//! Supervised background task registry.

use std::future::Future;
use std::sync::{Mutex, PoisonError};

use tokio::task::JoinSet;

/// Tracks detached background work (pre-generation) so task failures are
/// observable and shutdown can await outstanding tasks instead of dropping
/// them mid-flight.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: Mutex<JoinSet<()>>,
}

impl TaskRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns a detached task. Must be called from within a tokio runtime.
    /// Already-finished tasks are reaped on the way in, so the registry does
    /// not grow with completed work.
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        while let Some(finished) = tasks.try_join_next() {
            if let Err(error) = finished {
                tracing::error!(%error, "background task failed");
            }
        }
        tasks.spawn(future);
    }

    /// Number of tasks not yet reaped.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Awaits every outstanding task. Called during shutdown so in-flight
    /// pre-generation finishes (or fails visibly) before the process exits.
    pub async fn shutdown(&self) {
        let mut tasks = {
            let mut guard = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *guard)
        };
        while let Some(finished) = tasks.join_next().await {
            if let Err(error) = finished {
                tracing::error!(%error, "background task failed during shutdown");
            }
        }
    }
}
