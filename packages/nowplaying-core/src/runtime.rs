//! Task spawning abstraction.
//!
//! Services that start fire-and-forget work (art cache population, connection
//! handlers) depend on [`TaskSpawner`] instead of calling `tokio::spawn`
//! directly, so the handle they run on is chosen once at bootstrap.

use std::future::Future;

/// Abstraction for spawning background tasks.
///
/// The spawner does not provide a way to cancel or join the spawned task;
/// long-running tasks watch a `CancellationToken` instead.
pub trait TaskSpawner: Send + Sync {
    /// Spawns a future as a background task.
    fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static;
}

/// Tokio-based spawner.
#[derive(Clone)]
pub struct TokioSpawner {
    handle: tokio::runtime::Handle,
}

impl TokioSpawner {
    /// Creates a new `TokioSpawner` with the given runtime handle.
    #[must_use]
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Creates a new `TokioSpawner` using the current runtime's handle.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime context.
    #[must_use]
    pub fn current() -> Self {
        Self {
            handle: tokio::runtime::Handle::current(),
        }
    }
}

impl TaskSpawner for TokioSpawner {
    fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handle.spawn(future);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spawned_task_runs_on_current_handle() {
        let spawner = TokioSpawner::current();
        let (tx, rx) = tokio::sync::oneshot::channel();

        spawner.spawn(async move {
            let _ = tx.send(42u8);
        });

        assert_eq!(rx.await.unwrap(), 42);
    }
}
