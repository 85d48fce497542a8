//! Cancellable task scopes.
//!
//! A [`TaskScope`] belongs to whatever started the work (a view, a command
//! handler). Dropping the scope aborts every task still running in it, so a
//! late completion can never mutate state its owner no longer shows.

use std::future::Future;
use std::sync::{Mutex, MutexGuard};

use tokio::task::{JoinError, JoinSet};

#[derive(Debug, Default)]
pub struct TaskScope {
    tasks: Mutex<JoinSet<()>>,
}

impl TaskScope {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Spawn `fut` on the current runtime, owned by this scope. Tasks that
    /// already finished are reaped first.
    pub fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.lock();
        while let Some(result) = tasks.try_join_next() {
            report(result);
        }
        tasks.spawn(fut);
    }

    /// Abort everything still running.
    pub fn cancel_all(&self) {
        let mut tasks = self.lock();
        if !tasks.is_empty() {
            tracing::debug!(count = tasks.len(), "cancelling scoped tasks");
        }
        tasks.abort_all();
    }

    /// Tasks spawned and not yet reaped. Finished tasks count until the next
    /// [`spawn`](Self::spawn) or [`wait`](Self::wait).
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Wait for every task spawned so far.
    pub async fn wait(&self) {
        let mut tasks = std::mem::take(&mut *self.lock());
        while let Some(result) = tasks.join_next().await {
            report(result);
        }
    }
}

fn report(result: Result<(), JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            tracing::error!(error = %e, "scoped task panicked");
        }
    }
}
