//! Detached execution of pipeline runs.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use futures::future::BoxFuture;
use tracing::debug;

/// Starts a pipeline run without giving the caller a handle to it.
pub trait TaskExecutor: Send + Sync {
    fn spawn(&self, name: &'static str, task: BoxFuture<'static, ()>);
}

/// Runs each task on the ambient tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioExecutor;

impl TaskExecutor for TokioExecutor {
    fn spawn(&self, name: &'static str, task: BoxFuture<'static, ()>) {
        debug!(task = name, "spawning background task");
        tokio::spawn(task);
    }
}

/// Queues tasks until [`DeferredExecutor::run_all`] drives them, in the order
/// they were spawned.
#[derive(Default)]
pub struct DeferredExecutor {
    queue: Mutex<VecDeque<(&'static str, BoxFuture<'static, ()>)>>,
}

impl DeferredExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn pending_names(&self) -> Vec<&'static str> {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, _)| *name)
            .collect()
    }

    /// Runs queued tasks to completion, including tasks they spawn, and returns
    /// how many ran.
    pub async fn run_all(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self
                .queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();
            let Some((_, task)) = next else {
                return ran;
            };
            task.await;
            ran += 1;
        }
    }
}

impl TaskExecutor for DeferredExecutor {
    fn spawn(&self, name: &'static str, task: BoxFuture<'static, ()>) {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back((name, task));
    }
}
