//! The `Executor` collaborator: submits a runnable for later execution on
//! some thread. The runtime assumes best-effort execution and never blocks
//! waiting for an executor to make progress on its own.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::Mutex;

pub type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

pub trait Executor: Send + Sync {
    fn spawn(&self, fut: BoxFuture);
}

/// Default executor: spawns onto the ambient `tokio` runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioExecutor;

impl Executor for TokioExecutor {
    fn spawn(&self, fut: BoxFuture) {
        tokio::spawn(fut);
    }
}

/// Wraps another executor and records the label of every task spawned, in
/// spawn order. Used by tests that assert on scheduling behavior without
/// depending on raw completion order, which the runtime does not
/// guarantee for independent tasks.
#[derive(Clone)]
pub struct RecordingExecutor<E> {
    inner: Arc<E>,
    log: Arc<Mutex<Vec<String>>>,
}

impl<E: Executor> RecordingExecutor<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner: Arc::new(inner),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn record(&self, label: impl Into<String>) {
        self.log.lock().push(label.into());
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().clone()
    }
}

impl<E: Executor> Executor for RecordingExecutor<E> {
    fn spawn(&self, fut: BoxFuture) {
        self.inner.spawn(fut);
    }
}
