//! Container-wide configuration.
//!
//! There is no file-based configuration layer here — the crate is a
//! library with no CLI or YAML front-end — but every constructor still
//! takes a small, fluent config value, the same shape the teacher
//! codebase's `AgentConfig` uses for its execution knobs.

/// Tunables for a [`crate::transaction::controller::TransactionController`]
/// and the task runtime it drives.
#[derive(Debug, Clone)]
pub struct ContainerConfig {
    /// Expected number of tasks in a typical transaction; used only to
    /// pre-size internal collections.
    pub expected_tasks_per_transaction: usize,
    /// Number of worker threads the default `TokioExecutor` multi-threaded
    /// runtime should use when the container constructs its own runtime
    /// (ignored when the caller supplies an `Executor` backed by an
    /// existing runtime handle).
    pub executor_worker_threads: usize,
}

impl ContainerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_expected_tasks_per_transaction(mut self, n: usize) -> Self {
        self.expected_tasks_per_transaction = n;
        self
    }

    pub fn with_executor_worker_threads(mut self, n: usize) -> Self {
        self.executor_worker_threads = n.max(1);
        self
    }
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            expected_tasks_per_transaction: 16,
            executor_worker_threads: 4,
        }
    }
}
