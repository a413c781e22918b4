//! The task entity: one node in a transaction's DAG.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::problem::ProblemReport;
use crate::task::state::TaskState;
use crate::transaction::transaction::Transaction;

/// Opaque task identifier, unique within one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(pub(crate) u64);

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

impl TaskId {
    pub(crate) fn next() -> Self {
        Self(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// What a task's executable signaled when it finished running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The task completed normally; its revert hook (if any) will run on
    /// transaction abort.
    Completed,
    /// The task cancelled itself; its own revert hook will not run, but
    /// this has no effect on its predecessors' reverts.
    Cancelled,
}

/// View handed to a task's `execute` hook: access to the problem report,
/// cancellation, and the ability to submit child tasks.
pub struct ExecuteContext<'a> {
    pub(crate) task_id: TaskId,
    pub(crate) transaction: &'a Arc<Transaction>,
    pub(crate) cancel: CancellationToken,
}

impl<'a> ExecuteContext<'a> {
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn problems(&self) -> &ProblemReport {
        self.transaction.problems()
    }

    pub(crate) fn transaction(&self) -> &'a Arc<Transaction> {
        self.transaction
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Submit a task that is a child of the currently-executing task. The
    /// parent is not considered EXECUTED until every child it submits this
    /// way has itself terminated.
    pub fn spawn_child(&self, spec: TaskSpec) -> TaskId {
        self.transaction
            .task_graph()
            .add_child(self.transaction, self.task_id, spec)
    }
}

/// View handed to a task's `validate`/`commit`/`revert` hooks.
pub struct TaskContext<'a> {
    pub(crate) task_id: TaskId,
    pub(crate) transaction: &'a Arc<Transaction>,
}

impl<'a> TaskContext<'a> {
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn problems(&self) -> &ProblemReport {
        self.transaction.problems()
    }

    pub(crate) fn transaction(&self) -> &'a Arc<Transaction> {
        self.transaction
    }
}

#[async_trait]
pub trait TaskExecute: Send + Sync {
    async fn execute(&self, ctx: &ExecuteContext<'_>) -> TaskOutcome;
}

#[async_trait]
pub trait TaskValidate: Send + Sync {
    async fn validate(&self, ctx: &TaskContext<'_>);
}

#[async_trait]
pub trait TaskCommit: Send + Sync {
    async fn commit(&self, ctx: &TaskContext<'_>);
}

#[async_trait]
pub trait TaskRevert: Send + Sync {
    async fn revert(&self, ctx: &TaskContext<'_>);
}

/// Everything needed to register a new task: its hooks, its predecessors
/// and (for child tasks) an implicit parent.
pub struct TaskSpec {
    pub label: &'static str,
    pub predecessors: Vec<TaskId>,
    pub execute: Arc<dyn TaskExecute>,
    pub validate: Option<Arc<dyn TaskValidate>>,
    pub commit: Option<Arc<dyn TaskCommit>>,
    pub revert: Option<Arc<dyn TaskRevert>>,
}

impl TaskSpec {
    pub fn new(label: &'static str, execute: Arc<dyn TaskExecute>) -> Self {
        Self {
            label,
            predecessors: Vec::new(),
            execute,
            validate: None,
            commit: None,
            revert: None,
        }
    }

    pub fn after(mut self, predecessors: Vec<TaskId>) -> Self {
        self.predecessors = predecessors;
        self
    }

    pub fn with_validate(mut self, hook: Arc<dyn TaskValidate>) -> Self {
        self.validate = Some(hook);
        self
    }

    pub fn with_commit(mut self, hook: Arc<dyn TaskCommit>) -> Self {
        self.commit = Some(hook);
        self
    }

    pub fn with_revert(mut self, hook: Arc<dyn TaskRevert>) -> Self {
        self.revert = Some(hook);
        self
    }
}

/// A oneshot "has this happened yet" flag with an async waiter that never
/// misses a wakeup: callers create the `notified()` future, re-check the
/// flag, and only then await — the same pattern `tokio::sync::Notify`
/// itself documents for exactly this "wait for a one-time event" case.
pub(crate) struct TerminalSignal {
    done: AtomicBool,
    notify: Notify,
}

impl TerminalSignal {
    fn new() -> Self {
        Self {
            done: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    pub(crate) async fn wait(&self) {
        loop {
            if self.done.load(Ordering::Acquire) {
                return;
            }
            let notified = self.notify.notified();
            if self.done.load(Ordering::Acquire) {
                return;
            }
            notified.await;
        }
    }

    pub(crate) fn signal(&self) {
        self.done.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub(crate) fn is_signaled(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }
}

/// One node in a transaction's task DAG.
pub struct Task {
    pub id: TaskId,
    pub label: &'static str,
    pub parent: Option<TaskId>,
    pub predecessors: Vec<TaskId>,
    pub(crate) children: Mutex<Vec<TaskId>>,
    pub(crate) state: Mutex<TaskState>,
    pub(crate) cancel: CancellationToken,
    pub(crate) terminal: TerminalSignal,
    pub(crate) entered_execute: TerminalSignal,
    execute: Arc<dyn TaskExecute>,
    validate: Option<Arc<dyn TaskValidate>>,
    commit: Option<Arc<dyn TaskCommit>>,
    revert: Option<Arc<dyn TaskRevert>>,
}

impl Task {
    pub(crate) fn new(spec: TaskSpec, parent: Option<TaskId>, parent_cancel: &CancellationToken) -> Arc<Self> {
        Arc::new(Self {
            id: TaskId::next(),
            label: spec.label,
            parent,
            predecessors: spec.predecessors,
            children: Mutex::new(Vec::new()),
            state: Mutex::new(TaskState::New),
            cancel: parent_cancel.child_token(),
            terminal: TerminalSignal::new(),
            entered_execute: TerminalSignal::new(),
            execute: spec.execute,
            validate: spec.validate,
            commit: spec.commit,
            revert: spec.revert,
        })
    }

    pub fn state(&self) -> TaskState {
        *self.state.lock()
    }

    pub(crate) fn execute_hook(&self) -> Arc<dyn TaskExecute> {
        Arc::clone(&self.execute)
    }

    pub(crate) fn validate_hook(&self) -> Option<Arc<dyn TaskValidate>> {
        self.validate.clone()
    }

    pub(crate) fn commit_hook(&self) -> Option<Arc<dyn TaskCommit>> {
        self.commit.clone()
    }

    pub(crate) fn revert_hook(&self) -> Option<Arc<dyn TaskRevert>> {
        self.revert.clone()
    }
}
