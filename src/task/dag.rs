//! The task DAG: scheduling, the EXECUTE wave, and topological COMMIT/REVERT.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use futures::future;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::task::executor::BoxFuture;
use crate::task::task::{ExecuteContext, Task, TaskContext, TaskId, TaskOutcome, TaskSpec};
use crate::task::state::TaskState;
use crate::transaction::transaction::Transaction;

/// The DAG of tasks belonging to one transaction.
///
/// Owned by [`Transaction`]; every method that needs to act on behalf of a
/// task (spawn it, report its problems) takes `&Arc<Transaction>` rather
/// than holding one itself, since `Transaction` owns this graph and an
/// `Arc<Transaction>` field here would be a reference cycle.
pub struct TaskGraph {
    tasks: DashMap<TaskId, Arc<Task>>,
    order: Mutex<Vec<TaskId>>,
    pending: AtomicUsize,
    idle: Notify,
    root_cancel: Mutex<CancellationToken>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self {
            tasks: DashMap::new(),
            order: Mutex::new(Vec::new()),
            pending: AtomicUsize::new(0),
            idle: Notify::new(),
            root_cancel: Mutex::new(CancellationToken::new()),
        }
    }

    fn root_cancel(&self) -> CancellationToken {
        self.root_cancel.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn task(&self, id: TaskId) -> Option<Arc<Task>> {
        self.tasks.get(&id).map(|t| Arc::clone(&t))
    }

    /// Submit a top-level task (no parent).
    pub fn add_task(&self, transaction: &Arc<Transaction>, spec: TaskSpec) -> TaskId {
        let task = Task::new(spec, None, &self.root_cancel());
        self.spawn(transaction, task)
    }

    /// Submit a task that is a child of `parent`. The parent is not
    /// considered EXECUTED until this child has itself terminated.
    pub fn add_child(&self, transaction: &Arc<Transaction>, parent: TaskId, spec: TaskSpec) -> TaskId {
        let parent_cancel = self
            .task(parent)
            .map(|p| p.cancel.clone())
            .unwrap_or_else(|| self.root_cancel());
        let task = Task::new(spec, Some(parent), &parent_cancel);
        let id = task.id;
        if let Some(p) = self.task(parent) {
            p.children.lock().push(id);
        }
        self.spawn(transaction, task)
    }

    fn spawn(&self, transaction: &Arc<Transaction>, task: Arc<Task>) -> TaskId {
        let id = task.id;
        self.pending.fetch_add(1, Ordering::AcqRel);
        self.order.lock().push(id);
        self.tasks.insert(id, Arc::clone(&task));
        let txn = Arc::clone(transaction);
        let fut: BoxFuture = Box::pin(run_task(txn, task));
        transaction.executor().spawn(fut);
        id
    }

    pub(crate) fn mark_terminal(&self) {
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }

    /// Await until every currently-scheduled task has terminated
    /// (EXECUTED or CANCELLED).
    pub async fn wait_idle(&self) {
        loop {
            if self.pending.load(Ordering::Acquire) == 0 {
                return;
            }
            let notified = self.idle.notified();
            if self.pending.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Cancel every task's token — tasks that have not yet entered EXECUTE
    /// will observe this and transition straight to CANCELLED; tasks
    /// already running are unaffected (cancellation is never preemptive).
    pub fn cancel_all(&self) {
        self.root_cancel().cancel();
    }

    /// Drop every task, ready for a `restart`'s cleared task set. A fresh
    /// `root_cancel` token replaces the one `cancel_all` just cancelled —
    /// otherwise every task spawned after `restart` would be a child of an
    /// already-cancelled token and would never reach EXECUTE.
    pub fn reset(&self) {
        self.tasks.clear();
        self.order.lock().clear();
        self.pending.store(0, Ordering::Release);
        *self.root_cancel.lock() = CancellationToken::new();
    }

    /// Topological order over the combined predecessor and parent-before-
    /// child edge sets, stable on insertion order among equally-ready
    /// tasks. The graph is acyclic by construction: every predecessor and
    /// parent already exists at the time a task is created.
    pub(crate) fn topo_order(&self) -> Vec<Arc<Task>> {
        let order_snapshot = self.order.lock().clone();
        let index_of: FxHashMap<TaskId, usize> = order_snapshot
            .iter()
            .enumerate()
            .map(|(i, id)| (*id, i))
            .collect();

        let mut indegree: FxHashMap<TaskId, usize> =
            order_snapshot.iter().map(|id| (*id, 0usize)).collect();
        let mut adjacency: FxHashMap<TaskId, Vec<TaskId>> = FxHashMap::default();

        for id in &order_snapshot {
            let task = match self.tasks.get(id) {
                Some(t) => t,
                None => continue,
            };
            let mut deps = task.predecessors.clone();
            if let Some(parent) = task.parent {
                deps.push(parent);
            }
            for dep in deps {
                adjacency.entry(dep).or_default().push(*id);
                *indegree.entry(*id).or_insert(0) += 1;
            }
        }

        let mut ready: Vec<TaskId> = order_snapshot
            .iter()
            .copied()
            .filter(|id| indegree.get(id).copied().unwrap_or(0) == 0)
            .collect();
        let mut result = Vec::with_capacity(order_snapshot.len());

        while !ready.is_empty() {
            ready.sort_by_key(|id| index_of[id]);
            let id = ready.remove(0);
            if let Some(task) = self.tasks.get(&id) {
                result.push(Arc::clone(&task));
            }
            if let Some(successors) = adjacency.get(&id) {
                for succ in successors {
                    if let Some(slot) = indegree.get_mut(succ) {
                        *slot -= 1;
                        if *slot == 0 {
                            ready.push(*succ);
                        }
                    }
                }
            }
        }

        result
    }

    /// Validate every terminal, non-cancelled task (order unconstrained by
    /// the distilled spec, run sequentially here for deterministic tests).
    pub async fn run_validate(&self, transaction: &Arc<Transaction>) {
        for task in self.topo_order() {
            if task.state().is_cancelled() {
                continue;
            }
            *task.state.lock() = TaskState::Validating;
            if let Some(hook) = task.validate_hook() {
                let cx = TaskContext {
                    task_id: task.id,
                    transaction,
                };
                hook.validate(&cx).await;
            }
            *task.state.lock() = TaskState::Validated;
        }
    }

    /// Commit every non-cancelled task in topological order (predecessors
    /// before successors, parent before children) — T4.
    pub async fn run_commit(&self, transaction: &Arc<Transaction>) {
        for task in self.topo_order() {
            if task.state().is_cancelled() {
                continue;
            }
            *task.state.lock() = TaskState::Committing;
            if let Some(hook) = task.commit_hook() {
                let cx = TaskContext {
                    task_id: task.id,
                    transaction,
                };
                hook.commit(&cx).await;
            }
            *task.state.lock() = TaskState::Done;
        }
    }

    /// Revert every non-cancelled task in reverse topological order
    /// (successors before predecessors, children before parent) — T3.
    pub async fn run_revert(&self, transaction: &Arc<Transaction>) {
        for task in self.topo_order().into_iter().rev() {
            if task.state().is_cancelled() {
                continue;
            }
            *task.state.lock() = TaskState::Reverting;
            if let Some(hook) = task.revert_hook() {
                let cx = TaskContext {
                    task_id: task.id,
                    transaction,
                };
                hook.revert(&cx).await;
            }
            *task.state.lock() = TaskState::Done;
        }
    }
}

impl Default for TaskGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives a single task from creation through its terminal state — T1's
/// ordering guarantee falls out of awaiting the parent's EXECUTE-entry
/// signal and every predecessor's terminal signal before doing anything
/// else.
async fn run_task(transaction: Arc<Transaction>, task: Arc<Task>) {
    if let Some(parent_id) = task.parent {
        if let Some(parent) = transaction.task_graph().task(parent_id) {
            parent.entered_execute.wait().await;
        }
    }
    let predecessors: Vec<Arc<Task>> = task
        .predecessors
        .iter()
        .filter_map(|id| transaction.task_graph().task(*id))
        .collect();
    future::join_all(predecessors.iter().map(|p| p.terminal.wait())).await;

    if task.cancel.is_cancelled() {
        *task.state.lock() = TaskState::Cancelled;
        tracing::trace!(task = task.label, "task cancelled before EXECUTE");
        task.entered_execute.signal();
        task.terminal.signal();
        transaction.task_graph().mark_terminal();
        return;
    }

    *task.state.lock() = TaskState::Executing;
    task.entered_execute.signal();
    tracing::trace!(task = task.label, "task entering EXECUTE");

    let cx = ExecuteContext {
        task_id: task.id,
        transaction: &transaction,
        cancel: task.cancel.clone(),
    };
    let outcome = task.execute_hook().execute(&cx).await;

    match outcome {
        TaskOutcome::Cancelled => {
            *task.state.lock() = TaskState::Cancelled;
            tracing::trace!(task = task.label, "task self-cancelled");
        }
        TaskOutcome::Completed => {
            let children: Vec<Arc<Task>> = task
                .children
                .lock()
                .iter()
                .filter_map(|id| transaction.task_graph().task(*id))
                .collect();
            future::join_all(children.iter().map(|c| c.terminal.wait())).await;
            *task.state.lock() = TaskState::Executed;
            tracing::trace!(task = task.label, "task EXECUTED");
        }
    }
    task.terminal.signal();
    transaction.task_graph().mark_terminal();
}
