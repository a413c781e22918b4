//! The transaction: a task DAG, a problem report, and the phase state
//! machine that drives it from ACTIVE through PREPARE to COMMIT or ABORT.

use std::any::{Any, TypeId};
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::ContainerError;
use crate::name::ServiceName;
use crate::problem::ProblemReport;
use crate::task::{Executor, TaskGraph, TaskId, TaskSpec};
use crate::transaction::hold::{HoldHandle, HoldState};

/// Read transactions may run concurrently with other reads; update
/// transactions are mutually exclusive per controller (enforced by
/// [`crate::transaction::controller::TransactionController`], not here).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    Read,
    Update,
}

/// The distilled spec's phase set, unabridged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionPhase {
    Active,
    Preparing,
    Prepared,
    Committing,
    Committed,
    Aborting,
    Aborted,
    Restarting,
}

/// Invoked once PREPARE has reached a fixed point over the task DAG. May
/// attach further [`crate::problem::Problem`]s (e.g. a missing required
/// dependency) but must not submit further tasks — PREPARE's fixed point
/// is over the task DAG alone.
pub trait PostPrepareListener: Send + Sync {
    fn on_prepare(&self, transaction: &Arc<Transaction>);
}

/// Invoked once a `restart` has cleared the task set and is about to
/// re-enter EXECUTE.
pub trait PostRestartListener: Send + Sync {
    fn on_restart(&self, transaction: &Arc<Transaction>);
}

#[derive(Default)]
struct Attachments {
    values: FxHashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    survivable: FxHashSet<TypeId>,
}

/// One unit of atomic change to the container: either every task's
/// effects apply, or none do.
pub struct Transaction {
    kind: Mutex<TransactionKind>,
    phase: Mutex<TransactionPhase>,
    task_graph: TaskGraph,
    problems: ProblemReport,
    executor: Arc<dyn Executor>,
    touched: Mutex<FxHashSet<ServiceName>>,
    post_prepare: Mutex<Vec<Arc<dyn PostPrepareListener>>>,
    post_restart: Mutex<Vec<Arc<dyn PostRestartListener>>>,
    attachments: Mutex<Attachments>,
    holds: Arc<HoldState>,
}

impl Transaction {
    pub fn new(kind: TransactionKind, executor: Arc<dyn Executor>) -> Arc<Self> {
        Arc::new(Self {
            kind: Mutex::new(kind),
            phase: Mutex::new(TransactionPhase::Active),
            task_graph: TaskGraph::new(),
            problems: ProblemReport::new(),
            executor,
            touched: Mutex::new(FxHashSet::default()),
            post_prepare: Mutex::new(Vec::new()),
            post_restart: Mutex::new(Vec::new()),
            attachments: Mutex::new(Attachments::default()),
            holds: HoldState::new(),
        })
    }

    pub fn kind(&self) -> TransactionKind {
        *self.kind.lock()
    }

    /// Used only by `TransactionController::upgrade`/`downgrade`, which
    /// already hold the exclusivity guard appropriate to the new kind.
    pub(crate) fn set_kind(&self, kind: TransactionKind) {
        *self.kind.lock() = kind;
    }

    /// Pin this transaction in its active phase: `prepare` will not
    /// advance past the active phase while any returned handle is alive.
    pub fn acquire_hold(self: &Arc<Self>) -> HoldHandle {
        self.holds.acquire()
    }

    pub fn phase(&self) -> TransactionPhase {
        *self.phase.lock()
    }

    pub fn executor(&self) -> &Arc<dyn Executor> {
        &self.executor
    }

    pub fn problems(&self) -> &ProblemReport {
        &self.problems
    }

    pub fn task_graph(&self) -> &TaskGraph {
        &self.task_graph
    }

    /// Record that a registration was touched during this transaction, so
    /// the dependencies-validation pass knows what to scan at PREPARE.
    pub fn touch(&self, name: ServiceName) {
        self.touched.lock().insert(name);
    }

    pub fn touched(&self) -> Vec<ServiceName> {
        self.touched.lock().iter().cloned().collect()
    }

    pub fn add_post_prepare_listener(&self, listener: Arc<dyn PostPrepareListener>) {
        self.post_prepare.lock().push(listener);
    }

    pub fn add_post_restart_listener(&self, listener: Arc<dyn PostRestartListener>) {
        self.post_restart.lock().push(listener);
    }

    /// Attach a value under its own type, optionally surviving `restart`.
    pub fn attach<T: Any + Send + Sync>(&self, value: T, survivable: bool) {
        let id = TypeId::of::<T>();
        let mut attachments = self.attachments.lock();
        attachments.values.insert(id, Arc::new(value));
        if survivable {
            attachments.survivable.insert(id);
        } else {
            attachments.survivable.remove(&id);
        }
    }

    pub fn attachment<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let attachments = self.attachments.lock();
        attachments
            .values
            .get(&TypeId::of::<T>())
            .and_then(|v| Arc::clone(v).downcast::<T>().ok())
    }

    /// Submit a top-level task (no parent) to this transaction's DAG.
    pub fn add_task(self: &Arc<Self>, spec: TaskSpec) -> TaskId {
        self.task_graph.add_task(self, spec)
    }

    fn set_phase(&self, phase: TransactionPhase) {
        tracing::debug!(?phase, "transaction phase transition");
        *self.phase.lock() = phase;
    }

    /// Drive the transaction from ACTIVE through a PREPARE fixed point:
    /// wait for the task DAG to go idle, validate every terminal task,
    /// then fire post-prepare listeners. The distilled spec allows a
    /// listener pass to introduce further tasks before the fixed point is
    /// reached; this crate's post-prepare listeners only attach problems
    /// (see `crate::deps_validation`), so one validate-then-listen pass
    /// always suffices — the loop below still re-checks task-count
    /// stability rather than assuming that, in case a future listener
    /// does submit work.
    pub async fn prepare(self: &Arc<Self>) -> Result<(), ContainerError> {
        if self.phase() != TransactionPhase::Active {
            return Err(ContainerError::InvalidTransactionState(
                "prepare is only valid from the active phase",
            ));
        }
        self.holds.wait_released().await;
        self.set_phase(TransactionPhase::Preparing);

        loop {
            self.task_graph.wait_idle().await;
            let before = self.task_graph.len();

            self.task_graph.run_validate(self).await;

            let listeners = self.post_prepare.lock().clone();
            for listener in listeners {
                listener.on_prepare(self);
            }

            self.task_graph.wait_idle().await;
            if self.task_graph.len() == before {
                break;
            }
        }

        self.set_phase(TransactionPhase::Prepared);
        Ok(())
    }

    /// `true` once PREPARE has completed and no `Error`-or-worse problem
    /// has been reported.
    pub fn can_commit(&self) -> bool {
        self.phase() == TransactionPhase::Prepared && self.problems.can_commit()
    }

    pub async fn commit(self: &Arc<Self>) -> Result<(), ContainerError> {
        if self.phase() != TransactionPhase::Prepared {
            return Err(ContainerError::InvalidTransactionState(
                "commit requires the prepared phase",
            ));
        }
        if !self.problems.can_commit() {
            return Err(ContainerError::InvalidTransactionState(
                "commit refused: an error-or-worse problem was reported",
            ));
        }
        self.set_phase(TransactionPhase::Committing);
        self.task_graph.run_commit(self).await;
        self.set_phase(TransactionPhase::Committed);
        Ok(())
    }

    pub async fn abort(self: &Arc<Self>) -> Result<(), ContainerError> {
        match self.phase() {
            TransactionPhase::Committed | TransactionPhase::Aborted => {
                return Err(ContainerError::InvalidTransactionState(
                    "cannot abort a transaction that already reached a terminal phase",
                ));
            }
            _ => {}
        }
        self.set_phase(TransactionPhase::Aborting);
        self.task_graph.cancel_all();
        self.task_graph.wait_idle().await;
        self.task_graph.run_revert(self).await;
        self.set_phase(TransactionPhase::Aborted);
        Ok(())
    }

    /// Revert every task executed so far, clear the task set, and
    /// re-enter the active phase with a clean DAG — survivable
    /// attachments and touched-registration bookkeeping are preserved.
    pub async fn restart(self: &Arc<Self>) -> Result<(), ContainerError> {
        if self.kind() != TransactionKind::Update {
            return Err(ContainerError::InvalidTransactionState(
                "only update transactions may be restarted",
            ));
        }
        self.set_phase(TransactionPhase::Restarting);
        self.task_graph.cancel_all();
        self.task_graph.wait_idle().await;
        self.task_graph.run_revert(self).await;
        self.task_graph.reset();
        self.problems.clear();

        {
            let mut attachments = self.attachments.lock();
            let survivable = attachments.survivable.clone();
            attachments.values.retain(|id, _| survivable.contains(id));
        }

        let listeners = self.post_restart.lock().clone();
        for listener in listeners {
            listener.on_restart(self);
        }

        self.set_phase(TransactionPhase::Active);
        Ok(())
    }
}
