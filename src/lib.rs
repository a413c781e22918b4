//! A transactional, modular service container.
//!
//! Services are installed through a [`service::ServiceBuilder`] bound to an
//! update [`transaction::Transaction`]; each installed
//! [`service::ServiceController`] converges to a stable running state
//! driven by four orthogonal inputs — admission mode, unsatisfied
//! dependency count, demand count, and enable flags — and issues
//! start/stop/remove task subgraphs onto the transaction's
//! [`task::TaskGraph`] as those inputs change. A transaction's mutations
//! only take effect once it is prepared and committed; aborting reverts
//! every task that ran, in reverse topological order.
//!
//! See [`transaction::TransactionController`] for the top-level entry
//! point: it issues read and update transactions and serialises update
//! transactions against each other.

pub mod config;
pub mod dependency;
pub mod deps_validation;
pub mod error;
pub mod listener;
pub mod name;
pub mod problem;
pub mod registry;
pub mod service;
pub mod task;
pub mod telemetry;
pub mod transaction;

pub use config::ContainerConfig;
pub use dependency::{DependencyEdge, Polarity};
pub use deps_validation::DependenciesValidationListener;
pub use error::ContainerError;
pub use listener::{Listener, NotificationQueue};
pub use name::{NameError, ServiceName};
pub use problem::{Problem, ProblemReport, Severity};
pub use registry::{Registration, ServiceRegistry};
pub use service::{
    Service, ServiceBuilder, ServiceContext, ServiceController, ServiceMode, ServiceOutcome,
    ServiceState, StartContext, StopContext,
};
pub use task::{
    Executor, ExecuteContext, RecordingExecutor, Task, TaskCommit, TaskContext, TaskExecute,
    TaskGraph, TaskId, TaskOutcome, TaskRevert, TaskSpec, TaskState, TaskValidate, TokioExecutor,
};
pub use transaction::{
    PostPrepareListener, PostRestartListener, ReadTransactionHandle, Transaction, TransactionController,
    TransactionKind, TransactionPhase, UpdateTransactionHandle,
};
