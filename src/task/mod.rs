//! The task runtime: a DAG of tasks carrying a transaction through
//! EXECUTE, VALIDATE, and COMMIT-or-REVERT.

pub mod dag;
pub mod executor;
pub mod state;
pub mod task;

pub use dag::TaskGraph;
pub use executor::{BoxFuture, Executor, RecordingExecutor, TokioExecutor};
pub use state::TaskState;
pub use task::{
    ExecuteContext, Task, TaskCommit, TaskContext, TaskExecute, TaskId, TaskOutcome, TaskRevert,
    TaskSpec, TaskValidate,
};
