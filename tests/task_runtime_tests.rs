//! Direct exercises of the task DAG's EXECUTE/PREPARE/COMMIT/REVERT
//! ordering guarantees (T1–T4), independent of the service layer above it.

mod common;

use std::sync::Arc;

use common::{CallLog, LoggingExecute, LoggingRevert, SelfCancellingExecute};
use container::{TaskSpec, TokioExecutor, Transaction, TransactionKind};

fn new_transaction() -> Arc<Transaction> {
    Transaction::new(TransactionKind::Update, Arc::new(TokioExecutor))
}

/// Scenario 6: abort reverts in reverse order. e0 → e1, then abort;
/// expected call order is e0, e1, r1, r0.
#[tokio::test]
async fn abort_reverts_in_reverse_topological_order() {
    let log = CallLog::new();
    let txn = new_transaction();

    let e0 = txn.add_task(
        TaskSpec::new("e0", LoggingExecute::new("e0", log.clone()))
            .with_revert(LoggingRevert::new("r0", log.clone())),
    );
    txn.add_task(
        TaskSpec::new("e1", LoggingExecute::new("e1", log.clone()))
            .after(vec![e0])
            .with_revert(LoggingRevert::new("r1", log.clone())),
    );

    txn.prepare().await.unwrap();
    txn.abort().await.unwrap();

    assert_eq!(log.events(), vec!["e0", "e1", "r1", "r0"]);
}

/// T3: a task that self-cancels during EXECUTE never has its revert hook
/// invoked, while its predecessor's revert still runs on abort.
#[tokio::test]
async fn cancelled_task_has_no_revert() {
    let log = CallLog::new();
    let txn = new_transaction();

    let e0 = txn.add_task(
        TaskSpec::new("e0", LoggingExecute::new("e0", log.clone()))
            .with_revert(LoggingRevert::new("r0", log.clone())),
    );
    txn.add_task(
        TaskSpec::new("e1", SelfCancellingExecute::new("e1", log.clone()))
            .after(vec![e0])
            .with_revert(LoggingRevert::new("r1-should-not-run", log.clone())),
    );

    txn.prepare().await.unwrap();
    txn.abort().await.unwrap();

    assert_eq!(log.events(), vec!["e0", "e1", "r0"]);
}

/// T4: commit invokes every non-cancelled task's commit hook exactly once,
/// in topological order.
#[tokio::test]
async fn commit_runs_hooks_in_topological_order() {
    let log = CallLog::new();
    let txn = new_transaction();

    let e0 = txn.add_task(
        TaskSpec::new("e0", LoggingExecute::new("e0", log.clone()))
            .with_commit(common::LoggingCommit::new("c0", log.clone())),
    );
    txn.add_task(
        TaskSpec::new("e1", LoggingExecute::new("e1", log.clone()))
            .after(vec![e0])
            .with_commit(common::LoggingCommit::new("c1", log.clone())),
    );

    txn.prepare().await.unwrap();
    assert!(txn.can_commit());
    txn.commit().await.unwrap();

    assert_eq!(log.events(), vec!["e0", "e1", "c0", "c1"]);
}

/// An `Error`-severity problem attached during EXECUTE blocks commit; the
/// caller must abort instead.
#[tokio::test]
async fn error_problem_blocks_commit() {
    let txn = new_transaction();
    txn.add_task(TaskSpec::new(
        "reports-error",
        Arc::new(ReportErrorExecute),
    ));

    txn.prepare().await.unwrap();
    assert!(!txn.can_commit());
    let err = txn.commit().await.expect_err("commit must be refused");
    assert!(matches!(err, container::ContainerError::InvalidTransactionState(_)));

    txn.abort().await.unwrap();
}

struct ReportErrorExecute;

#[async_trait::async_trait]
impl container::TaskExecute for ReportErrorExecute {
    async fn execute(&self, ctx: &container::ExecuteContext<'_>) -> container::TaskOutcome {
        ctx.problems().add(container::Problem::error("something went wrong"));
        container::TaskOutcome::Completed
    }
}

/// A task spawned as a child from inside `execute` is itself a predecessor
/// of the parent's own completion: COMMIT runs parent before child, and
/// REVERT (on abort) runs child before parent — the topological order is a
/// property of the graph shape, not a race between the two execute bodies.
#[tokio::test]
async fn parent_child_commit_and_revert_order() {
    let log = CallLog::new();
    let txn = new_transaction();

    txn.add_task(
        TaskSpec::new("parent", Arc::new(SpawningExecute { log: log.clone() }))
            .with_commit(common::LoggingCommit::new("parent-commit", log.clone()))
            .with_revert(LoggingRevert::new("parent-revert", log.clone())),
    );

    txn.prepare().await.unwrap();
    assert!(txn.can_commit());
    txn.commit().await.unwrap();

    assert_eq!(log.events(), vec!["parent-commit", "child-commit"]);
}

#[tokio::test]
async fn parent_child_revert_order_on_abort() {
    let log = CallLog::new();
    let txn = new_transaction();

    txn.add_task(
        TaskSpec::new("parent", Arc::new(SpawningExecute { log: log.clone() }))
            .with_revert(LoggingRevert::new("parent-revert", log.clone())),
    );

    txn.prepare().await.unwrap();
    txn.abort().await.unwrap();

    assert_eq!(log.events(), vec!["child-revert", "parent-revert"]);
}

struct SpawningExecute {
    log: CallLog,
}

#[async_trait::async_trait]
impl container::TaskExecute for SpawningExecute {
    async fn execute(&self, ctx: &container::ExecuteContext<'_>) -> container::TaskOutcome {
        ctx.spawn_child(
            TaskSpec::new("child", LoggingExecute::new("child", self.log.clone()))
                .with_commit(common::LoggingCommit::new("child-commit", self.log.clone()))
                .with_revert(LoggingRevert::new("child-revert", self.log.clone())),
        );
        container::TaskOutcome::Completed
    }
}
