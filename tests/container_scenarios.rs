//! End-to-end scenarios over the full install → prepare → commit pipeline:
//! service admission modes, demand propagation across a dependency chain,
//! live replacement, and registry-wide enable cascades.

mod common;

use std::sync::Arc;

use common::{CallLog, RecordingService};
use container::{
    ContainerError, ServiceContext, ServiceMode, ServiceName, ServiceRegistry, ServiceState,
    TokioExecutor, TransactionController,
};

fn name(path: &str) -> ServiceName {
    ServiceName::parse(path).unwrap()
}

fn controller() -> TransactionController {
    TransactionController::new(Arc::new(TokioExecutor))
}

/// Scenario 1: install-then-start, active mode. A has no dependencies;
/// after prepare+commit it must be UP and `start` called exactly once.
#[tokio::test]
async fn install_then_start_active_mode() {
    let txn_controller = controller();
    let registry = ServiceRegistry::new();
    let log = CallLog::new();

    let update = txn_controller.create_update().await;
    let ctx = ServiceContext::new(Arc::clone(&update.transaction));
    let a = ctx
        .add_service(&registry, name("a"))
        .mode(ServiceMode::Active)
        .service(RecordingService::new("a", log.clone()))
        .install()
        .expect("install should succeed");

    txn_controller
        .prepare(&update)
        .await
        .expect("prepare should succeed");
    assert!(txn_controller.can_commit(&update));
    txn_controller.commit(update).await.expect("commit should succeed");

    assert_eq!(a.state(), ServiceState::Up);
    assert_eq!(log.events(), vec!["a.start"]);
}

/// Scenario 2: linear chain demand propagation. A and B start ON_DEMAND
/// and stay DOWN until a third, ACTIVE service C depends on B; bringing C
/// up must bring B then A up first, in topological order.
#[tokio::test]
async fn linear_chain_demand_propagation() {
    let txn_controller = controller();
    let registry = ServiceRegistry::new();
    let log = CallLog::new();

    let update1 = txn_controller.create_update().await;
    {
        let ctx = ServiceContext::new(Arc::clone(&update1.transaction));
        ctx.add_service(&registry, name("a"))
            .mode(ServiceMode::OnDemand)
            .service(RecordingService::new("a", log.clone()))
            .install()
            .unwrap();
        ctx.add_service(&registry, name("b"))
            .mode(ServiceMode::OnDemand)
            .service(RecordingService::new("b", log.clone()))
            .dependency(name("a"))
            .install()
            .unwrap();
    }
    txn_controller.prepare(&update1).await.unwrap();
    txn_controller.commit(update1).await.unwrap();

    assert_eq!(registry.get_service(&name("a")).unwrap().state(), ServiceState::Down);
    assert_eq!(registry.get_service(&name("b")).unwrap().state(), ServiceState::Down);
    assert!(log.events().is_empty());

    let update2 = txn_controller.create_update().await;
    {
        let ctx = ServiceContext::new(Arc::clone(&update2.transaction));
        ctx.add_service(&registry, name("c"))
            .mode(ServiceMode::Active)
            .service(RecordingService::new("c", log.clone()))
            .dependency(name("b"))
            .install()
            .unwrap();
    }
    txn_controller.prepare(&update2).await.unwrap();
    txn_controller.commit(update2).await.unwrap();

    assert_eq!(registry.get_service(&name("a")).unwrap().state(), ServiceState::Up);
    assert_eq!(registry.get_service(&name("b")).unwrap().state(), ServiceState::Up);
    assert_eq!(registry.get_service(&name("c")).unwrap().state(), ServiceState::Up);
    assert_eq!(log.events(), vec!["a.start", "b.start", "c.start"]);
}

/// Scenario 3: replacing a started service stops the old implementation
/// then starts the new one, firing the replace listener exactly once.
#[tokio::test]
async fn replace_started_service() {
    let txn_controller = controller();
    let registry = ServiceRegistry::new();
    let log = CallLog::new();

    let update1 = txn_controller.create_update().await;
    let s1 = RecordingService::new("s1", log.clone());
    let controller_handle = {
        let ctx = ServiceContext::new(Arc::clone(&update1.transaction));
        ctx.add_service(&registry, name("s"))
            .mode(ServiceMode::Active)
            .service(s1)
            .install()
            .unwrap()
    };
    txn_controller.prepare(&update1).await.unwrap();
    txn_controller.commit(update1).await.unwrap();
    assert_eq!(controller_handle.state(), ServiceState::Up);

    let replace_count = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    {
        let replace_count = Arc::clone(&replace_count);
        controller_handle.on_replace(Arc::new(move |()| {
            replace_count.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }));
    }

    let update2 = txn_controller.create_update().await;
    let s2 = RecordingService::new("s2", log.clone());
    controller_handle
        .replace(&update2.transaction, s2)
        .expect("replace should be accepted while UP");
    txn_controller.prepare(&update2).await.unwrap();
    txn_controller.commit(update2).await.unwrap();

    assert_eq!(controller_handle.state(), ServiceState::Up);
    assert_eq!(log.events(), vec!["s1.start", "s1.stop", "s2.start"]);
    assert_eq!(replace_count.load(std::sync::atomic::Ordering::SeqCst), 1);
}

/// Scenario 4: disabling a registry cascades DOWN through every holder
/// it contains, and further through a dependent in a different registry.
#[tokio::test]
async fn registry_disable_cascades() {
    let txn_controller = controller();
    let r1 = ServiceRegistry::new();
    let r2 = ServiceRegistry::new();
    let log = CallLog::new();

    let update = txn_controller.create_update().await;
    {
        let ctx = ServiceContext::new(Arc::clone(&update.transaction));
        ctx.add_service(&r1, name("a"))
            .mode(ServiceMode::Active)
            .service(RecordingService::new("a", log.clone()))
            .install()
            .unwrap();
        ctx.add_service(&r1, name("b"))
            .mode(ServiceMode::Active)
            .service(RecordingService::new("b", log.clone()))
            .install()
            .unwrap();
        ctx.add_service(&r1, name("c"))
            .mode(ServiceMode::Active)
            .service(RecordingService::new("c", log.clone()))
            .install()
            .unwrap();
        ctx.add_service(&r2, name("d"))
            .mode(ServiceMode::Active)
            .service(RecordingService::new("d", log.clone()))
            .dependency_in(Arc::clone(&r1), name("b"), true, true, false)
            .install()
            .unwrap();
    }
    txn_controller.prepare(&update).await.unwrap();
    txn_controller.commit(update).await.unwrap();

    for svc in ["a", "b", "c", "d"] {
        assert_eq!(
            r1.get_service(&name(svc))
                .or_else(|| r2.get_service(&name(svc)))
                .unwrap()
                .state(),
            ServiceState::Up,
            "{svc} should be up before the disable"
        );
    }

    let update2 = txn_controller.create_update().await;
    r1.disable(&update2.transaction);
    txn_controller.prepare(&update2).await.unwrap();
    txn_controller.commit(update2).await.unwrap();

    assert_eq!(r1.get_service(&name("a")).unwrap().state(), ServiceState::Down);
    assert_eq!(r1.get_service(&name("b")).unwrap().state(), ServiceState::Down);
    assert_eq!(r1.get_service(&name("c")).unwrap().state(), ServiceState::Down);
    assert_eq!(
        r2.get_service(&name("d")).unwrap().state(),
        ServiceState::Down,
        "d must follow b down through its cross-registry dependency"
    );
}

/// Scenario 5: a cyclic dependency is refused with `CYCLE`, and the
/// earlier, successful installation in the same transaction is untouched.
#[tokio::test]
async fn cycle_refused() {
    let txn_controller = controller();
    let registry = ServiceRegistry::new();
    let log = CallLog::new();

    let update = txn_controller.create_update().await;
    let ctx = ServiceContext::new(Arc::clone(&update.transaction));

    let a = ctx
        .add_service(&registry, name("a"))
        .mode(ServiceMode::Active)
        .service(RecordingService::new("a", log.clone()))
        .dependency(name("b"))
        .install()
        .expect("a depending on not-yet-installed b is not a cycle");

    let err = ctx
        .add_service(&registry, name("b"))
        .mode(ServiceMode::Active)
        .service(RecordingService::new("b", log.clone()))
        .dependency(name("a"))
        .install()
        .expect_err("b depending back on a closes a cycle");
    assert_eq!(err, ContainerError::Cycle(name("b")));

    assert!(registry.get_service(&name("a")).is_some(), "a's install must stand");
    assert!(registry.get_service(&name("b")).is_none(), "b must never have been installed");
    let _ = a;

    txn_controller.abort(update).await.expect("the transaction itself may still be aborted");
}

/// Duplicate installation under the same name fails with `DUPLICATE_SERVICE`
/// and leaves the first installation in place.
#[tokio::test]
async fn duplicate_install_rejected() {
    let txn_controller = controller();
    let registry = ServiceRegistry::new();
    let log = CallLog::new();

    let update = txn_controller.create_update().await;
    let ctx = ServiceContext::new(Arc::clone(&update.transaction));
    ctx.add_service(&registry, name("a"))
        .mode(ServiceMode::Active)
        .service(RecordingService::new("first", log.clone()))
        .install()
        .unwrap();

    let err = ctx
        .add_service(&registry, name("a"))
        .mode(ServiceMode::Active)
        .service(RecordingService::new("second", log.clone()))
        .install()
        .expect_err("duplicate name must be rejected");
    assert_eq!(err, ContainerError::DuplicateService(name("a")));

    txn_controller.prepare(&update).await.unwrap();
    txn_controller.commit(update).await.unwrap();
    assert_eq!(log.events(), vec!["first.start"]);
}

/// A failed start transitions the controller to `FAILED` rather than
/// `UP`, and `retry` forces a stop-and-start cycle back to a running
/// service once the underlying condition is expected to have cleared.
#[tokio::test]
async fn failed_start_and_retry() {
    let txn_controller = controller();
    let registry = ServiceRegistry::new();
    let log = CallLog::new();

    let update = txn_controller.create_update().await;
    let controller_handle = {
        let ctx = ServiceContext::new(Arc::clone(&update.transaction));
        ctx.add_service(&registry, name("flaky"))
            .mode(ServiceMode::Active)
            .service(common::RecordingService::failing("flaky", log.clone()))
            .install()
            .unwrap()
    };
    txn_controller.prepare(&update).await.unwrap();
    txn_controller.commit(update).await.unwrap();
    assert_eq!(controller_handle.state(), ServiceState::Failed);
    assert_eq!(log.events(), vec!["flaky.start"]);

    let update2 = txn_controller.create_update().await;
    controller_handle
        .retry(&update2.transaction)
        .expect("retry is valid exactly because the controller is FAILED");
    txn_controller.prepare(&update2).await.unwrap();
    txn_controller.commit(update2).await.unwrap();

    // Still failing: retry forces a stop-then-start cycle, not a promise
    // of success.
    assert_eq!(controller_handle.state(), ServiceState::Failed);
    assert_eq!(log.events(), vec!["flaky.start", "flaky.stop", "flaky.start"]);

    let update3 = txn_controller.create_update().await;
    let healthy = {
        let ctx = ServiceContext::new(Arc::clone(&update3.transaction));
        ctx.add_service(&registry, name("healthy"))
            .mode(ServiceMode::Active)
            .service(RecordingService::new("healthy", log.clone()))
            .install()
            .unwrap()
    };
    txn_controller.prepare(&update3).await.unwrap();
    txn_controller.commit(update3).await.unwrap();
    assert_eq!(healthy.state(), ServiceState::Up);

    let update4 = txn_controller.create_update().await;
    let err = healthy
        .retry(&update4.transaction)
        .expect_err("retry only accepts a controller currently in FAILED");
    assert_eq!(err, ContainerError::NotInFailedState(name("healthy")));
    txn_controller.abort(update4).await.unwrap();
}

/// A required dependency that is never installed is reported as
/// `MISSING_DEPENDENCY` at PREPARE, blocking commit — the dependent itself
/// stays DOWN rather than starting with an unsatisfied dependency.
#[tokio::test]
async fn missing_required_dependency_blocks_commit() {
    let txn_controller = controller();
    let registry = ServiceRegistry::new();
    let log = CallLog::new();

    let update = txn_controller.create_update().await;
    let dependent = {
        let ctx = ServiceContext::new(Arc::clone(&update.transaction));
        ctx.add_service(&registry, name("dependent"))
            .mode(ServiceMode::Active)
            .service(RecordingService::new("dependent", log.clone()))
            .dependency(name("missing"))
            .install()
            .unwrap()
    };
    txn_controller.prepare(&update).await.unwrap();
    assert!(
        !txn_controller.can_commit(&update),
        "a required dependency that was never installed must block commit"
    );
    txn_controller.abort(update).await.unwrap();

    assert!(log.events().is_empty(), "dependent never starts while its dependency is unsatisfied");
    assert_eq!(dependent.state(), ServiceState::Down);
}
