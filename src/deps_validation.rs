//! Dependencies-validation: the post-prepare pass that catches a required
//! dependency left unsatisfied by the end of a transaction.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashSet;

use crate::name::ServiceName;
use crate::problem::Problem;
use crate::registry::registry::ServiceRegistry;
use crate::transaction::transaction::{PostPrepareListener, Transaction};

/// Scans every registration touched during the transaction (see
/// `Transaction::touch`) and reports a `MISSING_DEPENDENCY` problem for
/// each one that a required incoming edge still references but that has
/// no holder — e.g. because the dependency was never installed, or was
/// removed earlier in the same transaction.
pub struct DependenciesValidationListener {
    registry: Arc<ServiceRegistry>,
}

impl DependenciesValidationListener {
    pub fn new(registry: Arc<ServiceRegistry>) -> Arc<Self> {
        Arc::new(Self { registry })
    }

    fn missing_dependency(name: &ServiceName) -> Problem {
        Problem::error(format!("missing required dependency: '{name}'"))
            .for_service(name.clone())
    }
}

impl PostPrepareListener for DependenciesValidationListener {
    fn on_prepare(&self, transaction: &Arc<Transaction>) {
        for name in transaction.touched() {
            let Some(registration) = self.registry.get_registration(&name) else {
                continue;
            };
            if registration.holder().is_some() {
                continue;
            }
            let has_required_dependent = registration
                .incoming_edges()
                .iter()
                .any(|edge| edge.required());
            if has_required_dependent {
                transaction.problems().add(Self::missing_dependency(&name));
            }
        }
    }
}

/// Tracks which registries already have a [`DependenciesValidationListener`]
/// attached to a given transaction, so a builder touching the same
/// registry more than once within one transaction doesn't double-report.
struct AttachedValidators {
    registries: Mutex<FxHashSet<usize>>,
}

impl AttachedValidators {
    fn new() -> Self {
        Self {
            registries: Mutex::new(FxHashSet::default()),
        }
    }
}

/// Ensure a `DependenciesValidationListener` runs at this transaction's
/// PREPARE for `registry` — the "one per transaction via attachment"
/// scheduling named in §4.3. Called from `ServiceBuilder::install` for
/// every registry a builder actually references (its own and any foreign
/// registry named via `dependency_in`), idempotent per registry per
/// transaction.
pub(crate) fn ensure_attached(transaction: &Arc<Transaction>, registry: &Arc<ServiceRegistry>) {
    if transaction.attachment::<AttachedValidators>().is_none() {
        transaction.attach(AttachedValidators::new(), false);
    }
    let tracker = transaction
        .attachment::<AttachedValidators>()
        .expect("just attached above");
    let key = Arc::as_ptr(registry) as usize;
    if tracker.registries.lock().insert(key) {
        transaction.add_post_prepare_listener(DependenciesValidationListener::new(Arc::clone(
            registry,
        )));
    }
}
