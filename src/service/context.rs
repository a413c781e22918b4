//! `ServiceContext`: the entry point for installing new services, bound to
//! the update transaction the installation will ride on.

use std::sync::Arc;

use crate::name::ServiceName;
use crate::registry::registry::ServiceRegistry;
use crate::service::builder::ServiceBuilder;
use crate::transaction::transaction::Transaction;

/// Handed to application code alongside an
/// [`crate::transaction::controller::UpdateTransactionHandle`]; every
/// builder it mints is bound to the same transaction, so the start/stop
/// task subgraphs a new controller's initial evaluation produces land in
/// the caller's own update transaction rather than floating free.
pub struct ServiceContext {
    transaction: Arc<Transaction>,
}

impl ServiceContext {
    pub fn new(transaction: Arc<Transaction>) -> Self {
        Self { transaction }
    }

    pub fn add_service(&self, registry: &Arc<ServiceRegistry>, name: ServiceName) -> ServiceBuilder {
        ServiceBuilder::new(Arc::clone(registry), Arc::clone(&self.transaction), name)
    }
}
