//! The service registry: a named collection of registrations plus an
//! enable flag that fans out to every holder controller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::error::ContainerError;
use crate::name::ServiceName;
use crate::registry::registration::Registration;
use crate::service::controller::ServiceController;
use crate::transaction::transaction::Transaction;

/// A named collection of [`Registration`]s. Disabling a registry clears
/// `REGISTRY_ENABLED` on every currently-installed controller and lets
/// the state machine re-evaluate; re-enabling does the reverse.
pub struct ServiceRegistry {
    registrations: DashMap<ServiceName, Arc<Registration>>,
    enabled: AtomicBool,
}

impl ServiceRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            registrations: DashMap::new(),
            enabled: AtomicBool::new(true),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Look up an existing registration, or create an empty one. Builders
    /// call this for every name they reference, whether installing a
    /// controller there or only pointing a dependency edge at it.
    pub fn registration_for(&self, name: &ServiceName) -> Arc<Registration> {
        if let Some(existing) = self.registrations.get(name) {
            return Arc::clone(&existing);
        }
        let created = Registration::new(name.clone());
        self.registrations
            .entry(name.clone())
            .or_insert_with(|| created)
            .clone()
    }

    /// Look up an existing registration without creating one.
    pub fn get_registration(&self, name: &ServiceName) -> Option<Arc<Registration>> {
        self.registrations.get(name).map(|r| Arc::clone(&r))
    }

    pub fn get_service(&self, name: &ServiceName) -> Option<Arc<ServiceController>> {
        self.registrations.get(name).and_then(|r| r.holder())
    }

    pub fn get_required_service(
        &self,
        name: &ServiceName,
    ) -> Result<Arc<ServiceController>, ContainerError> {
        self.get_service(name)
            .ok_or_else(|| ContainerError::ServiceNotFound(name.clone()))
    }

    /// Drop a registration from the table once it has no holder and no
    /// incoming edges. Safe to call speculatively after any mutation that
    /// might have orphaned it.
    pub fn prune_if_orphaned(&self, name: &ServiceName) {
        if let Some(entry) = self.registrations.get(name) {
            if !entry.is_orphaned() {
                return;
            }
        } else {
            return;
        }
        self.registrations
            .remove_if(name, |_, registration| registration.is_orphaned());
    }

    pub fn enable(&self, transaction: &Arc<Transaction>) {
        self.enabled.store(true, Ordering::Release);
        for entry in self.registrations.iter() {
            if let Some(controller) = entry.value().holder() {
                controller.enable_registry(transaction);
            }
        }
    }

    pub fn disable(&self, transaction: &Arc<Transaction>) {
        self.enabled.store(false, Ordering::Release);
        for entry in self.registrations.iter() {
            if let Some(controller) = entry.value().holder() {
                controller.disable_registry(transaction);
            }
        }
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self {
            registrations: DashMap::new(),
            enabled: AtomicBool::new(true),
        }
    }
}
