//! The registration: a named slot holding at most one controller plus the
//! set of dependency edges pointing at it.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use crate::dependency::DependencyEdge;
use crate::error::ContainerError;
use crate::name::ServiceName;
use crate::service::controller::ServiceController;
use crate::transaction::transaction::Transaction;

/// A named slot in a [`crate::registry::registry::ServiceRegistry`]. It
/// may hold at most one controller (I4) and tracks every incoming
/// dependency edge so it can broadcast UP/DOWN and forward demand.
///
/// Visible to readers as soon as created; its lifecycle ends once it has
/// neither a holder nor any incoming edges (`is_orphaned`).
pub struct Registration {
    name: ServiceName,
    holder: Mutex<Option<Weak<ServiceController>>>,
    incoming: RwLock<Vec<Arc<DependencyEdge>>>,
    demand: AtomicUsize,
    up: AtomicBool,
}

impl Registration {
    pub fn new(name: ServiceName) -> Arc<Self> {
        Arc::new(Self {
            name,
            holder: Mutex::new(None),
            incoming: RwLock::new(Vec::new()),
            demand: AtomicUsize::new(0),
            up: AtomicBool::new(false),
        })
    }

    pub fn name(&self) -> &ServiceName {
        &self.name
    }

    pub fn is_up(&self) -> bool {
        self.up.load(Ordering::Acquire)
    }

    pub fn holder(&self) -> Option<Arc<ServiceController>> {
        self.holder.lock().as_ref().and_then(Weak::upgrade)
    }

    /// Atomic compare-and-set of the holder slot (I4).
    pub fn install(&self, controller: Weak<ServiceController>) -> Result<(), ContainerError> {
        let mut holder = self.holder.lock();
        if holder.as_ref().and_then(Weak::upgrade).is_some() {
            return Err(ContainerError::DuplicateService(self.name.clone()));
        }
        *holder = Some(controller);
        Ok(())
    }

    /// Remove the holder. The dependencies-validation pass will flag this
    /// registration at the next PREPARE if any required incoming edge
    /// still references it.
    pub fn clear(&self) {
        *self.holder.lock() = None;
    }

    pub fn add_incoming(&self, edge: Arc<DependencyEdge>) {
        self.incoming.write().push(edge);
    }

    pub fn remove_incoming(&self, edge: &Arc<DependencyEdge>) {
        self.incoming
            .write()
            .retain(|e| !Arc::ptr_eq(e, edge));
    }

    pub fn incoming_edges(&self) -> Vec<Arc<DependencyEdge>> {
        self.incoming.read().clone()
    }

    /// On the 0→1 boundary, notify the holder controller that it is now
    /// demanded; further `add_demand` calls while already demanded are
    /// silent.
    pub fn add_demand(&self, transaction: &Arc<Transaction>) {
        let previous = self.demand.fetch_add(1, Ordering::AcqRel);
        if previous == 0 {
            if let Some(holder) = self.holder() {
                holder.demand_received(transaction);
            }
        }
    }

    /// On the 1→0 boundary, notify the holder controller that demand has
    /// been released.
    pub fn remove_demand(&self, transaction: &Arc<Transaction>) {
        let previous = self.demand.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "demand count underflow");
        if previous == 1 {
            if let Some(holder) = self.holder() {
                holder.demand_released(transaction);
            }
        }
    }

    pub fn demand_count(&self) -> usize {
        self.demand.load(Ordering::Acquire)
    }

    /// Broadcast to every incoming edge that this registration's holder
    /// transitioned UP.
    pub fn service_up(&self, transaction: &Arc<Transaction>) {
        self.up.store(true, Ordering::Release);
        for edge in self.incoming_edges() {
            edge.dependency_up(transaction);
        }
    }

    /// Broadcast DOWN — also used when the holder is cleared entirely,
    /// since an absent holder is DOWN from every dependent's perspective.
    pub fn service_down(&self, transaction: &Arc<Transaction>) {
        self.up.store(false, Ordering::Release);
        for edge in self.incoming_edges() {
            edge.dependency_down(transaction);
        }
    }

    /// `true` once this registration has no holder and no incoming
    /// edges — it is safe to drop from the registry's table.
    pub fn is_orphaned(&self) -> bool {
        self.holder().is_none() && self.incoming.read().is_empty()
    }
}
