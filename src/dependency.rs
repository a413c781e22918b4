//! The dependency edge: the up/down relation between a dependent
//! controller and a dependency registration.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::registry::registration::Registration;
use crate::service::controller::ServiceController;
use crate::transaction::transaction::Transaction;

/// Which actual state of the target satisfies this edge. Most edges
/// require their target UP; mutual-exclusion relations use `Down`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Up,
    Down,
}

/// One outgoing dependency of a [`ServiceController`], owned by that
/// controller and borrowing its target [`Registration`] weakly.
pub struct DependencyEdge {
    target: Weak<Registration>,
    dependent: Mutex<Option<Weak<ServiceController>>>,
    required: bool,
    propagate_demand: bool,
    parent_child: bool,
    polarity: Polarity,
    satisfied: AtomicBool,
}

impl DependencyEdge {
    /// `target_up` is the target's observed state at edge-construction
    /// time, used to seed the cached satisfaction bit (I6).
    pub fn new(
        target: Weak<Registration>,
        required: bool,
        propagate_demand: bool,
        parent_child: bool,
        polarity: Polarity,
        target_up: bool,
    ) -> Arc<Self> {
        let satisfied = Self::polarity_matches(polarity, target_up);
        Arc::new(Self {
            target,
            dependent: Mutex::new(None),
            required,
            propagate_demand,
            parent_child,
            polarity,
            satisfied: AtomicBool::new(satisfied),
        })
    }

    pub fn required(&self) -> bool {
        self.required
    }

    pub fn propagate_demand(&self) -> bool {
        self.propagate_demand
    }

    pub fn is_parent_child(&self) -> bool {
        self.parent_child
    }

    pub fn polarity(&self) -> Polarity {
        self.polarity
    }

    pub fn is_satisfied(&self) -> bool {
        self.satisfied.load(Ordering::Acquire)
    }

    pub fn target(&self) -> Option<Arc<Registration>> {
        self.target.upgrade()
    }

    fn dependent(&self) -> Option<Arc<ServiceController>> {
        self.dependent.lock().as_ref().and_then(Weak::upgrade)
    }

    fn polarity_matches(polarity: Polarity, target_up: bool) -> bool {
        match polarity {
            Polarity::Up => target_up,
            Polarity::Down => !target_up,
        }
    }

    /// Attach the dependent back-reference. Only ever called from
    /// `ServiceController::new`, before the controller's own `Arc` exists
    /// (`Weak::upgrade` inside `Arc::new_cyclic` always returns `None`), so
    /// unlike the distilled spec's `setDependent` this never needs to reach
    /// back into the dependent — the constructor seeds the initial
    /// unsatisfied count directly from the edge set instead.
    pub fn set_dependent(&self, dependent: Weak<ServiceController>) {
        *self.dependent.lock() = Some(dependent);
    }

    /// Called by the target registration when it observes its holder
    /// transition UP.
    pub fn dependency_up(&self, transaction: &Arc<Transaction>) {
        self.transition(true, transaction);
    }

    /// Called by the target registration when it observes its holder
    /// transition DOWN (or removed).
    pub fn dependency_down(&self, transaction: &Arc<Transaction>) {
        self.transition(false, transaction);
    }

    fn transition(&self, target_up: bool, transaction: &Arc<Transaction>) {
        let now_satisfied = Self::polarity_matches(self.polarity, target_up);
        let was_satisfied = self.satisfied.swap(now_satisfied, Ordering::AcqRel);
        if was_satisfied == now_satisfied {
            return;
        }
        let Some(dependent) = self.dependent() else {
            return;
        };
        if now_satisfied {
            dependent.dependency_satisfied(transaction);
        } else {
            dependent.dependency_unsatisfied(transaction);
            if self.parent_child {
                dependent.remove(transaction);
            }
        }
    }

    /// Forward demand to the target, if this edge is flagged to
    /// propagate it.
    pub fn demand(&self, transaction: &Arc<Transaction>) {
        if self.propagate_demand {
            if let Some(target) = self.target() {
                target.add_demand(transaction);
            }
        }
    }

    pub fn undemand(&self, transaction: &Arc<Transaction>) {
        if self.propagate_demand {
            if let Some(target) = self.target() {
                target.remove_demand(transaction);
            }
        }
    }
}
