//! The service controller: the per-service state machine, demand
//! propagation, and issuance of start/stop/remove task subgraphs.

use std::sync::{Arc, Weak};
use std::time::Instant;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::dependency::DependencyEdge;
use crate::error::ContainerError;
use crate::listener::{Listener, NotificationQueue};
use crate::name::ServiceName;
use crate::registry::registration::Registration;
use crate::registry::registry::ServiceRegistry;
use crate::service::hooks::{Service, ServiceOutcome, StartContext, StopContext};
use crate::service::mode::ServiceMode;
use crate::service::state::ServiceState;
use crate::task::{ExecuteContext, TaskContext, TaskExecute, TaskOutcome, TaskSpec};
use crate::transaction::transaction::Transaction;

struct ControllerInner {
    mode: ServiceMode,
    state: ServiceState,
    unsatisfied: usize,
    demanded_by: usize,
    service_enabled: bool,
    registry_enabled: bool,
    service_removed: bool,
    /// `Lazy` only ever propagates demand once, on first external demand,
    /// and never undemands — this remembers that it already latched.
    demand_latched: bool,
    service: Arc<dyn Service>,
    pending_replacement: Option<Arc<dyn Service>>,
    last_change: Instant,
}

/// One installed service: its primary and alias registrations, its
/// outgoing dependency edges, and the state machine that reconciles mode,
/// dependency satisfaction, demand, and enable flags into a target state.
pub struct ServiceController {
    name: ServiceName,
    registry: Arc<ServiceRegistry>,
    primary_registration: Arc<Registration>,
    aliases: Vec<Arc<Registration>>,
    edges: Vec<Arc<DependencyEdge>>,
    inner: Mutex<ControllerInner>,
    on_enable: NotificationQueue<()>,
    on_disable: NotificationQueue<()>,
    on_remove: NotificationQueue<()>,
    on_replace: NotificationQueue<()>,
}

enum Transition {
    ToStarting,
    ToStopping,
    ToRemoving,
}

impl ServiceController {
    /// Constructs, installs into the primary registration, and seeds
    /// outgoing edges' back-references. Callers (`ServiceBuilder::install`)
    /// must already have verified the primary registration has no holder —
    /// `Arc::new_cyclic`'s closure cannot itself fail without leaving a
    /// partially-built controller behind.
    pub(crate) fn new(
        name: ServiceName,
        registry: Arc<ServiceRegistry>,
        primary_registration: Arc<Registration>,
        aliases: Vec<Arc<Registration>>,
        edges: Vec<Arc<DependencyEdge>>,
        mode: ServiceMode,
        service: Arc<dyn Service>,
    ) -> Arc<Self> {
        let unsatisfied = edges.iter().filter(|e| !e.is_satisfied()).count();
        let controller = Arc::new_cyclic(|weak: &Weak<ServiceController>| {
            for edge in &edges {
                edge.set_dependent(weak.clone());
            }
            Self {
                name,
                registry,
                primary_registration: Arc::clone(&primary_registration),
                aliases,
                edges,
                inner: Mutex::new(ControllerInner {
                    mode,
                    state: ServiceState::Down,
                    unsatisfied,
                    demanded_by: 0,
                    service_enabled: true,
                    registry_enabled: true,
                    service_removed: false,
                    demand_latched: false,
                    service,
                    pending_replacement: None,
                    last_change: Instant::now(),
                }),
                on_enable: NotificationQueue::new(),
                on_disable: NotificationQueue::new(),
                on_remove: NotificationQueue::new(),
                on_replace: NotificationQueue::new(),
            }
        });
        // `install` cannot fail here: the duplicate check already ran
        // against every one of these registrations before this constructor
        // was called.
        let _ = primary_registration.install(Arc::downgrade(&controller));
        for alias in controller.aliases.iter() {
            let _ = alias.install(Arc::downgrade(&controller));
        }
        controller
    }

    pub fn name(&self) -> &ServiceName {
        &self.name
    }

    pub fn state(&self) -> ServiceState {
        self.inner.lock().state
    }

    pub fn mode(&self) -> ServiceMode {
        self.inner.lock().mode
    }

    /// The service implementation currently installed — the pending
    /// replacement, if any, only takes effect once the controller has
    /// cycled through `STOPPING` (see `set_service_down`).
    pub fn service(&self) -> Arc<dyn Service> {
        self.current_service()
    }

    pub(crate) fn registrations(&self) -> impl Iterator<Item = &Arc<Registration>> {
        std::iter::once(&self.primary_registration).chain(self.aliases.iter())
    }

    pub(crate) fn outgoing_edges(&self) -> &[Arc<DependencyEdge>] {
        &self.edges
    }

    pub fn on_enable(&self, listener: Arc<dyn Listener<()>>) {
        self.on_enable.push(listener);
    }

    pub fn on_disable(&self, listener: Arc<dyn Listener<()>>) {
        self.on_disable.push(listener);
    }

    pub fn on_remove(&self, listener: Arc<dyn Listener<()>>) {
        self.on_remove.push(listener);
    }

    pub fn on_replace(&self, listener: Arc<dyn Listener<()>>) {
        self.on_replace.push(listener);
    }

    /// Propagate demand to dependencies unconditionally — called once at
    /// install time for `Active` mode.
    pub(crate) fn activate_unconditional_demand(self: &Arc<Self>, transaction: &Arc<Transaction>) {
        if self.inner.lock().mode == ServiceMode::Active {
            self.propagate_demand(transaction);
        }
    }

    /// Run the first predicate evaluation after installation. Every other
    /// entry point into `evaluate` is a reaction to some later input
    /// change; a brand new controller needs one unprompted call to notice
    /// it can already start (e.g. `Active` mode with zero dependencies).
    pub(crate) fn initial_evaluate(self: &Arc<Self>, transaction: &Arc<Transaction>) {
        self.evaluate(transaction);
    }

    fn propagate_demand(&self, transaction: &Arc<Transaction>) {
        for edge in &self.edges {
            edge.demand(transaction);
        }
    }

    fn unpropagate_demand(&self, transaction: &Arc<Transaction>) {
        for edge in &self.edges {
            edge.undemand(transaction);
        }
    }

    // ---- narrow re-entry points, called from task hooks and edges ----

    pub(crate) fn dependency_satisfied(self: &Arc<Self>, transaction: &Arc<Transaction>) {
        {
            let mut inner = self.inner.lock();
            inner.unsatisfied = inner.unsatisfied.saturating_sub(1);
        }
        self.evaluate(transaction);
    }

    pub(crate) fn dependency_unsatisfied(self: &Arc<Self>, transaction: &Arc<Transaction>) {
        {
            let mut inner = self.inner.lock();
            inner.unsatisfied += 1;
        }
        self.evaluate(transaction);
    }

    pub(crate) fn demand_received(self: &Arc<Self>, transaction: &Arc<Transaction>) {
        let should_propagate = {
            let mut inner = self.inner.lock();
            let previous = inner.demanded_by;
            inner.demanded_by += 1;
            let first_demand = previous == 0;
            match inner.mode {
                ServiceMode::OnDemand => first_demand,
                ServiceMode::Lazy if first_demand && !inner.demand_latched => {
                    inner.demand_latched = true;
                    true
                }
                _ => false,
            }
        };
        if should_propagate {
            self.propagate_demand(transaction);
        }
        self.evaluate(transaction);
    }

    pub(crate) fn demand_released(self: &Arc<Self>, transaction: &Arc<Transaction>) {
        let should_unpropagate = {
            let mut inner = self.inner.lock();
            inner.demanded_by = inner.demanded_by.saturating_sub(1);
            inner.demanded_by == 0 && inner.mode == ServiceMode::OnDemand
        };
        if should_unpropagate {
            self.unpropagate_demand(transaction);
        }
        self.evaluate(transaction);
    }

    pub(crate) fn set_service_up(self: &Arc<Self>, transaction: &Arc<Transaction>) {
        {
            let mut inner = self.inner.lock();
            inner.state = ServiceState::Up;
            inner.last_change = Instant::now();
        }
        for registration in self.registrations() {
            registration.service_up(transaction);
        }
        self.on_enable.drain_and_fire(());
        self.evaluate(transaction);
    }

    pub(crate) fn set_service_failed(self: &Arc<Self>, transaction: &Arc<Transaction>) {
        {
            let mut inner = self.inner.lock();
            inner.state = ServiceState::Failed;
            inner.last_change = Instant::now();
        }
        for registration in self.registrations() {
            registration.service_down(transaction);
        }
        self.evaluate(transaction);
    }

    /// Called once the stop subgraph's user-facing work has completed.
    /// Dependents were already notified DOWN at the start of the stop
    /// subgraph (before `Service::stop` ran), so this only finalises the
    /// controller's own bookkeeping and applies a pending replacement.
    pub(crate) fn set_service_down(self: &Arc<Self>, transaction: &Arc<Transaction>) {
        let replaced = {
            let mut inner = self.inner.lock();
            let replaced = if let Some(replacement) = inner.pending_replacement.take() {
                inner.service = replacement;
                true
            } else {
                false
            };
            inner.state = ServiceState::Down;
            inner.last_change = Instant::now();
            replaced
        };
        if replaced {
            self.on_replace.drain_and_fire(());
        }
        self.on_disable.drain_and_fire(());
        self.evaluate(transaction);
    }

    pub(crate) fn set_service_removed(self: &Arc<Self>, transaction: &Arc<Transaction>) {
        // Whatever demand this controller was currently forwarding through
        // its edges must be retracted here — the edges themselves are
        // about to be detached below, and nothing else will ever release
        // it. `Active` demanded unconditionally since install;
        // `Lazy`/`OnDemand` only if they were actually demanding at the
        // moment of removal.
        if self.is_currently_demanding() {
            self.unpropagate_demand(transaction);
        }
        for registration in self.registrations() {
            registration.clear();
            self.registry.prune_if_orphaned(registration.name());
        }
        for edge in &self.edges {
            if let Some(target) = edge.target() {
                target.remove_incoming(edge);
                self.registry.prune_if_orphaned(target.name());
            }
        }
        {
            let mut inner = self.inner.lock();
            inner.state = ServiceState::Removed;
            inner.last_change = Instant::now();
        }
        self.on_remove.drain_and_fire(());
    }

    fn is_currently_demanding(&self) -> bool {
        let inner = self.inner.lock();
        match inner.mode {
            ServiceMode::Active => true,
            ServiceMode::Lazy => inner.demand_latched,
            ServiceMode::OnDemand => inner.demanded_by > 0,
        }
    }

    pub(crate) fn enable_registry(self: &Arc<Self>, transaction: &Arc<Transaction>) {
        self.inner.lock().registry_enabled = true;
        self.evaluate(transaction);
    }

    pub(crate) fn disable_registry(self: &Arc<Self>, transaction: &Arc<Transaction>) {
        self.inner.lock().registry_enabled = false;
        self.evaluate(transaction);
    }

    // ---- public, transactional mutators ----

    pub fn enable(self: &Arc<Self>, transaction: &Arc<Transaction>) -> Result<(), ContainerError> {
        self.ensure_not_removed()?;
        self.inner.lock().service_enabled = true;
        self.evaluate(transaction);
        Ok(())
    }

    pub fn disable(self: &Arc<Self>, transaction: &Arc<Transaction>) -> Result<(), ContainerError> {
        self.ensure_not_removed()?;
        self.inner.lock().service_enabled = false;
        self.evaluate(transaction);
        Ok(())
    }

    pub fn remove(self: &Arc<Self>, transaction: &Arc<Transaction>) {
        let mut inner = self.inner.lock();
        if inner.service_removed {
            return;
        }
        inner.service_removed = true;
        drop(inner);
        self.evaluate(transaction);
    }

    /// Forces a stop-and-start cycle on a `FAILED` controller.
    pub fn retry(self: &Arc<Self>, transaction: &Arc<Transaction>) -> Result<(), ContainerError> {
        let mut inner = self.inner.lock();
        if inner.state != ServiceState::Failed {
            return Err(ContainerError::NotInFailedState(self.name.clone()));
        }
        inner.service_enabled = false;
        drop(inner);
        self.evaluate(transaction);
        self.inner.lock().service_enabled = true;
        self.evaluate(transaction);
        Ok(())
    }

    /// Forces a stop-and-start cycle regardless of current state, unlike
    /// `retry` which only accepts a `FAILED` controller.
    pub fn restart(self: &Arc<Self>, transaction: &Arc<Transaction>) -> Result<(), ContainerError> {
        self.ensure_not_removed()?;
        self.inner.lock().service_enabled = false;
        self.evaluate(transaction);
        self.inner.lock().service_enabled = true;
        self.evaluate(transaction);
        Ok(())
    }

    pub fn replace(
        self: &Arc<Self>,
        transaction: &Arc<Transaction>,
        new_service: Arc<dyn Service>,
    ) -> Result<(), ContainerError> {
        self.ensure_not_removed()?;
        self.inner.lock().pending_replacement = Some(new_service);
        self.evaluate(transaction);
        Ok(())
    }

    fn ensure_not_removed(&self) -> Result<(), ContainerError> {
        let inner = self.inner.lock();
        if inner.service_removed || inner.state == ServiceState::Removed {
            Err(ContainerError::CannotOperateOnRemoved(self.name.clone()))
        } else {
            Ok(())
        }
    }

    /// Single-shot predicate evaluation: at most one transition fires per
    /// call, since moving into a transient state (`Starting`/`Stopping`/
    /// `Removing`) never matches another arm until the matching task's
    /// completion callback calls `evaluate` again. A callback that lands
    /// back on a stable state (e.g. `set_service_down` reaching `Down`)
    /// can still chain directly into the next transition within the same
    /// call, which is what gives the state machine its fixed-point
    /// property without an explicit loop.
    fn evaluate(self: &Arc<Self>, transaction: &Arc<Transaction>) {
        let transition = {
            let inner = self.inner.lock();
            let should_start = !inner.service_removed
                && inner.service_enabled
                && inner.registry_enabled
                && inner.unsatisfied == 0
                && (inner.mode == ServiceMode::Active || inner.demanded_by > 0);
            let should_stop = inner.service_removed
                || !inner.service_enabled
                || !inner.registry_enabled
                || inner.unsatisfied > 0
                || (inner.mode == ServiceMode::OnDemand && inner.demanded_by == 0)
                || inner.pending_replacement.is_some();

            match inner.state {
                ServiceState::Down if inner.service_removed => Some(Transition::ToRemoving),
                ServiceState::Down if should_start => Some(Transition::ToStarting),
                ServiceState::Up if should_stop => Some(Transition::ToStopping),
                ServiceState::Failed if should_stop => Some(Transition::ToStopping),
                _ => None,
            }
        };

        match transition {
            None => {}
            Some(Transition::ToStarting) => {
                self.inner.lock().state = ServiceState::Starting;
                let task = StartTask {
                    controller: Arc::clone(self),
                };
                transaction.add_task(TaskSpec::new("service-start", Arc::new(task)));
            }
            Some(Transition::ToStopping) => {
                self.inner.lock().state = ServiceState::Stopping;
                let task = StopTask {
                    controller: Arc::clone(self),
                };
                transaction.add_task(TaskSpec::new("service-stop", Arc::new(task)));
            }
            Some(Transition::ToRemoving) => {
                self.inner.lock().state = ServiceState::Removing;
                let task = RemoveTask {
                    controller: Arc::clone(self),
                };
                transaction.add_task(TaskSpec::new("service-remove", Arc::new(task)));
            }
        }
    }

    fn current_service(&self) -> Arc<dyn Service> {
        Arc::clone(&self.inner.lock().service)
    }
}

struct StartTask {
    controller: Arc<ServiceController>,
}

#[async_trait]
impl TaskExecute for StartTask {
    async fn execute(&self, ctx: &ExecuteContext<'_>) -> TaskOutcome {
        let service = self.controller.current_service();
        let start_ctx = StartContext { execute: ctx };
        match service.start(&start_ctx).await {
            ServiceOutcome::Complete => {
                self.controller.set_service_up(ctx.transaction());
            }
            ServiceOutcome::Failed => {
                self.controller.set_service_failed(ctx.transaction());
            }
        }
        TaskOutcome::Completed
    }
}

struct StopTask {
    controller: Arc<ServiceController>,
}

#[async_trait]
impl TaskExecute for StopTask {
    async fn execute(&self, ctx: &ExecuteContext<'_>) -> TaskOutcome {
        for registration in self.controller.registrations() {
            registration.service_down(ctx.transaction());
        }
        let service = self.controller.current_service();
        let task_ctx = TaskContext {
            task_id: ctx.task_id(),
            transaction: ctx.transaction(),
        };
        let stop_ctx = StopContext { task: &task_ctx };
        service.stop(&stop_ctx).await;
        self.controller.set_service_down(ctx.transaction());
        TaskOutcome::Completed
    }
}

struct RemoveTask {
    controller: Arc<ServiceController>,
}

#[async_trait]
impl TaskExecute for RemoveTask {
    async fn execute(&self, ctx: &ExecuteContext<'_>) -> TaskOutcome {
        self.controller.set_service_removed(ctx.transaction());
        TaskOutcome::Completed
    }
}
