//! The fluent installation API: `ServiceBuilder` gathers a mode, a service
//! implementation, aliases and dependencies, then installs a
//! [`ServiceController`] onto an update transaction, checking for cycles
//! (I5) and name collisions (I4) before committing to the registry.

use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::dependency::{DependencyEdge, Polarity};
use crate::error::ContainerError;
use crate::name::ServiceName;
use crate::registry::registration::Registration;
use crate::registry::registry::ServiceRegistry;
use crate::service::controller::ServiceController;
use crate::service::hooks::Service;
use crate::service::mode::ServiceMode;
use crate::transaction::transaction::Transaction;

struct DependencySpec {
    name: ServiceName,
    registry: Option<Arc<ServiceRegistry>>,
    required: bool,
    propagate_demand: bool,
    parent_child: bool,
}

/// Fluent builder for one service installation, bound to the registry it
/// was created from ([`crate::service::context::ServiceContext::add_service`])
/// and to the update transaction that will carry the install.
pub struct ServiceBuilder {
    registry: Arc<ServiceRegistry>,
    transaction: Arc<Transaction>,
    name: ServiceName,
    mode: ServiceMode,
    aliases: Vec<ServiceName>,
    dependencies: Vec<DependencySpec>,
    service: Option<Arc<dyn Service>>,
}

impl ServiceBuilder {
    pub(crate) fn new(
        registry: Arc<ServiceRegistry>,
        transaction: Arc<Transaction>,
        name: ServiceName,
    ) -> Self {
        Self {
            registry,
            transaction,
            name,
            mode: ServiceMode::Active,
            aliases: Vec::new(),
            dependencies: Vec::new(),
            service: None,
        }
    }

    pub fn mode(mut self, mode: ServiceMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn service(mut self, service: Arc<dyn Service>) -> Self {
        self.service = Some(service);
        self
    }

    pub fn alias(mut self, name: ServiceName) -> Self {
        self.aliases.push(name);
        self
    }

    /// A required, demand-propagating, peer dependency in this builder's
    /// own registry — the common case.
    pub fn dependency(self, name: ServiceName) -> Self {
        self.dependency_with(name, None, true, true, false)
    }

    /// An unrequired dependency: satisfied or not, it never blocks
    /// `shouldStart`, and a missing holder is not a validation problem.
    pub fn unrequired_dependency(self, name: ServiceName) -> Self {
        self.dependency_with(name, None, false, true, false)
    }

    /// A parent-child dependency: if the target is later removed (or
    /// never installed and found missing at validation), this controller
    /// is cascaded for removal rather than merely left unsatisfied.
    pub fn child_dependency(self, name: ServiceName) -> Self {
        self.dependency_with(name, None, true, true, true)
    }

    /// A dependency on a registration in a different registry than this
    /// builder's own. Parent-child edges are rejected across registries —
    /// see `ContainerError::DependencyFromForeignController`.
    pub fn dependency_in(
        self,
        registry: Arc<ServiceRegistry>,
        name: ServiceName,
        required: bool,
        propagate_demand: bool,
        parent_child: bool,
    ) -> Self {
        self.dependency_with(name, Some(registry), required, propagate_demand, parent_child)
    }

    fn dependency_with(
        mut self,
        name: ServiceName,
        registry: Option<Arc<ServiceRegistry>>,
        required: bool,
        propagate_demand: bool,
        parent_child: bool,
    ) -> Self {
        self.dependencies.push(DependencySpec {
            name,
            registry,
            required,
            propagate_demand,
            parent_child,
        });
        self
    }

    /// Validate, build the dependency edges, detect cycles, and install
    /// the controller. On any error, no registration table is mutated in
    /// a way that is visible as a holder (I4, I5 both hold on failure).
    pub fn install(self) -> Result<Arc<ServiceController>, ContainerError> {
        let service = self
            .service
            .expect("ServiceBuilder::install requires a service set via .service(..)");

        let primary_registration = self.registry.registration_for(&self.name);
        if primary_registration.holder().is_some() {
            return Err(ContainerError::DuplicateService(self.name.clone()));
        }

        let mut alias_registrations = Vec::with_capacity(self.aliases.len());
        for alias in &self.aliases {
            let registration = self.registry.registration_for(alias);
            if registration.holder().is_some() {
                return Err(ContainerError::DuplicateService(alias.clone()));
            }
            alias_registrations.push(registration);
        }

        let mut target_registrations = Vec::with_capacity(self.dependencies.len());
        for spec in &self.dependencies {
            if spec.parent_child {
                if let Some(foreign) = &spec.registry {
                    if !Arc::ptr_eq(foreign, &self.registry) {
                        return Err(ContainerError::DependencyFromForeignController(
                            spec.name.clone(),
                        ));
                    }
                }
            }
            let registry = spec.registry.as_ref().unwrap_or(&self.registry);
            target_registrations.push(registry.registration_for(&spec.name));
        }

        if self.would_cycle(&target_registrations) {
            return Err(ContainerError::Cycle(self.name.clone()));
        }

        crate::deps_validation::ensure_attached(&self.transaction, &self.registry);

        let mut edges = Vec::with_capacity(self.dependencies.len());
        for (spec, target) in self.dependencies.iter().zip(target_registrations.iter()) {
            let registry = spec.registry.as_ref().unwrap_or(&self.registry);
            crate::deps_validation::ensure_attached(&self.transaction, registry);
            let edge = DependencyEdge::new(
                Arc::downgrade(target),
                spec.required,
                spec.propagate_demand,
                spec.parent_child,
                Polarity::Up,
                target.is_up(),
            );
            target.add_incoming(Arc::clone(&edge));
            self.transaction.touch(spec.name.clone());
            edges.push(edge);
        }

        let controller = ServiceController::new(
            self.name.clone(),
            Arc::clone(&self.registry),
            Arc::clone(&primary_registration),
            alias_registrations,
            edges,
            self.mode,
            service,
        );

        if self.mode == ServiceMode::Active {
            controller.activate_unconditional_demand(&self.transaction);
        }
        controller.initial_evaluate(&self.transaction);

        Ok(controller)
    }

    /// DFS from each dependency target's holder controller over its own
    /// outgoing edges, looking for a path back to this not-yet-installed
    /// service's name. Installing the edge set gathered so far would close
    /// a cycle iff such a path exists (I5).
    fn would_cycle(&self, target_registrations: &[Arc<Registration>]) -> bool {
        // A dependency naming this service directly is a zero-length cycle.
        if target_registrations.iter().any(|r| r.name() == &self.name) {
            return true;
        }
        let mut visited: FxHashSet<ServiceName> = FxHashSet::default();
        let mut stack: Vec<Arc<Registration>> = target_registrations.to_vec();
        while let Some(registration) = stack.pop() {
            if !visited.insert(registration.name().clone()) {
                continue;
            }
            let Some(holder) = registration.holder() else {
                continue;
            };
            for edge in holder.outgoing_edges() {
                let Some(next) = edge.target() else {
                    continue;
                };
                if next.name() == &self.name {
                    return true;
                }
                stack.push(next);
            }
        }
        false
    }
}
