//! Synchronous error surface.
//!
//! Builder and controller operations fail immediately through this type when
//! the request is inconsistent with current state; no transaction state
//! changes when one of these is returned. Asynchronous, task-level failures
//! are reported through [`crate::problem::ProblemReport`] instead — see
//! that module for the other half of the error story.

use thiserror::Error;

use crate::name::ServiceName;

/// Top-level synchronous error for the container's public surface.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContainerError {
    /// Installation targeted a name that already has a controller installed.
    #[error("duplicate service: '{0}' is already installed")]
    DuplicateService(ServiceName),

    /// Installing the new controller would introduce a cycle in the
    /// dependency graph. The registration is left untouched.
    #[error("installing '{0}' would introduce a dependency cycle")]
    Cycle(ServiceName),

    /// A lookup found no registration, or a registration with no holder.
    #[error("service not found: '{0}'")]
    ServiceNotFound(ServiceName),

    /// A transaction phase transition was requested that the transaction's
    /// current phase does not allow (e.g. commit after commit).
    #[error("invalid transaction state: {0}")]
    InvalidTransactionState(&'static str),

    /// Mutating operation on a controller that has been removed or is in
    /// the process of being removed.
    #[error("cannot operate on removed service: '{0}'")]
    CannotOperateOnRemoved(ServiceName),

    /// `retry` was called on a controller that is not currently FAILED.
    #[error("service '{0}' is not in the FAILED state")]
    NotInFailedState(ServiceName),

    /// An operation that requires an UP controller was attempted while it
    /// was not UP.
    #[error("service '{0}' is not in the UP state")]
    NotInUpState(ServiceName),

    /// A dependency edge was built against a registration that belongs to
    /// a different registry than the one the builder was bound to.
    #[error("dependency target '{0}' belongs to a foreign controller")]
    DependencyFromForeignController(ServiceName),
}
