//! The service layer: modes, states, the user-facing `Service` contract,
//! the per-service controller state machine, and the fluent installation
//! API bound to an update transaction.

pub mod builder;
pub mod context;
pub mod controller;
pub mod hooks;
pub mod mode;
pub mod state;

pub use builder::ServiceBuilder;
pub use context::ServiceContext;
pub use controller::ServiceController;
pub use hooks::{Service, ServiceOutcome, StartContext, StopContext};
pub use mode::ServiceMode;
pub use state::ServiceState;
