//! The registration table: named slots, incoming dependency edges, and
//! registry-wide enable state.

pub mod registration;
pub mod registry;

pub use registration::Registration;
pub use registry::ServiceRegistry;
