//! Transaction lifecycle: phases, the exclusivity controller, and hold
//! handles.

pub mod controller;
pub mod hold;
pub mod transaction;

pub use controller::{ReadTransactionHandle, TransactionController, UpdateTransactionHandle};
pub use hold::HoldHandle;
pub use transaction::{
    PostPrepareListener, PostRestartListener, Transaction, TransactionKind, TransactionPhase,
};
