//! The `TransactionController`: creation of read/update transactions,
//! their mutual exclusion, and the phase-transition surface (`prepare`,
//! `commit`, `abort`, `restart`, `upgrade`, `downgrade`).

use std::sync::Arc;

use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

use crate::error::ContainerError;
use crate::task::Executor;
use crate::transaction::transaction::{Transaction, TransactionKind};

/// An update transaction, plus the write-side of the controller's
/// exclusivity lock. Dropping the handle (after `commit`/`abort` consume
/// it) releases the lock for the next update transaction.
pub struct UpdateTransactionHandle {
    pub transaction: Arc<Transaction>,
    guard: OwnedRwLockWriteGuard<()>,
}

/// A read transaction, plus the read-side of the controller's
/// exclusivity lock. Any number of these may be outstanding at once, but
/// none may coexist with an `UpdateTransactionHandle`.
pub struct ReadTransactionHandle {
    pub transaction: Arc<Transaction>,
    guard: OwnedRwLockReadGuard<()>,
}

/// At most one update transaction may be active at a time; read
/// transactions may run concurrently with each other but never with an
/// update transaction. A `tokio::sync::RwLock<()>` models exactly this
/// admission rule — its permit, not its `()` payload, is what matters.
pub struct TransactionController {
    lock: Arc<RwLock<()>>,
    executor: Arc<dyn Executor>,
}

impl TransactionController {
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self {
            lock: Arc::new(RwLock::new(())),
            executor,
        }
    }

    pub async fn create_update(&self) -> UpdateTransactionHandle {
        let guard = Arc::clone(&self.lock).write_owned().await;
        let transaction = Transaction::new(TransactionKind::Update, Arc::clone(&self.executor));
        UpdateTransactionHandle { transaction, guard }
    }

    pub async fn create_read(&self) -> ReadTransactionHandle {
        let guard = Arc::clone(&self.lock).read_owned().await;
        let transaction = Transaction::new(TransactionKind::Read, Arc::clone(&self.executor));
        ReadTransactionHandle { transaction, guard }
    }

    pub async fn prepare(&self, handle: &UpdateTransactionHandle) -> Result<(), ContainerError> {
        handle.transaction.prepare().await
    }

    pub fn can_commit(&self, handle: &UpdateTransactionHandle) -> bool {
        handle.transaction.can_commit()
    }

    /// Consumes the handle: the exclusivity guard is released once this
    /// returns, whatever the outcome.
    pub async fn commit(&self, handle: UpdateTransactionHandle) -> Result<(), ContainerError> {
        handle.transaction.commit().await
    }

    pub async fn abort(&self, handle: UpdateTransactionHandle) -> Result<(), ContainerError> {
        handle.transaction.abort().await
    }

    /// Reverts every task executed so far and re-enters the active phase
    /// with a cleared task set; the exclusivity guard is retained, since
    /// the same update transaction continues.
    pub async fn restart(&self, handle: &UpdateTransactionHandle) -> Result<(), ContainerError> {
        handle.transaction.restart().await
    }

    /// Read-to-update upgrade. Drops the read guard first, then attempts
    /// to acquire the write side without blocking — per the distilled
    /// spec, an incompatible concurrent transaction causes upgrade to
    /// fail with no side effects, rather than queue behind it.
    pub fn upgrade(
        &self,
        read: ReadTransactionHandle,
    ) -> Result<UpdateTransactionHandle, (ContainerError, Arc<Transaction>)> {
        let ReadTransactionHandle { transaction, guard } = read;
        drop(guard);
        match Arc::clone(&self.lock).try_write_owned() {
            Ok(guard) => {
                transaction.set_kind(TransactionKind::Update);
                Ok(UpdateTransactionHandle { transaction, guard })
            }
            Err(_) => {
                // The read guard is already gone (tokio's RwLock can't try-acquire
                // a write lock while we hold our own read lock), so a failed
                // upgrade leaves this transaction with no active guard at all.
                // The transaction is returned for inspection but must not be used
                // for further phase transitions; callers should treat this as
                // the transaction having been implicitly aborted.
                Err((
                    ContainerError::InvalidTransactionState(
                        "upgrade failed: an incompatible transaction is active",
                    ),
                    transaction,
                ))
            }
        }
    }

    /// Update-to-read downgrade. Drops the write guard first, then
    /// acquires the read side — always succeeds, since dropping a write
    /// guard never leaves an incompatible transaction holding the lock.
    pub async fn downgrade(&self, update: UpdateTransactionHandle) -> ReadTransactionHandle {
        let UpdateTransactionHandle { transaction, guard } = update;
        drop(guard);
        transaction.set_kind(TransactionKind::Read);
        let guard = Arc::clone(&self.lock).read_owned().await;
        ReadTransactionHandle { transaction, guard }
    }
}
