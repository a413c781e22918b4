//! Hold handles: pin a transaction in its active phase until every
//! outstanding handle has been dropped.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

#[derive(Default)]
pub(crate) struct HoldState {
    count: AtomicUsize,
    idle: Notify,
}

impl HoldState {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn acquire(self: &Arc<Self>) -> HoldHandle {
        self.count.fetch_add(1, Ordering::AcqRel);
        HoldHandle {
            state: Arc::clone(self),
        }
    }

    pub(crate) async fn wait_released(&self) {
        loop {
            if self.count.load(Ordering::Acquire) == 0 {
                return;
            }
            let notified = self.idle.notified();
            if self.count.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// RAII guard returned by [`crate::transaction::transaction::Transaction::acquire_hold`].
/// While any hold handle for a transaction is outstanding, `prepare` on
/// that transaction blocks before advancing past the active phase.
pub struct HoldHandle {
    state: Arc<HoldState>,
}

impl Drop for HoldHandle {
    fn drop(&mut self) {
        if self.state.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.state.idle.notify_waiters();
        }
    }
}
