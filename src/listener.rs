//! The `Listener` collaborator interface and the notification-queue shape
//! used by the service controller's enable/disable/remove/replace callbacks.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;

/// A single-method callback, invoked at most once per registration in a
/// queue. Listener failures are logged and swallowed — they never
/// propagate into the controller or transaction that invoked them.
pub trait Listener<T>: Send + Sync {
    fn handle_event(&self, value: T);
}

impl<T, F> Listener<T> for F
where
    F: Fn(T) + Send + Sync,
{
    fn handle_event(&self, value: T) {
        self(value);
    }
}

/// A small persistent stack of listeners, built under the owning entity's
/// lock and drained outside it.
///
/// Draining clears the queue and returns its contents in insertion order;
/// firing happens after the caller has released whatever lock guarded the
/// mutation that triggered the drain, per the "no user code under a
/// controller lock" rule.
pub struct NotificationQueue<T> {
    listeners: Mutex<Vec<Arc<dyn Listener<T>>>>,
}

impl<T> Default for NotificationQueue<T> {
    fn default() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
        }
    }
}

impl<T: Clone + 'static> NotificationQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a listener. Safe to call under the owning entity's lock.
    pub fn push(&self, listener: Arc<dyn Listener<T>>) {
        self.listeners.lock().push(listener);
    }

    /// Take every queued listener, leaving the queue empty.
    pub fn drain(&self) -> Vec<Arc<dyn Listener<T>>> {
        std::mem::take(&mut *self.listeners.lock())
    }

    /// Drain and fire every queued listener with a clone of `value`, each
    /// exactly once, in FIFO order. Must be called without holding the
    /// owning entity's lock.
    pub fn drain_and_fire(&self, value: T) {
        for listener in self.drain() {
            let value = value.clone();
            if catch_unwind(AssertUnwindSafe(|| listener.handle_event(value))).is_err() {
                tracing::error!("listener panicked; swallowed");
            }
        }
    }
}
