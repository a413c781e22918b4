//! Service controller lifecycle states.

/// The distilled state set `{DOWN, STARTING, UP, FAILED, STOPPING,
/// REMOVING, REMOVED}`, unabridged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Down,
    Starting,
    Up,
    Failed,
    Stopping,
    Removing,
    Removed,
}
