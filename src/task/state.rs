//! Internal task lifecycle states.

/// A task's internal state, per the distilled state set: `{new, executing,
/// executed, cancelled, validating, validated, committing, reverting,
/// done}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    New,
    Executing,
    Executed,
    Cancelled,
    Validating,
    Validated,
    Committing,
    Reverting,
    Done,
}

impl TaskState {
    /// A task has "terminated" (from the EXECUTE phase's point of view)
    /// once it is `Executed` or `Cancelled` — this is what PREPARE waits
    /// for and what gates a successor's EXECUTE entry.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Executed | TaskState::Cancelled)
    }

    pub fn is_cancelled(self) -> bool {
        matches!(self, TaskState::Cancelled)
    }
}
