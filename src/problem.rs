//! The asynchronous failure channel: problems attached to a transaction by
//! task executables, and the severity rule that gates commit.

use std::fmt;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::name::ServiceName;

/// Severity of a single reported problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

/// A single problem attached to a transaction's report.
///
/// Attaching a problem never itself terminates the task that attached it —
/// the task still runs to completion from the runtime's point of view. An
/// `Error` or `Critical` problem simply means [`ProblemReport::can_commit`]
/// will return `false` for the rest of the transaction's life.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
    pub severity: Severity,
    pub message: String,
    /// The service the problem concerns, if any.
    pub service: Option<ServiceName>,
}

impl Problem {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            service: None,
        }
    }

    pub fn for_service(mut self, name: ServiceName) -> Self {
        self.service = Some(name);
        self
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Severity::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    pub fn critical(message: impl Into<String>) -> Self {
        Self::new(Severity::Critical, message)
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.service {
            Some(name) => write!(f, "[{:?}] {} ({name})", self.severity, self.message),
            None => write!(f, "[{:?}] {}", self.severity, self.message),
        }
    }
}

/// An append-only, thread-safe collection of [`Problem`]s attached over the
/// lifetime of one transaction.
#[derive(Debug, Default)]
pub struct ProblemReport {
    problems: Mutex<Vec<Problem>>,
}

impl ProblemReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, problem: Problem) {
        tracing::debug!(severity = ?problem.severity, message = %problem.message, "problem attached to transaction");
        self.problems.lock().push(problem);
    }

    /// Snapshot of all problems reported so far.
    pub fn problems(&self) -> Vec<Problem> {
        self.problems.lock().clone()
    }

    /// Drop every reported problem. Used by `Transaction::restart`, which
    /// re-enters the active phase with a clean slate.
    pub fn clear(&self) {
        self.problems.lock().clear();
    }

    /// `false` once any `Error` or `Critical` problem has been reported —
    /// the transaction must be aborted rather than committed.
    pub fn can_commit(&self) -> bool {
        !self
            .problems
            .lock()
            .iter()
            .any(|p| p.severity >= Severity::Error)
    }
}
