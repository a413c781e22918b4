//! Shared test doubles: a `Service` that records every `start`/`stop` call
//! and a pair of `TaskExecute`/`TaskRevert` hooks that record their labels,
//! used across the integration suites to assert on ordering without
//! depending on unrelated implementation details.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use container::{
    ExecuteContext, Service, ServiceOutcome, StartContext, StopContext, TaskCommit, TaskContext,
    TaskExecute, TaskOutcome, TaskRevert,
};

/// An append-only, thread-safe event log shared between test doubles and
/// the assertion at the end of a test.
#[derive(Clone, Default)]
pub struct CallLog {
    events: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

/// A `Service` whose `start` outcome is configurable and whose calls are
/// all recorded under one shared label.
pub struct RecordingService {
    label: &'static str,
    log: CallLog,
    fail_start: AtomicBool,
}

impl RecordingService {
    pub fn new(label: &'static str, log: CallLog) -> Arc<Self> {
        Arc::new(Self {
            label,
            log,
            fail_start: AtomicBool::new(false),
        })
    }

    pub fn failing(label: &'static str, log: CallLog) -> Arc<Self> {
        Arc::new(Self {
            label,
            log,
            fail_start: AtomicBool::new(true),
        })
    }
}

#[async_trait]
impl Service for RecordingService {
    async fn start(&self, _ctx: &StartContext<'_, '_>) -> ServiceOutcome {
        self.log.push(format!("{}.start", self.label));
        if self.fail_start.load(Ordering::Acquire) {
            ServiceOutcome::Failed
        } else {
            ServiceOutcome::Complete
        }
    }

    async fn stop(&self, _ctx: &StopContext<'_, '_>) {
        self.log.push(format!("{}.stop", self.label));
    }
}

/// A task `execute` hook that logs its label and completes normally.
pub struct LoggingExecute {
    label: &'static str,
    log: CallLog,
}

impl LoggingExecute {
    pub fn new(label: &'static str, log: CallLog) -> Arc<Self> {
        Arc::new(Self { label, log })
    }
}

#[async_trait]
impl TaskExecute for LoggingExecute {
    async fn execute(&self, _ctx: &ExecuteContext<'_>) -> TaskOutcome {
        self.log.push(self.label);
        TaskOutcome::Completed
    }
}

/// A task `execute` hook that always self-cancels; used to assert that a
/// cancelled task's revert hook never runs.
pub struct SelfCancellingExecute {
    label: &'static str,
    log: CallLog,
}

impl SelfCancellingExecute {
    pub fn new(label: &'static str, log: CallLog) -> Arc<Self> {
        Arc::new(Self { label, log })
    }
}

#[async_trait]
impl TaskExecute for SelfCancellingExecute {
    async fn execute(&self, _ctx: &ExecuteContext<'_>) -> TaskOutcome {
        self.log.push(self.label);
        TaskOutcome::Cancelled
    }
}

/// A task `revert` hook that logs its label.
pub struct LoggingRevert {
    label: &'static str,
    log: CallLog,
}

impl LoggingRevert {
    pub fn new(label: &'static str, log: CallLog) -> Arc<Self> {
        Arc::new(Self { label, log })
    }
}

#[async_trait]
impl TaskRevert for LoggingRevert {
    async fn revert(&self, _ctx: &TaskContext<'_>) {
        self.log.push(self.label);
    }
}

/// A task `commit` hook that logs its label.
pub struct LoggingCommit {
    label: &'static str,
    log: CallLog,
}

impl LoggingCommit {
    pub fn new(label: &'static str, log: CallLog) -> Arc<Self> {
        Arc::new(Self { label, log })
    }
}

#[async_trait]
impl TaskCommit for LoggingCommit {
    async fn commit(&self, _ctx: &TaskContext<'_>) {
        self.log.push(self.label);
    }
}
