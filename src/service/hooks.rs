//! The user-supplied `Service` contract and the contexts handed to it.

use async_trait::async_trait;

use crate::problem::ProblemReport;
use crate::task::{ExecuteContext, TaskContext};

/// What a service's `start` attempt terminated with. The distilled spec's
/// "exactly one terminating call" contract is naturally expressed here as
/// a single return value rather than a `complete`/`fail` callback pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceOutcome {
    Complete,
    Failed,
}

/// View handed to [`Service::start`]: problem reporting and cancellation,
/// nothing else — the core never interprets what a service does with its
/// own resources.
pub struct StartContext<'a, 'b> {
    pub(crate) execute: &'a ExecuteContext<'b>,
}

impl StartContext<'_, '_> {
    pub fn problems(&self) -> &ProblemReport {
        self.execute.problems()
    }

    pub fn is_cancelled(&self) -> bool {
        self.execute.is_cancelled()
    }
}

/// View handed to [`Service::stop`].
pub struct StopContext<'a, 'b> {
    pub(crate) task: &'a TaskContext<'b>,
}

impl StopContext<'_, '_> {
    pub fn problems(&self) -> &ProblemReport {
        self.task.problems()
    }
}

/// The external collaborator whose lifecycle the container drives. The
/// core never inspects what either hook does internally; it only acts on
/// the returned [`ServiceOutcome`] (for `start`) or plain completion (for
/// `stop`).
#[async_trait]
pub trait Service: Send + Sync {
    async fn start(&self, ctx: &StartContext<'_, '_>) -> ServiceOutcome;
    async fn stop(&self, ctx: &StopContext<'_, '_>);
}
