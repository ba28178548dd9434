//! FIFO job queue drained by [`Engine::run_until_idle`](super::Engine::run_until_idle).
//!
//! Every reaction dispatch, deferred assimilation step and host callback is a
//! [`Job`]. Jobs are pushed from any call site and only ever run from the
//! drain loop, which refuses to nest: a handler that calls back into
//! `run_until_idle` gets 0 and returns immediately, so no two handlers ever
//! run inside one another's stack frames.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_queue::SegQueue;

use crate::promise::cell::{Reaction, Shared};
use crate::types::{Outcome, Value};

/// A unit of deferred work.
pub(crate) enum Job {
    /// Deliver a settled outcome to one reaction.
    Dispatch {
        reaction: Reaction,
        outcome: Outcome,
        context: Value,
    },
    /// Continue assimilating a value produced by a thenable callback.
    Resolve { target: Arc<Shared>, value: Value },
    /// A host callback queued through `Engine::enqueue`.
    Task(Box<dyn FnOnce() + Send>),
}

impl Job {
    /// Runs the job. Panics raised by user code inside are handled by the
    /// kernel at the handler boundary, except for `Task` which is guarded by
    /// the caller.
    pub(crate) fn run(self) {
        match self {
            Self::Dispatch {
                reaction,
                outcome,
                context,
            } => reaction.dispatch(outcome, &context),
            Self::Resolve { target, value } => target.resolve_with(value),
            Self::Task(task) => task(),
        }
    }

    #[cfg_attr(not(feature = "tracing-integration"), allow(dead_code))]
    pub(crate) const fn kind(&self) -> &'static str {
        match self {
            Self::Dispatch { .. } => "dispatch",
            Self::Resolve { .. } => "resolve",
            Self::Task(_) => "task",
        }
    }
}

/// Lock-free FIFO of pending jobs plus the drain-reentrancy flag.
pub(crate) struct JobQueue {
    jobs: SegQueue<Job>,
    draining: AtomicBool,
}

impl JobQueue {
    pub(crate) fn new() -> Self {
        Self {
            jobs: SegQueue::new(),
            draining: AtomicBool::new(false),
        }
    }

    pub(crate) fn push(&self, job: Job) {
        self.jobs.push(job);
    }

    pub(crate) fn pop(&self) -> Option<Job> {
        self.jobs.pop()
    }

    pub(crate) fn len(&self) -> usize {
        self.jobs.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Enters the drain loop, or returns `None` if a drain is already running.
    pub(crate) fn try_drain(&self) -> Option<DrainGuard<'_>> {
        self.draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| DrainGuard {
                flag: &self.draining,
            })
    }
}

/// Clears the draining flag on drop, including during unwinding.
pub(crate) struct DrainGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
