//! The engine: job queue, drain loop and unhandled-rejection reporting.
//!
//! An [`Engine`] is a cheap, clonable handle. Every promise remembers the
//! engine that created it and schedules its reactions there. Nothing runs
//! until the host calls [`Engine::run_until_idle`] (directly, or through the
//! [`LabRuntime`](crate::lab::LabRuntime)), which is the "later turn" of the
//! settlement contract.
//!
//! - [`config`]: engine configuration and defaults
//! - [`builder`]: [`EngineBuilder`]
//! - [`env_config`]: `PLEDGE_*` variables and TOML files
//! - [`unhandled`]: [`RejectionSink`]

pub mod builder;
pub mod config;
pub mod env_config;
pub(crate) mod scheduler;
pub mod unhandled;

pub use builder::EngineBuilder;
pub use config::EngineConfig;
pub use unhandled::RejectionSink;

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Error;
use crate::promise::cell::Shared;
use crate::promise::Promise;
use crate::tracing_compat::{debug, trace, warn};
use crate::types::Value;
pub(crate) use scheduler::Job;
use scheduler::JobQueue;
use unhandled::UnhandledTracker;

struct EngineInner {
    config: EngineConfig,
    queue: JobQueue,
    unhandled: Mutex<UnhandledTracker>,
}

/// Handle to a promise engine.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    /// Creates an engine with default configuration.
    #[must_use]
    pub fn new() -> Self {
        EngineBuilder::new().build()
    }

    /// Returns a builder.
    #[must_use]
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub(crate) fn with_config(config: EngineConfig) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                config,
                queue: JobQueue::new(),
                unhandled: Mutex::new(UnhandledTracker::default()),
            }),
        }
    }

    /// Returns the engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Returns true if both handles refer to the same engine.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Queues a host callback to run in a later turn, after everything
    /// already queued.
    pub fn enqueue<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.schedule(Job::Task(Box::new(task)));
    }

    /// Number of jobs waiting to run.
    #[must_use]
    pub fn pending_jobs(&self) -> usize {
        self.inner.queue.len()
    }

    pub(crate) fn schedule(&self, job: Job) {
        self.inner.queue.push(job);
    }

    /// Runs queued jobs until the queue is empty (or `max_drain_batch` jobs
    /// ran), then reports unhandled rejections. Returns the number of jobs
    /// executed.
    ///
    /// Calling this from inside a handler returns 0 without running anything.
    pub fn run_until_idle(&self) -> usize {
        let Some(_guard) = self.inner.queue.try_drain() else {
            return 0;
        };
        let limit = self.inner.config.max_drain_batch;
        let mut ran = 0;
        loop {
            while let Some(job) = self.inner.queue.pop() {
                self.run_job(job);
                ran += 1;
                if limit != 0 && ran >= limit {
                    trace!(jobs = ran, remaining = self.pending_jobs(), "drain batch limit reached");
                    return ran;
                }
            }
            self.report_unhandled();
            if self.inner.queue.is_empty() {
                break;
            }
        }
        trace!(jobs = ran, "drain cycle complete");
        ran
    }

    fn run_job(&self, job: Job) {
        trace!(job = job.kind(), "running job");
        match job {
            Job::Task(task) => {
                if let Err(reason) = self.invoke(|| {
                    task();
                    Ok(())
                }) {
                    warn!(reason = ?reason, "queued task failed");
                }
            }
            other => other.run(),
        }
    }

    /// Runs user code, converting a panic into an `ErrorKind::Panicked`
    /// rejection when `catch_panics` is on.
    pub(crate) fn invoke<T>(&self, f: impl FnOnce() -> Result<T, Value>) -> Result<T, Value> {
        if !self.inner.config.catch_panics {
            return f();
        }
        match std::panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(result) => result,
            Err(payload) => {
                let err = Error::panicked(&*payload);
                warn!(error = %err, "user code panicked");
                Err(err.into())
            }
        }
    }

    /// Installs the unhandled-rejection sink, returning the previous one.
    pub fn set_rejection_sink(&self, sink: Arc<dyn RejectionSink>) -> Option<Arc<dyn RejectionSink>> {
        self.inner.unhandled.lock().replace_sink(Some(sink))
    }

    /// Removes the unhandled-rejection sink, returning it.
    pub fn clear_rejection_sink(&self) -> Option<Arc<dyn RejectionSink>> {
        self.inner.unhandled.lock().replace_sink(None)
    }

    fn sink(&self) -> Option<Arc<dyn RejectionSink>> {
        self.inner.unhandled.lock().sink.clone()
    }

    pub(crate) fn track_unhandled(&self, cell: Arc<Shared>) {
        if self.inner.config.report_unhandled {
            self.inner.unhandled.lock().candidates.push(cell);
        }
    }

    fn report_unhandled(&self) {
        let (sink, candidates) = {
            let mut tracker = self.inner.unhandled.lock();
            (tracker.sink.clone(), tracker.take_candidates())
        };
        let include_cancelled = self.inner.config.report_cancellations;
        for cell in candidates {
            let Some(reason) = cell.claim_report(include_cancelled) else {
                continue;
            };
            let promise = Promise::from_shared(cell);
            match &sink {
                Some(sink) => sink.unhandled(&reason, &promise),
                None => warn!(promise = ?promise.id(), reason = ?reason, "unhandled rejection"),
            }
        }
    }

    /// Reports the rejection of a terminal (`done`) cell in the next turn,
    /// regardless of configuration.
    pub(crate) fn report_terminal(&self, cell: Arc<Shared>) {
        let engine = self.clone();
        self.enqueue(move || {
            let Some(reason) = cell.take_terminal_reason() else {
                return;
            };
            let promise = Promise::from_shared(cell);
            match engine.sink() {
                Some(sink) => sink.unhandled(&reason, &promise),
                None => warn!(promise = ?promise.id(), reason = ?reason, "error in done() handler"),
            }
        });
    }

    pub(crate) fn retract_unhandled(&self, cell: Arc<Shared>) {
        let promise = Promise::from_shared(cell);
        match self.sink() {
            Some(sink) => sink.handled(&promise),
            None => debug!(promise = ?promise.id(), "previously unhandled rejection handled"),
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.inner.config)
            .field("pending_jobs", &self.pending_jobs())
            .finish_non_exhaustive()
    }
}
