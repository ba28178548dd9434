//! Unhandled-rejection reporting.
//!
//! A rejected cell becomes a *candidate* when it flushes without any
//! registered reaction. Once the job queue drains, every candidate that is
//! still unhandled is reported exactly once. Registering a reaction on a
//! reported cell later retracts the report through [`RejectionSink::handled`].
//!
//! With no sink installed, reports become `tracing` warnings.

use std::sync::Arc;

use crate::promise::cell::Shared;
use crate::promise::Promise;
use crate::types::Value;

/// Observer for rejections nobody handled.
///
/// One sink is active per engine; installing a new one replaces the old.
pub trait RejectionSink: Send + Sync {
    /// A rejection went unhandled through a full drain cycle.
    fn unhandled(&self, reason: &Value, promise: &Promise);

    /// A previously reported promise gained a handler.
    fn handled(&self, promise: &Promise) {
        let _ = promise;
    }
}

/// Engine-side bookkeeping: the active sink plus candidates awaiting the end
/// of the current drain.
#[derive(Default)]
pub(crate) struct UnhandledTracker {
    pub(crate) sink: Option<Arc<dyn RejectionSink>>,
    pub(crate) candidates: Vec<Arc<Shared>>,
}

impl UnhandledTracker {
    pub(crate) fn replace_sink(
        &mut self,
        sink: Option<Arc<dyn RejectionSink>>,
    ) -> Option<Arc<dyn RejectionSink>> {
        std::mem::replace(&mut self.sink, sink)
    }

    pub(crate) fn take_candidates(&mut self) -> Vec<Arc<Shared>> {
        std::mem::take(&mut self.candidates)
    }
}
