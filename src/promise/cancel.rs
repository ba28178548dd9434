//! Cooperative cancellation.
//!
//! Cancelling a cell walks upward along chain edges while the next ancestor
//! is pending, cancellable and has no other pending consumer, settles the
//! highest such cell as `Cancelled`, and lets the rejection flow back down
//! through ordinary dispatch. A fan-out ancestor still needed by another
//! branch stops the walk, so the first of two sibling cancellations only
//! cancels its own branch; the second one, now the last consumer, reaches
//! the shared ancestor.

use std::sync::Arc;

use super::cell::{Reaction, Shared};
use super::Promise;
use crate::error::Error;
use crate::tracing_compat::debug;
use crate::types::{Outcome, Value};

impl Promise {
    /// Marks this promise cancellable in place. Cells derived from it
    /// afterwards inherit the flag.
    #[must_use]
    pub fn cancellable(&self) -> Self {
        self.shared.set_cancellable(true);
        self.clone()
    }

    /// Returns a follower that cannot be cancelled and has no chain edge, so
    /// cancellations on it or its descendants never reach this promise.
    #[must_use]
    pub fn uncancellable(&self) -> Self {
        let follower = self.shared.detached(false);
        self.shared.register(Reaction::Adopt {
            target: Arc::clone(&follower),
        });
        Self::from_shared(follower)
    }

    /// Like [`then_both`](Self::then_both), but cancelling the result never
    /// propagates to this promise.
    #[must_use = "the derived promise carries the handler's result"]
    pub fn fork<F, R>(&self, on_fulfilled: F, on_rejected: R) -> Self
    where
        F: FnOnce(&Value, Value) -> Result<Value, Value> + Send + 'static,
        R: FnOnce(&Value, Value) -> Result<Value, Value> + Send + 'static,
    {
        let child = self.shared.detached(self.shared.is_cancellable());
        self.shared.register(Reaction::Then {
            target: Arc::clone(&child),
            on_fulfilled: Some(Box::new(on_fulfilled)),
            on_rejected: Some(Box::new(on_rejected)),
        });
        Self::from_shared(child)
    }

    /// Requests cancellation. Returns false if this promise is settled or
    /// not cancellable; otherwise some cell on the upward path was cancelled
    /// with `reason` (default: an `ErrorKind::Cancelled` error).
    pub fn cancel(&self, reason: Option<Value>) -> bool {
        if !self.shared.is_cancellable() || !self.shared.is_pending() {
            return false;
        }
        let reason = reason.unwrap_or_else(|| Error::cancelled().into());
        let target = cancel_target(&self.shared);
        debug!(
            requested = ?self.shared.id,
            target = ?target.id,
            "cancellation target selected"
        );
        let parent = target.parent();
        if !target.settle(Outcome::Cancelled(reason)) {
            return false;
        }
        if let Some(parent) = parent {
            parent.detach(&target);
        }
        true
    }
}

fn cancel_target(start: &Arc<Shared>) -> Arc<Shared> {
    let mut target = Arc::clone(start);
    while let Some(parent) = target.parent() {
        if !parent.yields_to_child_cancel() {
            break;
        }
        target = parent;
    }
    target
}
