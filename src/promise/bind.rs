//! Receiver propagation.
//!
//! `bind` creates a join node whose receiver is the (possibly pending)
//! receiver cell. Every cell derived from the join node inherits the receiver
//! and holds its reactions back until the receiver settles, so handlers
//! always see the receiver's final value regardless of which side settles
//! first.

use std::sync::Arc;

use parking_lot::Mutex;

use super::cell::{Lineage, Shared};
use super::Promise;
use crate::types::{Outcome, Value};

impl Promise {
    /// Returns a promise with the same outcome whose downstream handlers
    /// receive `receiver` (or its eventual value) as their first argument.
    ///
    /// If the receiver rejects before the source does, the bound promise
    /// rejects with the receiver's reason. If the source rejects first, its
    /// reason wins.
    pub fn bind(&self, receiver: impl Into<Value>) -> Self {
        let engine = self.engine();
        let receiver = engine.resolve(receiver).shared;
        self.shared.add_consumer();
        let join = Shared::new(
            engine.clone(),
            Lineage {
                receiver: Some(Arc::clone(&receiver)),
                cancellable: self.shared.is_cancellable(),
                parent: Some(Arc::downgrade(&self.shared)),
            },
        );
        let stash: Arc<Mutex<Option<Outcome>>> = Arc::default();

        {
            let join = Arc::clone(&join);
            let receiver = Arc::clone(&receiver);
            let stash = Arc::clone(&stash);
            self.shared.listen(move |outcome| {
                if outcome.is_rejected() {
                    join.settle(outcome);
                    return;
                }
                let mut stash = stash.lock();
                match receiver.outcome() {
                    Some(Outcome::Fulfilled(_)) => {
                        drop(stash);
                        join.settle(outcome);
                    }
                    Some(_) => {}
                    None => *stash = Some(outcome),
                }
            });
        }
        {
            let join = Arc::clone(&join);
            receiver.listen(move |state| {
                if let Some(reason) = state.reason() {
                    join.settle(Outcome::Rejected(reason.clone()));
                    return;
                }
                let stashed = stash.lock().take();
                if let Some(outcome) = stashed {
                    join.settle(outcome);
                }
            });
        }
        Self::from_shared(join)
    }

    /// The receiver bound to this promise's chain, if any.
    #[must_use]
    pub fn receiver(&self) -> Option<Self> {
        self.shared.receiver().map(Self::from_shared)
    }
}
