//! Resolution: turning an arbitrary value into a settlement.
//!
//! Resolving a cell with a plain value fulfills it. Resolving it with a
//! native promise makes the cell follow that promise. Resolving it with a
//! [`Thenable`] subscribes to the foreign object once; the first callback
//! invocation wins and every later one is ignored. Resolving a cell with
//! itself, directly or through a thenable that hands itself back, rejects
//! with `ErrorKind::CircularAssimilation`.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::cell::{Reaction, Shared};
use crate::error::Error;
use crate::runtime::Job;
use crate::tracing_compat::debug;
use crate::types::{Outcome, Value};

/// A foreign object with a subscription capability.
///
/// `then` may call either callback synchronously, later, more than once, or
/// never. Only the first call counts. Returning `Err` means subscribing
/// failed; it rejects the adopting promise unless a callback already fired.
pub trait Thenable: Send + Sync {
    /// Subscribes to the object's eventual result.
    fn then(&self, on_fulfilled: ThenCallback, on_rejected: ThenCallback) -> Result<(), Value>;
}

/// Callback handed to [`Thenable::then`].
#[derive(Clone)]
pub struct ThenCallback {
    f: Arc<dyn Fn(Value) + Send + Sync>,
}

impl ThenCallback {
    pub(crate) fn new<F>(f: F) -> Self
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        Self { f: Arc::new(f) }
    }

    /// Delivers a value or reason.
    pub fn call(&self, value: impl Into<Value>) {
        (self.f)(value.into());
    }
}

impl fmt::Debug for ThenCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ThenCallback")
    }
}

/// A [`Thenable`] backed by a closure.
pub struct FnThenable<F> {
    subscribe: F,
}

impl<F> FnThenable<F>
where
    F: Fn(ThenCallback, ThenCallback) -> Result<(), Value> + Send + Sync + 'static,
{
    /// Wraps a subscription closure.
    pub const fn new(subscribe: F) -> Self {
        Self { subscribe }
    }
}

impl<F> Thenable for FnThenable<F>
where
    F: Fn(ThenCallback, ThenCallback) -> Result<(), Value> + Send + Sync + 'static,
{
    fn then(&self, on_fulfilled: ThenCallback, on_rejected: ThenCallback) -> Result<(), Value> {
        (self.subscribe)(on_fulfilled, on_rejected)
    }
}

fn thenable_addr(thenable: &Arc<dyn Thenable>) -> usize {
    Arc::as_ptr(thenable).cast::<()>() as usize
}

impl Shared {
    /// Resolves this cell with `value`, following promises and thenables.
    pub(crate) fn resolve_with(self: &Arc<Self>, value: Value) {
        match value {
            Value::Promise(p) if Arc::ptr_eq(&p.shared, self) => {
                debug!(cell = ?self.id, "promise resolved with itself");
                self.settle(Outcome::Rejected(Error::circular(self.id).into()));
            }
            Value::Promise(p) => {
                p.shared.register(Reaction::Adopt {
                    target: Arc::clone(self),
                });
            }
            Value::Thenable(thenable) => self.assimilate(&thenable),
            other => {
                self.settle(Outcome::Fulfilled(other));
            }
        }
    }

    fn assimilate(self: &Arc<Self>, thenable: &Arc<dyn Thenable>) {
        let fired = Arc::new(AtomicBool::new(false));
        let own = thenable_addr(thenable);

        let on_fulfilled = {
            let fired = Arc::clone(&fired);
            let cell = Arc::clone(self);
            ThenCallback::new(move |value| {
                if fired.swap(true, Ordering::AcqRel) {
                    return;
                }
                match value {
                    Value::Thenable(ref next) if thenable_addr(next) == own => {
                        debug!(cell = ?cell.id, "thenable resolved with itself");
                        cell.settle(Outcome::Rejected(Error::circular(cell.id).into()));
                    }
                    Value::Thenable(_) => cell.engine.schedule(Job::Resolve {
                        target: Arc::clone(&cell),
                        value,
                    }),
                    other => cell.resolve_with(other),
                }
            })
        };
        let on_rejected = {
            let fired = Arc::clone(&fired);
            let cell = Arc::clone(self);
            ThenCallback::new(move |reason| {
                if fired.swap(true, Ordering::AcqRel) {
                    return;
                }
                cell.settle(Outcome::Rejected(reason));
            })
        };

        let subscribed = self
            .engine
            .invoke(|| thenable.then(on_fulfilled, on_rejected));
        if let Err(reason) = subscribed {
            if !fired.swap(true, Ordering::AcqRel) {
                self.settle(Outcome::Rejected(reason));
            }
        }
    }
}
