//! Convenience methods layered over `then`.

use std::sync::Arc;

use parking_lot::Mutex;

use super::Promise;
use crate::types::{Outcome, Value};

/// Holds a `FnOnce` shared by a fulfillment and a rejection handler; only
/// the first taker gets it.
struct Once<F>(Arc<Mutex<Option<F>>>);

impl<F> Once<F> {
    fn new(f: F) -> Self {
        Self(Arc::new(Mutex::new(Some(f))))
    }

    fn take(&self) -> Option<F> {
        self.0.lock().take()
    }
}

impl<F> Clone for Once<F> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl Promise {
    /// Catches only rejections whose reason satisfies `predicate`; others
    /// pass through unchanged.
    #[must_use = "the derived promise carries the handler's result"]
    pub fn catch_if<P, R>(&self, predicate: P, on_rejected: R) -> Self
    where
        P: FnOnce(&Value) -> bool + Send + 'static,
        R: FnOnce(&Value, Value) -> Result<Value, Value> + Send + 'static,
    {
        self.catch(move |this, reason| {
            if predicate(&reason) {
                on_rejected(this, reason)
            } else {
                Err(reason)
            }
        })
    }

    /// Runs `f` whatever the outcome, then passes the original outcome
    /// through. If `f` returns a promise or thenable the pass-through waits
    /// for it; if that rejects, or `f` fails, the new reason replaces the
    /// original outcome.
    #[must_use = "the derived promise carries the original outcome"]
    pub fn finally<F>(&self, f: F) -> Self
    where
        F: FnOnce(&Value) -> Result<Value, Value> + Send + 'static,
    {
        let slot = Once::new(f);
        let engine = self.engine().clone();
        let run = move |this: &Value, original: Outcome| -> Result<Value, Value> {
            let Some(f) = slot.take() else {
                return original.into_result();
            };
            let returned = f(this)?;
            if returned.is_promise_like() {
                let waited = engine
                    .resolve(returned)
                    .then(move |_, _| original.into_result());
                return Ok(waited.into());
            }
            original.into_result()
        };
        let run_rejected = run.clone();
        self.then_both(
            move |this, value| run(this, Outcome::Fulfilled(value)),
            move |this, reason| run_rejected(this, Outcome::Rejected(reason)),
        )
    }

    /// Calls `f` with the fulfillment value and passes the value through,
    /// waiting first if `f` returns a promise or thenable.
    #[must_use = "the derived promise carries the original value"]
    pub fn tap<F>(&self, f: F) -> Self
    where
        F: FnOnce(&Value, &Value) -> Result<Value, Value> + Send + 'static,
    {
        let engine = self.engine().clone();
        self.then(move |this, value| {
            let returned = f(this, &value)?;
            if returned.is_promise_like() {
                let waited = engine.resolve(returned).then(move |_, _| Ok(value));
                return Ok(waited.into());
            }
            Ok(value)
        })
    }

    /// Reads a property of the fulfillment value (see [`Value::property`]).
    #[must_use = "the derived promise carries the property value"]
    pub fn get(&self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.then(move |_, value| Ok(value.property(&key)))
    }

    /// Terminal registration. Errors raised by either handler, and
    /// rejections neither handler recovers, are always reported to the
    /// rejection sink.
    pub fn done<F, R>(&self, on_fulfilled: F, on_rejected: R)
    where
        F: FnOnce(&Value, Value) -> Result<Value, Value> + Send + 'static,
        R: FnOnce(&Value, Value) -> Result<Value, Value> + Send + 'static,
    {
        let terminal = self.then_both(on_fulfilled, on_rejected);
        terminal.shared.mark_terminal();
    }

    /// Calls `callback(None, value)` on fulfillment or
    /// `callback(Some(reason), Undefined)` on rejection, and returns this
    /// promise. A failing callback is reported like a `done` handler error.
    pub fn nodeify<C>(&self, callback: C) -> Self
    where
        C: FnOnce(Option<Value>, Value) + Send + 'static,
    {
        let slot = Once::new(callback);
        let on_rejected = slot.clone();
        self.done(
            move |_, value| {
                if let Some(callback) = slot.take() {
                    callback(None, value);
                }
                Ok(Value::Undefined)
            },
            move |_, reason| {
                if let Some(callback) = on_rejected.take() {
                    callback(Some(reason), Value::Undefined);
                }
                Ok(Value::Undefined)
            },
        );
        self.clone()
    }
}
