//! Promises: creation, chaining and inspection.
//!
//! A [`Promise`] is a shared handle to a settlement cell. Handlers attached
//! with [`Promise::then`] never run during the call that attaches them; they
//! run from the engine's job queue, in registration order, after the promise
//! settles. A handler receives the bound receiver (see [`Promise::bind`]) and
//! the value or reason; returning `Err` rejects the derived promise and
//! returning a promise or thenable makes the derived promise follow it.
//!
//! Submodules:
//! - `cell`: settlement cells and the settlement protocol
//! - `assimilate`: resolution of promises and thenables
//! - `resolver`: [`Resolver`] and [`Deferred`]
//! - `bind`: receiver propagation
//! - `cancel`: cancellation and forking
//! - `sugar`: `catch_if`, `finally`, `tap`, `get`, `done`, `nodeify`

mod assimilate;
mod bind;
mod cancel;
pub(crate) mod cell;
mod resolver;
mod sugar;

pub use assimilate::{FnThenable, ThenCallback, Thenable};
pub use resolver::{Deferred, Resolver};

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use cell::{Handler, Reaction, Shared};
use crate::runtime::Engine;
use crate::types::{CellId, Outcome, Value};

/// Shared handle to an eventual value.
#[derive(Clone)]
pub struct Promise {
    pub(crate) shared: Arc<Shared>,
}

impl Promise {
    pub(crate) const fn from_shared(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Unique id of the underlying cell.
    #[must_use]
    pub fn id(&self) -> CellId {
        self.shared.id
    }

    /// The engine this promise schedules on.
    #[must_use]
    pub fn engine(&self) -> &Engine {
        &self.shared.engine
    }

    /// Returns true until the promise settles.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.shared.is_pending()
    }

    /// Returns true if the promise fulfilled.
    #[must_use]
    pub fn is_fulfilled(&self) -> bool {
        self.outcome().is_some_and(|o| o.is_fulfilled())
    }

    /// Returns true if the promise rejected, cancellation included.
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        self.outcome().is_some_and(|o| o.is_rejected())
    }

    /// Returns true if the promise was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.outcome().is_some_and(|o| o.is_cancelled())
    }

    /// Returns true if [`cancel`](Self::cancel) may act on this promise.
    #[must_use]
    pub fn is_cancellable(&self) -> bool {
        self.shared.is_cancellable()
    }

    /// The settled outcome, or `None` while pending.
    #[must_use]
    pub fn outcome(&self) -> Option<Outcome> {
        self.shared.outcome()
    }

    /// The fulfillment value, if fulfilled.
    #[must_use]
    pub fn value(&self) -> Option<Value> {
        self.outcome().and_then(|o| o.value().cloned())
    }

    /// The rejection reason, if rejected or cancelled.
    #[must_use]
    pub fn reason(&self) -> Option<Value> {
        self.outcome().and_then(|o| o.reason().cloned())
    }

    /// Attaches a fulfillment handler. Rejections pass through unchanged.
    #[must_use = "the derived promise carries the handler's result"]
    pub fn then<F>(&self, on_fulfilled: F) -> Self
    where
        F: FnOnce(&Value, Value) -> Result<Value, Value> + Send + 'static,
    {
        self.chain(Some(Box::new(on_fulfilled)), None)
    }

    /// Attaches both a fulfillment and a rejection handler.
    #[must_use = "the derived promise carries the handler's result"]
    pub fn then_both<F, R>(&self, on_fulfilled: F, on_rejected: R) -> Self
    where
        F: FnOnce(&Value, Value) -> Result<Value, Value> + Send + 'static,
        R: FnOnce(&Value, Value) -> Result<Value, Value> + Send + 'static,
    {
        self.chain(Some(Box::new(on_fulfilled)), Some(Box::new(on_rejected)))
    }

    /// Attaches a rejection handler. Fulfillment passes through unchanged.
    #[must_use = "the derived promise carries the handler's result"]
    pub fn catch<R>(&self, on_rejected: R) -> Self
    where
        R: FnOnce(&Value, Value) -> Result<Value, Value> + Send + 'static,
    {
        self.chain(None, Some(Box::new(on_rejected)))
    }

    pub(crate) fn chain(&self, on_fulfilled: Option<Handler>, on_rejected: Option<Handler>) -> Self {
        let child = self.shared.derive();
        self.shared.register(Reaction::Then {
            target: Arc::clone(&child),
            on_fulfilled,
            on_rejected,
        });
        Self::from_shared(child)
    }
}

impl PartialEq for Promise {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl Eq for Promise {}

impl Hash for Promise {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.shared.id.hash(state);
    }
}

impl fmt::Debug for Promise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("id", &self.shared.id)
            .field("outcome", &self.outcome())
            .field("cancellable", &self.is_cancellable())
            .finish()
    }
}

/// Construction API.
impl Engine {
    /// Runs `executor` synchronously with a fresh resolver. An `Err` return
    /// or a panic rejects the promise unless the resolver was already used.
    pub fn promise<F>(&self, executor: F) -> Promise
    where
        F: FnOnce(Resolver) -> Result<(), Value>,
    {
        let resolver = Resolver::new(Shared::root(self));
        let promise = resolver.promise();
        let handle = resolver.clone();
        if let Err(reason) = self.invoke(move || executor(handle)) {
            resolver.reject(reason);
        }
        promise
    }

    /// Creates a pending promise and its resolver.
    #[must_use]
    pub fn defer(&self) -> Deferred {
        let resolver = Resolver::new(Shared::root(self));
        Deferred {
            promise: resolver.promise(),
            resolver,
        }
    }

    /// Converts a value into a promise. Native promises are returned as-is;
    /// thenables are assimilated; anything else fulfills.
    pub fn resolve(&self, value: impl Into<Value>) -> Promise {
        match value.into() {
            Value::Promise(p) => p,
            other => {
                let shared = Shared::root(self);
                shared.claim();
                shared.resolve_with(other);
                Promise::from_shared(shared)
            }
        }
    }

    /// Creates a promise rejected with `reason`.
    pub fn reject(&self, reason: impl Into<Value>) -> Promise {
        let shared = Shared::root(self);
        shared.settle(Outcome::Rejected(reason.into()));
        Promise::from_shared(shared)
    }

    /// Shorthand for `engine.resolve(value).bind(receiver)`.
    pub fn bind(&self, receiver: impl Into<Value>, value: impl Into<Value>) -> Promise {
        self.resolve(value).bind(receiver)
    }

    /// Wraps `f` so that every call returns a promise.
    ///
    /// The wrapper passes its receiver and arguments through. A returned
    /// promise is handed back unchanged (keeping its binding); any other
    /// value resolves, and an `Err` or panic rejects.
    pub fn method<F>(&self, f: F) -> impl Fn(&Value, Vec<Value>) -> Promise + Send + Sync
    where
        F: Fn(&Value, Vec<Value>) -> Result<Value, Value> + Send + Sync + 'static,
    {
        let engine = self.clone();
        move |receiver: &Value, args: Vec<Value>| match engine.invoke(|| f(receiver, args)) {
            Ok(Value::Promise(p)) => p,
            Ok(value) => engine.resolve(value),
            Err(reason) => engine.reject(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::test_utils::{init_test_logging, test_engine};
    use parking_lot::Mutex;

    fn init_test(name: &str) -> Engine {
        init_test_logging();
        crate::test_phase!(name);
        test_engine()
    }

    #[test]
    fn handlers_never_run_synchronously() {
        let engine = init_test("handlers_never_run_synchronously");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let p = engine.resolve(1);
        let s = Arc::clone(&seen);
        let q = p.then(move |_, v| {
            s.lock().push(v.clone());
            Ok(v)
        });
        assert!(seen.lock().is_empty());
        assert!(q.is_pending());
        engine.run_until_idle();
        assert_eq!(*seen.lock(), vec![Value::from(1)]);
        crate::assert_fulfilled!(q, 1);
        crate::test_complete!("handlers_never_run_synchronously");
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let engine = init_test("handlers_run_in_registration_order");
        let d = engine.defer();
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut derived = Vec::new();
        for i in 0..3 {
            let o = Arc::clone(&order);
            derived.push(d.promise.then(move |_, _| {
                o.lock().push(i);
                Ok(Value::Undefined)
            }));
        }
        d.resolve("go");
        engine.run_until_idle();
        assert_eq!(*order.lock(), vec![0, 1, 2]);
        crate::test_complete!("handlers_run_in_registration_order");
    }

    #[test]
    fn missing_handler_passes_through() {
        let engine = init_test("missing_handler_passes_through");
        let p = engine.reject("bad").then(|_, _| Ok(Value::from("unreachable")));
        let q = engine.resolve(4).catch(|_, _| Ok(Value::from("unreachable")));
        engine.run_until_idle();
        crate::assert_rejected!(p, "bad");
        crate::assert_fulfilled!(q, 4);
        crate::test_complete!("missing_handler_passes_through");
    }

    #[test]
    fn handler_error_and_panic_reject() {
        let engine = init_test("handler_error_and_panic_reject");
        let p = engine.resolve(1).then(|_, _| Err(Value::from("failed")));
        let q = engine.resolve(1).then(|_, _| panic!("handler exploded"));
        engine.run_until_idle();
        crate::assert_rejected!(p, "failed");
        let reason = q.reason().unwrap();
        assert_eq!(reason.as_error().map(crate::Error::kind), Some(ErrorKind::Panicked));
        crate::test_complete!("handler_error_and_panic_reject");
    }

    #[test]
    fn returning_promise_from_handler_is_followed() {
        let engine = init_test("returning_promise_from_handler_is_followed");
        let inner = engine.defer();
        let inner_promise = inner.promise();
        let p = engine
            .resolve(1)
            .then(move |_, _| Ok(Value::from(inner_promise)));
        engine.run_until_idle();
        crate::assert_pending!(p);
        inner.resolve(10);
        engine.run_until_idle();
        crate::assert_fulfilled!(p, 10);
        crate::test_complete!("returning_promise_from_handler_is_followed");
    }

    #[test]
    fn handler_returning_own_promise_is_circular() {
        let engine = init_test("handler_returning_own_promise_is_circular");
        let slot: Arc<Mutex<Option<Promise>>> = Arc::default();
        let s = Arc::clone(&slot);
        let p = engine
            .resolve(1)
            .then(move |_, _| Ok(s.lock().take().map_or(Value::Undefined, Value::from)));
        *slot.lock() = Some(p.clone());
        engine.run_until_idle();
        let reason = p.reason().unwrap();
        assert_eq!(
            reason.as_error().map(crate::Error::kind),
            Some(ErrorKind::CircularAssimilation)
        );
        crate::test_complete!("handler_returning_own_promise_is_circular");
    }

    #[test]
    fn executor_error_rejects_unless_resolved() {
        let engine = init_test("executor_error_rejects_unless_resolved");
        let a = engine.promise(|_| Err(Value::from("thrown")));
        let b = engine.promise(|r| {
            r.resolve(7);
            Err(Value::from("ignored"))
        });
        let c = engine.promise(|_| panic!("executor exploded"));
        crate::assert_rejected!(a, "thrown");
        crate::assert_fulfilled!(b, 7);
        assert!(c.is_rejected());
        crate::test_complete!("executor_error_rejects_unless_resolved");
    }

    #[test]
    fn resolve_returns_native_promise_unchanged() {
        let engine = init_test("resolve_returns_native_promise_unchanged");
        let p = engine.defer().promise;
        assert_eq!(engine.resolve(p.clone()), p);
        crate::test_complete!("resolve_returns_native_promise_unchanged");
    }

    #[test]
    fn method_wraps_results() {
        let engine = init_test("method_wraps_results");
        let inner = engine.resolve(3);
        let inner_clone = inner.clone();
        let add = engine.method(move |this, args| {
            match args.first().and_then(Value::as_int) {
                Some(0) => Err(Value::from("zero")),
                Some(1) => Ok(Value::from(inner_clone.clone())),
                Some(n) => Ok(Value::from(n + this.as_int().unwrap_or(0))),
                None => panic!("no arguments"),
            }
        });
        let ok = add(&Value::from(10), vec![Value::from(5)]);
        let err = add(&Value::Undefined, vec![Value::from(0)]);
        let same = add(&Value::Undefined, vec![Value::from(1)]);
        let panicked = add(&Value::Undefined, vec![]);
        engine.run_until_idle();
        crate::assert_fulfilled!(ok, 15);
        crate::assert_rejected!(err, "zero");
        assert_eq!(same, inner);
        assert!(panicked.is_rejected());
        crate::test_complete!("method_wraps_results");
    }

    #[test]
    fn promise_identity() {
        let engine = init_test("promise_identity");
        let p = engine.resolve(1);
        let q = engine.resolve(1);
        assert_eq!(p, p.clone());
        assert_ne!(p, q);
        assert_ne!(p.id(), q.id());
        assert!(format!("{p:?}").contains("fulfilled"));
        crate::test_complete!("promise_identity");
    }
}
