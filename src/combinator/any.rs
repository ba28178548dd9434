//! Any and some: the first fulfillments win, rejections are collected.
//!
//! `some(n)` fulfills once `n` elements fulfilled, with their values in
//! completion order. It rejects as soon as more than `len - n` elements
//! rejected, since `n` fulfillments are then out of reach; the rejection is an
//! `Aggregate` error carrying the reasons seen so far. `any` is `some(1)`
//! unwrapped, except that its aggregate keeps every reason index-aligned.
//!
//! # Algebraic Laws
//!
//! - `some(xs, 0) ≃ resolve([])`
//! - `some(xs, len(xs))` fulfills iff `all(xs)` does (values may be reordered)
//! - `some(xs, n)` with `n > len(xs)` rejects with `EmptyAggregate`

use std::sync::Arc;

use parking_lot::Mutex;

use super::{expect_list, Observers};
use crate::error::Error;
use crate::promise::Promise;
use crate::runtime::Engine;
use crate::types::Value;

struct AnyState {
    reasons: Vec<Value>,
    remaining: usize,
}

fn any_of(engine: &Engine, items: Vec<Value>) -> Promise {
    if items.is_empty() {
        return engine.reject(Error::empty_aggregate(1, 0));
    }
    let deferred = engine.defer();
    let state = Arc::new(Mutex::new(AnyState {
        reasons: vec![Value::Undefined; items.len()],
        remaining: items.len(),
    }));
    let mut observers = Observers::default();
    for (index, item) in items.into_iter().enumerate() {
        let element = engine.resolve(item.unhole());
        let state = Arc::clone(&state);
        let on_value = deferred.resolver.clone();
        let on_reason = deferred.resolver.clone();
        observers.observe(
            &element,
            move |value| on_value.resolve(value),
            move |reason| {
                let exhausted = {
                    let mut state = state.lock();
                    state.reasons[index] = reason;
                    state.remaining -= 1;
                    (state.remaining == 0).then(|| std::mem::take(&mut state.reasons))
                };
                if let Some(reasons) = exhausted {
                    on_reason.reject(Error::aggregate(reasons));
                }
            },
        );
    }
    observers.release_on_settle(&deferred.promise);
    deferred.promise
}

struct SomeState {
    values: Vec<Value>,
    reasons: Vec<Value>,
    settled: bool,
}

fn some_of(engine: &Engine, items: Vec<Value>, count: usize) -> Promise {
    if count == 0 {
        return engine.resolve(Value::List(Vec::new()));
    }
    let len = items.len();
    if count > len {
        return engine.reject(Error::empty_aggregate(count, len));
    }
    let tolerated = len - count;
    let deferred = engine.defer();
    let state = Arc::new(Mutex::new(SomeState {
        values: Vec::with_capacity(count),
        reasons: Vec::new(),
        settled: false,
    }));
    let mut observers = Observers::default();
    for item in items {
        let element = engine.resolve(item.unhole());
        let fulfilled_state = Arc::clone(&state);
        let rejected_state = Arc::clone(&state);
        let on_value = deferred.resolver.clone();
        let on_reason = deferred.resolver.clone();
        observers.observe(
            &element,
            move |value| {
                let reached = {
                    let mut state = fulfilled_state.lock();
                    if state.settled {
                        return;
                    }
                    state.values.push(value);
                    state.settled = state.values.len() == count;
                    state.settled.then(|| std::mem::take(&mut state.values))
                };
                if let Some(values) = reached {
                    on_value.resolve(Value::List(values));
                }
            },
            move |reason| {
                let unreachable = {
                    let mut state = rejected_state.lock();
                    if state.settled {
                        return;
                    }
                    state.reasons.push(reason);
                    state.settled = state.reasons.len() > tolerated;
                    state.settled.then(|| std::mem::take(&mut state.reasons))
                };
                if let Some(reasons) = unreachable {
                    on_reason.reject(Error::aggregate(reasons));
                }
            },
        );
    }
    observers.release_on_settle(&deferred.promise);
    deferred.promise
}

impl Promise {
    /// Instance form of [`Engine::any`].
    #[must_use = "the aggregate promise carries the winning value"]
    pub fn any(&self) -> Self {
        let engine = self.engine().clone();
        self.then(move |_, input| Ok(any_of(&engine, expect_list(input, "any")?).into()))
    }

    /// Instance form of [`Engine::some`].
    #[must_use = "the aggregate promise carries the values"]
    pub fn some(&self, count: usize) -> Self {
        let engine = self.engine().clone();
        self.then(move |_, input| Ok(some_of(&engine, expect_list(input, "some")?, count).into()))
    }
}
