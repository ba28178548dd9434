//! All combinator: wait for every element, fail fast.
//!
//! ```text
//! all([a, b, c]):
//!   values ← [_, _, _]
//!   on a fulfilled(v): values[0] ← v; if none remain → fulfill(values)
//!   on any rejected(r): reject(r)   // later outcomes are observed, then dropped
//! ```
//!
//! # Algebraic Laws
//!
//! - Identity: `all([]) ≃ resolve([])`
//! - Order: the result is index-aligned with the input, whatever the
//!   settlement order
//! - Absorption: `all([.., reject(r), ..])` rejects with the first reason
//!   delivered

use std::sync::Arc;

use parking_lot::Mutex;

use super::{expect_list, Observers};
use crate::promise::Promise;
use crate::runtime::Engine;
use crate::types::Value;

struct Collect {
    values: Vec<Value>,
    remaining: usize,
}

/// Resolves every element and fulfills with the index-aligned values.
pub(crate) fn all_of(engine: &Engine, items: Vec<Value>) -> Promise {
    if items.is_empty() {
        return engine.resolve(Value::List(Vec::new()));
    }
    let deferred = engine.defer();
    let state = Arc::new(Mutex::new(Collect {
        values: vec![Value::Undefined; items.len()],
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
            move |value| {
                let done = {
                    let mut state = state.lock();
                    state.values[index] = value;
                    state.remaining -= 1;
                    (state.remaining == 0).then(|| std::mem::take(&mut state.values))
                };
                if let Some(values) = done {
                    on_value.resolve(Value::List(values));
                }
            },
            move |reason| on_reason.reject(reason),
        );
    }
    observers.release_on_settle(&deferred.promise);
    deferred.promise
}

impl Promise {
    /// Instance form of [`Engine::all`].
    #[must_use = "the aggregate promise carries the values"]
    pub fn all(&self) -> Self {
        let engine = self.engine().clone();
        self.then(move |_, input| Ok(all_of(&engine, expect_list(input, "all")?).into()))
    }
}
