//! Collection combinators.
//!
//! Every combinator is composed from public kernel operations (`resolve`,
//! `defer`, `then_both`) and accepts either a list or a promise/thenable that
//! resolves to one. Anything else rejects with `ErrorKind::TypeMismatch`.
//! Holes count as `Undefined` slots everywhere except in [`race`](race).
//!
//! Each combinator exists in two forms:
//!
//! - static, on [`Engine`]: `engine.all(input)`
//! - instance, on [`Promise`]: `promise.all()`, which keeps the promise's
//!   bound receiver for downstream handlers and hands it to mappers,
//!   predicates and reducers
//!
//! | Operation | Empty input | Result |
//! |-----------|-------------|--------|
//! | `all` | `[]` | values, index-aligned; first rejection wins |
//! | `any` | `EmptyAggregate` | first fulfillment; else `Aggregate` of all reasons |
//! | `race` | pending forever | first settlement |
//! | `some(n)` | `[]` if n == 0 | first n fulfillments in completion order |
//! | `settle` | `[]` | per-element `Value::Settled` descriptors |
//! | `props` | `{}` | list or mapping of values |

pub mod all;
pub mod any;
pub mod map;
pub mod props;
pub mod race;
pub mod settle;
pub mod spread;

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use crate::error::Error;
use crate::promise::cell::Shared;
use crate::promise::Promise;
use crate::runtime::Engine;
use crate::types::Value;

pub(crate) use all::all_of;

/// Mapper and filter predicate: `(receiver, value, index, length)`.
pub type Mapper = dyn Fn(&Value, Value, usize, usize) -> Result<Value, Value> + Send + Sync;

/// Reducer: `(receiver, accumulator, value, index, length)`.
pub type Reducer = dyn Fn(&Value, Value, Value, usize, usize) -> Result<Value, Value> + Send + Sync;

/// Unwraps a list input or fails with a type mismatch naming `op`.
pub(crate) fn expect_list(value: Value, op: &str) -> Result<Vec<Value>, Value> {
    match value {
        Value::List(items) => Ok(items),
        other => Err(Error::type_mismatch(format!("{op}() expects a list, got {other:?}")).into()),
    }
}

pub(crate) fn expect_map(value: Value, op: &str) -> Result<BTreeMap<String, Value>, Value> {
    match value {
        Value::Map(entries) => Ok(entries),
        other => Err(Error::type_mismatch(format!("{op}() expects a mapping, got {other:?}")).into()),
    }
}

/// Observes an element's outcome without producing a value downstream.
/// Returns the observing cell.
pub(crate) fn on_settled<F, R>(promise: &Promise, on_fulfilled: F, on_rejected: R) -> Promise
where
    F: FnOnce(Value) + Send + 'static,
    R: FnOnce(Value) + Send + 'static,
{
    promise.then_both(
        move |_, value| {
            on_fulfilled(value);
            Ok(Value::Undefined)
        },
        move |_, reason| {
            on_rejected(reason);
            Ok(Value::Undefined)
        },
    )
}

/// The element observers of one aggregate.
///
/// Once the aggregate settles, every observer still registered on a pending
/// element is removed from it, so a long-lived element neither retains
/// finished aggregates nor keeps counting them as consumers.
#[derive(Default)]
pub(crate) struct Observers {
    edges: Vec<(Weak<Shared>, Weak<Shared>)>,
}

impl Observers {
    pub(crate) fn observe<F, R>(&mut self, element: &Promise, on_fulfilled: F, on_rejected: R)
    where
        F: FnOnce(Value) + Send + 'static,
        R: FnOnce(Value) + Send + 'static,
    {
        let observer = on_settled(element, on_fulfilled, on_rejected);
        self.edges
            .push((Arc::downgrade(&element.shared), Arc::downgrade(&observer.shared)));
    }

    /// Prunes the observers once `aggregate` settles.
    pub(crate) fn release_on_settle(self, aggregate: &Promise) {
        if self.edges.is_empty() {
            return;
        }
        aggregate.shared.watch(move |_| {
            for (element, observer) in self.edges {
                if let (Some(element), Some(observer)) = (element.upgrade(), observer.upgrade()) {
                    element.abandon(&observer);
                }
            }
        });
    }
}

/// Static forms.
impl Engine {
    /// Fulfills with every element's value once all fulfill; rejects with the
    /// first rejection.
    pub fn all(&self, input: impl Into<Value>) -> Promise {
        self.resolve(input).all()
    }

    /// Fulfills with the first element to fulfill; rejects with an
    /// `Aggregate` error once every element rejected.
    pub fn any(&self, input: impl Into<Value>) -> Promise {
        self.resolve(input).any()
    }

    /// Settles like the first element to settle. Holes are skipped; an input
    /// with nothing to race never settles.
    pub fn race(&self, input: impl Into<Value>) -> Promise {
        self.resolve(input).race()
    }

    /// Fulfills with the first `count` values to fulfill, in completion order.
    pub fn some(&self, input: impl Into<Value>, count: usize) -> Promise {
        self.resolve(input).some(count)
    }

    /// Waits for every element and fulfills with their outcomes.
    pub fn settle(&self, input: impl Into<Value>) -> Promise {
        self.resolve(input).settle()
    }

    /// Resolves the values of a mapping (or the elements of a list).
    pub fn props(&self, input: impl Into<Value>) -> Promise {
        self.resolve(input).props()
    }

    /// Maps each element through `mapper` as it resolves.
    pub fn map<F>(&self, input: impl Into<Value>, mapper: F) -> Promise
    where
        F: Fn(&Value, Value, usize, usize) -> Result<Value, Value> + Send + Sync + 'static,
    {
        self.resolve(input).map(mapper)
    }

    /// Keeps the elements whose predicate result is truthy.
    pub fn filter<F>(&self, input: impl Into<Value>, predicate: F) -> Promise
    where
        F: Fn(&Value, Value, usize, usize) -> Result<Value, Value> + Send + Sync + 'static,
    {
        self.resolve(input).filter(predicate)
    }

    /// Folds the elements left to right.
    pub fn reduce<F>(&self, input: impl Into<Value>, reducer: F, initial: Option<Value>) -> Promise
    where
        F: Fn(&Value, Value, Value, usize, usize) -> Result<Value, Value> + Send + Sync + 'static,
    {
        self.resolve(input).reduce(reducer, initial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn non_list_is_type_mismatch() {
        let err = expect_list(Value::from(3), "all").unwrap_err();
        let err = err.as_error().cloned().unwrap();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert!(err.message().unwrap().contains("all()"));
    }

    #[test]
    fn list_and_map_unwrap() {
        assert_eq!(expect_list(Value::list([1, 2]), "all").unwrap().len(), 2);
        assert!(expect_map(Value::list([1]), "props").is_err());
        assert!(expect_map(Value::map([("a", 1)]), "props").is_ok());
    }
}
