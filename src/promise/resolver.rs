//! The settling half of a pending promise.

use std::fmt;
use std::sync::Arc;

use super::cell::Shared;
use super::Promise;
use crate::types::{Outcome, Value};

/// Settles one pending promise. Only the first `resolve` or `reject` call
/// has any effect; later calls are silently ignored.
#[derive(Clone)]
pub struct Resolver {
    pub(crate) shared: Arc<Shared>,
}

impl Resolver {
    pub(crate) const fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Resolves the promise. Promises and thenables are followed.
    pub fn resolve(&self, value: impl Into<Value>) {
        if self.shared.claim() {
            self.shared.resolve_with(value.into());
        }
    }

    /// Rejects the promise with `reason`, which is never unwrapped.
    pub fn reject(&self, reason: impl Into<Value>) {
        if self.shared.claim() {
            self.shared.settle(Outcome::Rejected(reason.into()));
        }
    }

    /// The promise this resolver settles.
    #[must_use]
    pub fn promise(&self) -> Promise {
        Promise::from_shared(Arc::clone(&self.shared))
    }

    /// Returns true once `resolve` or `reject` was called, or the promise
    /// settled some other way (cancellation).
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.shared.is_resolved()
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("promise", &self.shared.id)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

/// A pending promise together with its resolver.
#[derive(Debug, Clone)]
pub struct Deferred {
    /// The pending promise.
    pub promise: Promise,
    /// Its resolver.
    pub resolver: Resolver,
}

impl Deferred {
    /// Shorthand for `self.resolver.resolve(value)`.
    pub fn resolve(&self, value: impl Into<Value>) {
        self.resolver.resolve(value);
    }

    /// Shorthand for `self.resolver.reject(reason)`.
    pub fn reject(&self, reason: impl Into<Value>) {
        self.resolver.reject(reason);
    }

    /// Returns a handle to the promise.
    #[must_use]
    pub fn promise(&self) -> Promise {
        self.promise.clone()
    }
}
