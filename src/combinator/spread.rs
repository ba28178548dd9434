//! Spread: `then` with the resolved list unpacked into arguments.

use super::expect_list;
use crate::promise::Promise;
use crate::types::Value;

impl Promise {
    /// Resolves the fulfillment value as a list (every element awaited) and
    /// calls `f` with the elements. A non-list value rejects with
    /// `ErrorKind::TypeMismatch`.
    #[must_use = "the derived promise carries the handler's result"]
    pub fn spread<F>(&self, f: F) -> Self
    where
        F: FnOnce(&Value, Vec<Value>) -> Result<Value, Value> + Send + 'static,
    {
        self.all()
            .then(move |this, values| f(this, expect_list(values, "spread")?))
    }

    /// Like [`spread`](Self::spread), with a rejection handler.
    #[must_use = "the derived promise carries the handler's result"]
    pub fn spread_both<F, R>(&self, f: F, on_rejected: R) -> Self
    where
        F: FnOnce(&Value, Vec<Value>) -> Result<Value, Value> + Send + 'static,
        R: FnOnce(&Value, Value) -> Result<Value, Value> + Send + 'static,
    {
        self.all()
            .then_both(
                move |this, values| f(this, expect_list(values, "spread")?),
                on_rejected,
            )
    }
}
