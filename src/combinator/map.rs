//! Map, filter and reduce.
//!
//! Callbacks receive the bound receiver of the input promise (or
//! `Undefined`) as their first argument. A callback may return a promise or
//! thenable; it is awaited like any other element.
//!
//! - `map` runs the mapper on each element as soon as that element resolves;
//!   results stay index-aligned.
//! - `filter` resolves every element, runs the predicate on each, awaits the
//!   predicate results and keeps the elements whose result is truthy, in
//!   input order.
//! - `reduce` resolves every element, then folds strictly left to right,
//!   awaiting each accumulator before the next step.

use std::sync::Arc;

use super::{all_of, expect_list, Mapper, Reducer};
use crate::promise::Promise;
use crate::runtime::Engine;
use crate::types::Value;

fn map_of(engine: &Engine, items: Vec<Value>, mapper: &Arc<Mapper>, this: &Value) -> Promise {
    let len = items.len();
    let mapped = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let mapper = Arc::clone(mapper);
            let this = this.clone();
            let element = engine.resolve(item.unhole());
            Value::from(element.then(move |_, value| mapper(&this, value, index, len)))
        })
        .collect();
    all_of(engine, mapped)
}

fn filter_of(engine: &Engine, items: Vec<Value>, predicate: Arc<Mapper>, this: Value) -> Promise {
    let nested = engine.clone();
    all_of(engine, items).then(move |_, values| {
        let values = expect_list(values, "filter")?;
        let len = values.len();
        let verdicts = values
            .iter()
            .enumerate()
            .map(|(index, value)| predicate(&this, value.clone(), index, len))
            .collect::<Result<Vec<_>, _>>()?;
        let kept = all_of(&nested, verdicts).then(move |_, verdicts| {
            let verdicts = expect_list(verdicts, "filter")?;
            Ok(values
                .into_iter()
                .zip(verdicts)
                .filter_map(|(value, keep)| keep.is_truthy().then_some(value))
                .collect())
        });
        Ok(kept.into())
    })
}

fn reduce_of(
    engine: &Engine,
    items: Vec<Value>,
    reducer: Arc<Reducer>,
    initial: Option<Value>,
    this: Value,
) -> Promise {
    let nested = engine.clone();
    all_of(engine, items).then(move |_, values| {
        let values = expect_list(values, "reduce")?;
        let len = values.len();
        let mut values = values.into_iter().enumerate();
        let seed = match initial {
            Some(initial) => initial,
            None => match values.next() {
                Some((_, first)) => first,
                None => return Ok(Value::Undefined),
            },
        };
        let mut acc = nested.resolve(seed);
        for (index, value) in values {
            let reducer = Arc::clone(&reducer);
            let this = this.clone();
            acc = acc.then(move |_, acc| reducer(&this, acc, value, index, len));
        }
        Ok(acc.into())
    })
}

impl Promise {
    /// Instance form of [`Engine::map`].
    #[must_use = "the aggregate promise carries the mapped values"]
    pub fn map<F>(&self, mapper: F) -> Self
    where
        F: Fn(&Value, Value, usize, usize) -> Result<Value, Value> + Send + Sync + 'static,
    {
        let engine = self.engine().clone();
        let mapper: Arc<Mapper> = Arc::new(mapper);
        self.then(move |this, input| {
            Ok(map_of(&engine, expect_list(input, "map")?, &mapper, this).into())
        })
    }

    /// Instance form of [`Engine::filter`].
    #[must_use = "the aggregate promise carries the kept values"]
    pub fn filter<F>(&self, predicate: F) -> Self
    where
        F: Fn(&Value, Value, usize, usize) -> Result<Value, Value> + Send + Sync + 'static,
    {
        let engine = self.engine().clone();
        let predicate: Arc<Mapper> = Arc::new(predicate);
        self.then(move |this, input| {
            let items = expect_list(input, "filter")?;
            Ok(filter_of(&engine, items, predicate, this.clone()).into())
        })
    }

    /// Instance form of [`Engine::reduce`].
    #[must_use = "the aggregate promise carries the folded value"]
    pub fn reduce<F>(&self, reducer: F, initial: Option<Value>) -> Self
    where
        F: Fn(&Value, Value, Value, usize, usize) -> Result<Value, Value> + Send + Sync + 'static,
    {
        let engine = self.engine().clone();
        let reducer: Arc<Reducer> = Arc::new(reducer);
        self.then(move |this, input| {
            let items = expect_list(input, "reduce")?;
            Ok(reduce_of(&engine, items, reducer, initial, this.clone()).into())
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use crate::test_utils::{init_test_logging, test_engine};
    use crate::types::Value;

    fn int(v: &Value) -> i64 {
        v.as_int().unwrap_or_default()
    }

    #[test]
    fn map_is_index_aligned() {
        init_test_logging();
        let engine = test_engine();
        let late = engine.defer();
        let order = Arc::new(Mutex::new(Vec::new()));
        let o = Arc::clone(&order);
        let p = engine.map(
            vec![Value::from(late.promise()), Value::from(2)],
            move |_, v, i, len| {
                o.lock().push(i);
                assert_eq!(len, 2);
                Ok(Value::from(int(&v) * 10))
            },
        );
        engine.run_until_idle();
        assert_eq!(*order.lock(), vec![1]);
        late.resolve(1);
        engine.run_until_idle();
        assert_eq!(*order.lock(), vec![1, 0]);
        crate::assert_fulfilled!(p, vec![10, 20]);
    }

    #[test]
    fn map_awaits_promised_results() {
        init_test_logging();
        let engine = test_engine();
        let inner = engine.clone();
        let p = engine.map(vec![1, 2], move |_, v, _, _| Ok(inner.resolve(int(&v) + 1).into()));
        engine.run_until_idle();
        crate::assert_fulfilled!(p, vec![2, 3]);
    }

    #[test]
    fn filter_keeps_truthy_in_order() {
        init_test_logging();
        let engine = test_engine();
        let inner = engine.clone();
        let p = engine.filter(vec![1, 2, 3, 4], move |_, v, _, _| {
            Ok(inner.resolve(int(&v) % 2 == 0).into())
        });
        engine.run_until_idle();
        crate::assert_fulfilled!(p, vec![2, 4]);
    }

    #[test]
    fn reduce_sums_sequentially() {
        init_test_logging();
        let engine = test_engine();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let p = engine.reduce(
            vec![1, 2, 3],
            move |_, acc, v, i, _| {
                s.lock().push(i);
                Ok(Value::from(int(&acc) + int(&v)))
            },
            None,
        );
        engine.run_until_idle();
        crate::assert_fulfilled!(p, 6);
        assert_eq!(*seen.lock(), vec![1, 2]);
    }

    #[test]
    fn reduce_with_promised_initial() {
        init_test_logging();
        let engine = test_engine();
        let initial = engine.resolve(10);
        let p = engine.reduce(
            vec![1, 2],
            |_, acc, v, _, _| Ok(Value::from(int(&acc) + int(&v))),
            Some(initial.into()),
        );
        engine.run_until_idle();
        crate::assert_fulfilled!(p, 13);
    }

    #[test]
    fn reduce_empty() {
        init_test_logging();
        let engine = test_engine();
        let none = engine.reduce(Value::List(Vec::new()), |_, a, _, _, _| Ok(a), None);
        let seeded = engine.reduce(Value::List(Vec::new()), |_, a, _, _, _| Ok(a), Some(Value::from(7)));
        engine.run_until_idle();
        crate::assert_fulfilled!(none, Value::Undefined);
        crate::assert_fulfilled!(seeded, 7);
    }

    #[test]
    fn callbacks_receive_bound_receiver() {
        init_test_logging();
        let engine = test_engine();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let p = engine
            .resolve(vec![1, 2])
            .bind("ctx")
            .map(move |this, v, _, _| {
                s.lock().push(this.clone());
                Ok(v)
            });
        engine.run_until_idle();
        crate::assert_fulfilled!(p, vec![1, 2]);
        assert_eq!(*seen.lock(), vec![Value::from("ctx"), Value::from("ctx")]);
    }

    #[test]
    fn mapper_error_rejects() {
        init_test_logging();
        let engine = test_engine();
        let p = engine.map(vec![1], |_, _, _, _| Err(Value::from("mapper failed")));
        engine.run_until_idle();
        crate::assert_rejected!(p, "mapper failed");
    }
}
