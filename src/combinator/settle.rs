//! Settle combinator: wait for everything, never reject.
//!
//! Each element becomes a `Value::Settled` descriptor holding its
//! [`Outcome`]. Cancelled elements are reported as ordinary rejections.

use super::{all_of, expect_list};
use crate::promise::Promise;
use crate::runtime::Engine;
use crate::types::{Outcome, Value};

fn settle_of(engine: &Engine, items: Vec<Value>) -> Promise {
    let descriptors: Vec<Value> = items
        .into_iter()
        .map(|item| {
            engine
                .resolve(item.unhole())
                .then_both(
                    |_, value| Ok(Outcome::Fulfilled(value).into()),
                    |_, reason| Ok(Outcome::Rejected(reason).into()),
                )
                .into()
        })
        .collect();
    all_of(engine, descriptors)
}

impl Promise {
    /// Instance form of [`Engine::settle`].
    #[must_use = "the aggregate promise carries the outcomes"]
    pub fn settle(&self) -> Self {
        let engine = self.engine().clone();
        self.then(move |_, input| Ok(settle_of(&engine, expect_list(input, "settle")?).into()))
    }
}

#[cfg(test)]
mod tests {
    use crate::test_utils::{init_test_logging, test_engine};
    use crate::types::{Outcome, Value};

    #[test]
    fn mixed_outcomes_are_described() {
        init_test_logging();
        let engine = test_engine();
        let p = engine.settle(vec![
            Value::from(1),
            Value::from(engine.reject("bad")),
            Value::Hole,
        ]);
        engine.run_until_idle();
        let value = p.value().unwrap();
        let items = value.as_list().unwrap();
        assert_eq!(items[0].as_settled(), Some(&Outcome::Fulfilled(Value::from(1))));
        assert_eq!(items[1].as_settled(), Some(&Outcome::Rejected(Value::from("bad"))));
        assert_eq!(items[2].as_settled(), Some(&Outcome::Fulfilled(Value::Undefined)));
    }

    #[test]
    fn waits_for_every_element() {
        init_test_logging();
        let engine = test_engine();
        let slow = engine.defer();
        let p = engine.settle(vec![Value::from(engine.reject("fast")), Value::from(slow.promise())]);
        engine.run_until_idle();
        crate::assert_pending!(p);
        slow.reject("slow");
        engine.run_until_idle();
        assert!(p.is_fulfilled());
    }

    #[test]
    fn empty_fulfills_empty_list() {
        init_test_logging();
        let engine = test_engine();
        let p = engine.settle(Value::List(Vec::new()));
        engine.run_until_idle();
        crate::assert_fulfilled!(p, Value::List(Vec::new()));
    }
}
