//! Collection combinators end to end.
//!
//! Elements mix plain values, native promises, thenables and holes; timing
//! is driven through the lab runtime where ordering matters.

#[macro_use]
mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use parking_lot::Mutex;
use pledge::{Engine, ErrorKind, Outcome, Value};

fn init_test(name: &str) -> Engine {
    init_test_logging();
    test_phase!(name);
    test_engine()
}

fn aggregate_reasons(promise: &pledge::Promise) -> Vec<Value> {
    promise
        .reason()
        .and_then(|reason| reason.as_error().map(|e| e.reasons().to_vec()))
        .unwrap_or_default()
}

#[test]
fn any_of_empty_rejects() {
    let engine = init_test("any_of_empty_rejects");
    let p = engine.any(Vec::<Value>::new());
    engine.run_until_idle();
    assert_eq!(rejection_kind(&p), Some(ErrorKind::EmptyAggregate));
    test_complete!("any_of_empty_rejects");
}

#[test]
fn any_of_all_rejections_aggregates_in_order() {
    let engine = init_test("any_of_all_rejections_aggregates_in_order");
    let lab = pledge::LabRuntime::new(engine.clone());
    let slow = lab.delay(engine.reject(1), Duration::from_millis(30));
    let p = engine.any(vec![slow, engine.reject(2), engine.reject(3)]);
    lab.run_until_quiescent();
    assert_eq!(rejection_kind(&p), Some(ErrorKind::Aggregate));
    assert_eq!(
        aggregate_reasons(&p),
        vec![Value::from(1), Value::from(2), Value::from(3)]
    );
    test_complete!("any_of_all_rejections_aggregates_in_order");
}

#[test]
fn any_takes_first_fulfillment() {
    let engine = init_test("any_takes_first_fulfillment");
    let lab = pledge::LabRuntime::new(engine.clone());
    let p = engine.any(vec![
        engine.reject("nope"),
        lab.delay("slow", Duration::from_millis(20)),
        lab.delay("fast", Duration::from_millis(10)),
    ]);
    lab.run_until_quiescent();
    assert_fulfilled!(p, "fast");
    test_complete!("any_takes_first_fulfillment");
}

#[test]
fn race_of_empty_never_settles() {
    init_test_logging();
    test_phase!("race_of_empty_never_settles");
    let lab = test_lab();
    let raced = lab.engine().race(Vec::<Value>::new());
    let probe = lab.timeout(&raced, Duration::from_millis(100));
    lab.advance(Duration::from_millis(99));
    assert_pending!(raced);
    assert_pending!(probe);
    lab.advance(Duration::from_millis(1));
    assert_pending!(raced);
    assert_eq!(rejection_kind(&probe), Some(ErrorKind::Timeout));
    test_complete!("race_of_empty_never_settles");
}

#[test]
fn race_prefers_input_order_among_settled() {
    let engine = init_test("race_prefers_input_order_among_settled");
    let p = engine.race(vec![1, 2, 3]);
    engine.run_until_idle();
    assert_fulfilled!(p, 1);
    test_complete!("race_prefers_input_order_among_settled");
}

#[test]
fn race_skips_holes() {
    let engine = init_test("race_skips_holes");
    let p = engine.race(Value::List(vec![Value::Hole, Value::from("real")]));
    let only_holes = engine.race(Value::List(vec![Value::Hole, Value::Hole]));
    engine.run_until_idle();
    assert_fulfilled!(p, "real");
    assert_pending!(only_holes);
    test_complete!("race_skips_holes");
}

#[test]
fn some_takes_first_n_in_completion_order() {
    let engine = init_test("some_takes_first_n_in_completion_order");
    let p = engine.some(vec![1, 2, 3], 2);
    engine.run_until_idle();
    assert_fulfilled!(p, vec![1, 2]);

    let lab = pledge::LabRuntime::new(engine.clone());
    let timed = engine.some(
        vec![
            lab.delay("c", Duration::from_millis(30)),
            lab.delay("a", Duration::from_millis(10)),
            lab.delay("b", Duration::from_millis(20)),
        ],
        2,
    );
    lab.run_until_quiescent();
    assert_fulfilled!(timed, vec!["a", "b"]);
    test_complete!("some_takes_first_n_in_completion_order");
}

#[test]
fn some_rejects_once_unreachable() {
    let engine = init_test("some_rejects_once_unreachable");
    let pending = engine.defer();
    let p = engine.some(
        vec![engine.reject("x"), engine.reject("y"), pending.promise()],
        2,
    );
    engine.run_until_idle();
    assert_eq!(rejection_kind(&p), Some(ErrorKind::Aggregate));
    assert_eq!(aggregate_reasons(&p), vec![Value::from("x"), Value::from("y")]);

    let too_many = engine.some(vec![1], 2);
    engine.run_until_idle();
    assert_eq!(rejection_kind(&too_many), Some(ErrorKind::EmptyAggregate));
    test_complete!("some_rejects_once_unreachable");
}

#[test]
fn all_preserves_index_alignment() {
    init_test_logging();
    test_phase!("all_preserves_index_alignment");
    let lab = test_lab();
    let engine = lab.engine().clone();
    let p = engine.all(Value::List(vec![
        Value::from(lab.delay("slow", Duration::from_millis(20))),
        Value::Hole,
        Value::thenable(|ok, _| {
            ok.call("foreign");
            Ok(())
        }),
        Value::from(lab.delay("fast", Duration::from_millis(5))),
    ]));
    lab.run_until_quiescent();
    assert_fulfilled!(
        p,
        Value::list([
            Value::from("slow"),
            Value::Undefined,
            Value::from("foreign"),
            Value::from("fast"),
        ])
    );
    test_complete!("all_preserves_index_alignment");
}

#[test]
fn all_first_rejection_wins() {
    let engine = init_test("all_first_rejection_wins");
    let later = engine.defer();
    let p = engine.all(vec![later.promise(), engine.reject("early")]);
    engine.run_until_idle();
    later.reject("late");
    engine.run_until_idle();
    assert_rejected!(p, "early");
    test_complete!("all_first_rejection_wins");
}

#[test]
fn non_list_input_is_type_error() {
    let engine = init_test("non_list_input_is_type_error");
    let results = [
        engine.all(3),
        engine.any("text"),
        engine.race(true),
        engine.settle(3),
        engine.props(7),
        engine.resolve(3).spread(|_, args| Ok(Value::from(args.len()))),
    ];
    engine.run_until_idle();
    for p in &results {
        assert_eq!(rejection_kind(p), Some(ErrorKind::TypeMismatch));
    }
    test_complete!("non_list_input_is_type_error");
}

#[test]
fn settle_describes_every_outcome() {
    let engine = init_test("settle_describes_every_outcome");
    let cancelled = engine.defer().promise.cancellable();
    let p = engine.settle(vec![
        engine.resolve(1),
        engine.reject("bad"),
        cancelled.clone(),
    ]);
    assert!(cancelled.cancel(Some(Value::from("stop"))));
    engine.run_until_idle();
    assert_fulfilled!(
        p,
        Value::list([
            Value::from(Outcome::Fulfilled(Value::from(1))),
            Value::from(Outcome::Rejected(Value::from("bad"))),
            Value::from(Outcome::Rejected(Value::from("stop"))),
        ])
    );
    test_complete!("settle_describes_every_outcome");
}

#[test]
fn props_resolves_mapping_values() {
    let engine = init_test("props_resolves_mapping_values");
    let later = engine.defer();
    let p = engine.props(Value::map([
        ("user", Value::from(later.promise())),
        ("count", Value::from(3)),
    ]));
    later.resolve("ada");
    engine.run_until_idle();
    assert_fulfilled!(
        p,
        Value::map([("count", Value::from(3)), ("user", Value::from("ada"))])
    );
    test_complete!("props_resolves_mapping_values");
}

#[test]
fn map_filter_reduce_pipeline() {
    let engine = init_test("map_filter_reduce_pipeline");
    let inner = engine.clone();
    let total = engine
        .resolve(vec![1, 2, 3, 4, 5])
        .map(move |_, v, _, _| {
            let doubled = v.as_int().unwrap_or(0) * 2;
            Ok(inner.resolve(doubled).into())
        })
        .filter(|_, v, _, _| Ok(Value::from(v.as_int().unwrap_or(0) > 4)))
        .reduce(
            |_, acc, v, _, _| Ok(Value::from(acc.as_int().unwrap_or(0) + v.as_int().unwrap_or(0))),
            Some(Value::from(0)),
        );
    engine.run_until_idle();
    assert_fulfilled!(total, 24);
    test_complete!("map_filter_reduce_pipeline");
}

#[test]
fn reduce_is_strictly_sequential() {
    init_test_logging();
    test_phase!("reduce_is_strictly_sequential");
    let lab = test_lab();
    let engine = lab.engine().clone();
    let order = Arc::new(Mutex::new(Vec::new()));
    let o = Arc::clone(&order);
    let step_lab = lab.clone();
    let folded = engine.reduce(
        vec!["a", "b", "c"],
        move |_, acc, v, index, _| {
            o.lock().push(index);
            let joined = format!("{}{}", acc.as_str().unwrap_or(""), v.as_str().unwrap_or(""));
            Ok(step_lab.delay(joined, Duration::from_millis(10)).into())
        },
        None,
    );
    lab.run_until_quiescent();
    assert_fulfilled!(folded, "abc");
    assert_eq!(*order.lock(), vec![1, 2]);
    test_complete!("reduce_is_strictly_sequential");
}

#[test]
fn reduce_of_empty_without_initial_is_undefined() {
    let engine = init_test("reduce_of_empty_without_initial_is_undefined");
    let p = engine.reduce(Vec::<Value>::new(), |_, acc, _, _, _| Ok(acc), None);
    let seeded = engine.reduce(Vec::<Value>::new(), |_, acc, _, _, _| Ok(acc), Some(Value::from(9)));
    engine.run_until_idle();
    assert_fulfilled!(p, Value::Undefined);
    assert_fulfilled!(seeded, 9);
    test_complete!("reduce_of_empty_without_initial_is_undefined");
}

#[test]
fn spread_unpacks_resolved_elements() {
    let engine = init_test("spread_unpacks_resolved_elements");
    let later = engine.defer();
    let p = engine
        .resolve(vec![Value::from(1), Value::from(later.promise())])
        .spread(|_, args| {
            Ok(Value::from(format!("{:?}+{:?}", args[0].as_int(), args[1].as_str())))
        });
    later.resolve("x");
    engine.run_until_idle();
    assert_fulfilled!(p, "Some(1)+Some(\"x\")");
    test_complete!("spread_unpacks_resolved_elements");
}

#[test]
fn mapper_failure_rejects_aggregate() {
    let engine = init_test("mapper_failure_rejects_aggregate");
    let p = engine.map(vec![1, 2, 3], |_, v, _, _| {
        if v.as_int() == Some(2) {
            Err(Value::from("two is bad"))
        } else {
            Ok(v)
        }
    });
    engine.run_until_idle();
    assert_rejected!(p, "two is bad");
    test_complete!("mapper_failure_rejects_aggregate");
}

#[test]
fn finished_race_is_released_by_pending_input() {
    let engine = init_test("finished_race_is_released_by_pending_input");
    let never = engine.defer();
    let sentinel = Arc::new(());
    for _ in 0..1000 {
        let winner = engine.race(vec![
            Value::from(never.promise()),
            Value::Opaque(sentinel.clone()),
        ]);
        engine.run_until_idle();
        assert!(winner.is_fulfilled());
    }
    engine.run_until_idle();
    assert_with_log!(
        Arc::strong_count(&sentinel) == 1,
        "finished races are dropped",
        1,
        Arc::strong_count(&sentinel)
    );
    test_complete!("finished_race_is_released_by_pending_input");
}

#[test]
fn settled_aggregates_stop_counting_as_consumers() {
    let engine = init_test("settled_aggregates_stop_counting_as_consumers");
    let root = engine.defer();
    let source = root.promise.cancellable();

    let raced = engine.race(vec![Value::from(source.clone()), Value::from(1)]);
    let failed = engine.all(vec![Value::from(source.clone()), Value::from(engine.reject("x"))]);
    let some = engine.some(
        vec![Value::from(source.clone()), Value::from(2), Value::from(3)],
        2,
    );
    let first = engine.any(vec![Value::from(source.clone()), Value::from(4)]);
    engine.run_until_idle();
    assert_fulfilled!(raced, 1);
    assert_rejected!(failed, "x");
    assert_fulfilled!(some, vec![2, 3]);
    assert_fulfilled!(first, 4);

    let branch = source.then(|_, v| Ok(v));
    assert!(branch.cancel(Some(Value::from("stop"))));
    engine.run_until_idle();
    assert_cancelled!(source);
    assert_cancelled!(branch);
    test_complete!("settled_aggregates_stop_counting_as_consumers");
}

#[test]
fn pending_aggregate_keeps_observing() {
    let engine = init_test("pending_aggregate_keeps_observing");
    let slow = engine.defer();
    let p = engine.all(vec![Value::from(slow.promise()), Value::from(1)]);
    engine.run_until_idle();
    assert_pending!(p);
    slow.resolve(0);
    engine.run_until_idle();
    assert_fulfilled!(p, vec![0, 1]);
    test_complete!("pending_aggregate_keeps_observing");
}
