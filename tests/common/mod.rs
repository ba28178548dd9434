#![allow(dead_code)]
#![allow(unused_imports)]
//! Shared integration test utilities.
//!
//! Import with:
//! ```ignore
//! #[macro_use]
//! mod common;
//! use common::*;
//! ```

use std::sync::{Arc, Once};

use parking_lot::Mutex;
use pledge::{CellId, Engine, LabRuntime, Outcome, Promise, RejectionSink, Value};
use proptest::prelude::ProptestConfig;
use proptest::test_runner::RngSeed;
use tracing_subscriber::fmt::format::FmtSpan;

static INIT_LOGGING: Once = Once::new();

/// Default seed for property tests when running under CI.
pub const DEFAULT_PROPTEST_SEED: u64 = 0x5EED_5EED;

const PROPTEST_SEED_ENV: &str = "PLEDGE_PROPTEST_SEED";
const PROPTEST_MAX_SHRINK_ITERS_ENV: &str = "PLEDGE_PROPTEST_MAX_SHRINK_ITERS";

/// Configuration for property tests with optional deterministic seed support.
#[derive(Debug, Clone)]
pub struct PropertyTestConfig {
    /// Fixed seed for reproducibility (overrides CI default when set).
    pub seed: Option<u64>,
    /// Number of successful cases required.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl PropertyTestConfig {
    /// Build a config with defaults for property tests.
    #[must_use]
    pub fn new(cases: u32) -> Self {
        Self {
            seed: read_proptest_seed(),
            cases,
            max_shrink_iters: read_max_shrink_iters()
                .unwrap_or(ProptestConfig::default().max_shrink_iters),
        }
    }

    /// Convert into a ProptestConfig, applying deterministic seed rules.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        let mut config = ProptestConfig::with_cases(self.cases);

        // Honor existing PROPTEST_RNG_SEED, otherwise apply our own.
        if matches!(config.rng_seed, RngSeed::Random) {
            if let Some(seed) = self.seed {
                config.rng_seed = RngSeed::Fixed(seed);
            }
        }

        config.max_shrink_iters = self.max_shrink_iters;
        config
    }
}

/// Build a ProptestConfig with deterministic seed support for CI.
#[must_use]
pub fn test_proptest_config(cases: u32) -> ProptestConfig {
    PropertyTestConfig::new(cases).to_proptest_config()
}

fn read_proptest_seed() -> Option<u64> {
    if let Ok(value) = std::env::var(PROPTEST_SEED_ENV) {
        return value.parse::<u64>().ok();
    }

    // If CI is set and no explicit seed is provided, use a fixed seed.
    if std::env::var("CI").is_ok() {
        return Some(DEFAULT_PROPTEST_SEED);
    }

    None
}

fn read_max_shrink_iters() -> Option<u32> {
    std::env::var(PROPTEST_MAX_SHRINK_ITERS_ENV)
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
}

/// Initialize test logging with trace-level output.
pub fn init_test_logging() {
    init_test_logging_with_level(tracing::Level::TRACE);
}

/// Initialize test logging with a custom level.
pub fn init_test_logging_with_level(level: tracing::Level) {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_test_writer()
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(false)
            .try_init();
    });
}

/// Engine with default configuration.
#[must_use]
pub fn test_engine() -> Engine {
    Engine::new()
}

/// Lab runtime over a fresh engine.
#[must_use]
pub fn test_lab() -> LabRuntime {
    LabRuntime::new(Engine::new())
}

/// Records every value a handler observes, with the receiver it saw.
#[derive(Default)]
pub struct Trace {
    entries: Mutex<Vec<(Value, Value)>>,
}

impl Trace {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record(&self, this: &Value, value: &Value) {
        self.entries.lock().push((this.clone(), value.clone()));
    }

    #[must_use]
    pub fn values(&self) -> Vec<Value> {
        self.entries.lock().iter().map(|(_, v)| v.clone()).collect()
    }

    #[must_use]
    pub fn receivers(&self) -> Vec<Value> {
        self.entries.lock().iter().map(|(r, _)| r.clone()).collect()
    }
}

/// Attaches a recording pass-through handler.
pub fn observe(promise: &Promise, trace: &Arc<Trace>) -> Promise {
    let trace = Arc::clone(trace);
    promise.then(move |this, value| {
        trace.record(this, &value);
        Ok(value)
    })
}

/// Sink recording unhandled reports and retractions.
#[derive(Default)]
pub struct CollectingSink {
    reports: Mutex<Vec<(Value, CellId)>>,
    retractions: Mutex<Vec<CellId>>,
}

impl CollectingSink {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    #[must_use]
    pub fn reasons(&self) -> Vec<Value> {
        self.reports.lock().iter().map(|(r, _)| r.clone()).collect()
    }

    #[must_use]
    pub fn reported_ids(&self) -> Vec<CellId> {
        self.reports.lock().iter().map(|(_, id)| *id).collect()
    }

    #[must_use]
    pub fn retractions(&self) -> Vec<CellId> {
        self.retractions.lock().clone()
    }
}

impl RejectionSink for CollectingSink {
    fn unhandled(&self, reason: &Value, promise: &Promise) {
        self.reports.lock().push((reason.clone(), promise.id()));
    }

    fn handled(&self, promise: &Promise) {
        self.retractions.lock().push(promise.id());
    }
}

/// Returns the error kind of a rejected promise, if its reason is an engine error.
#[must_use]
pub fn rejection_kind(promise: &Promise) -> Option<pledge::ErrorKind> {
    promise
        .reason()
        .and_then(|reason| reason.as_error().map(pledge::Error::kind))
}

/// Log a test phase transition with a visual separator.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        tracing::info!(phase = %$name, "========================================");
        tracing::info!(phase = %$name, "TEST PHASE: {}", $name);
        tracing::info!(phase = %$name, "========================================");
    };
}

/// Log a section within a test phase.
#[macro_export]
macro_rules! test_section {
    ($name:expr) => {
        tracing::debug!(section = %$name, "--- {} ---", $name);
    };
}

/// Log test completion with summary.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        tracing::info!(test = %$name, "test completed successfully: {}", $name);
    };
    ($name:expr, $($key:ident = $value:expr),* $(,)?) => {
        tracing::info!(
            test = %$name,
            $($key = %$value,)*
            "test completed successfully: {}",
            $name
        );
    };
}

/// Log before assertions for context.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr) => {
        tracing::debug!(
            expected = ?$expected,
            actual = ?$actual,
            "Asserting: {}",
            $msg
        );
        assert!($cond, "{}: expected {:?}, got {:?}", $msg, $expected, $actual);
    };
}

/// Assert that a promise fulfilled with a specific value.
#[macro_export]
macro_rules! assert_fulfilled {
    ($promise:expr, $expected:expr) => {
        let expected = ::pledge::Value::from($expected);
        match $promise.outcome() {
            Some(::pledge::Outcome::Fulfilled(v)) => assert_eq!(v, expected),
            other => panic!("expected fulfilled({:?}), got {:?}", expected, other),
        }
    };
}

/// Assert that a promise rejected (cancellation included), optionally with a
/// specific reason.
#[macro_export]
macro_rules! assert_rejected {
    ($promise:expr) => {
        match $promise.outcome() {
            Some(o) if o.is_rejected() => {}
            other => panic!("expected a rejection, got {:?}", other),
        }
    };
    ($promise:expr, $reason:expr) => {
        let expected = ::pledge::Value::from($reason);
        match $promise.outcome() {
            Some(::pledge::Outcome::Rejected(r) | ::pledge::Outcome::Cancelled(r)) => {
                assert_eq!(r, expected)
            }
            other => panic!("expected rejected({:?}), got {:?}", expected, other),
        }
    };
}

/// Assert that a promise was cancelled.
#[macro_export]
macro_rules! assert_cancelled {
    ($promise:expr) => {
        match $promise.outcome() {
            Some(::pledge::Outcome::Cancelled(_)) => {}
            other => panic!("expected cancelled, got {:?}", other),
        }
    };
}

/// Assert that a promise is still pending.
#[macro_export]
macro_rules! assert_pending {
    ($promise:expr) => {
        match $promise.outcome() {
            None => {}
            Some(o) => panic!("expected pending, got {}", o),
        }
    };
}
