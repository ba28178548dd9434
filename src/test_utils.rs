//! Test utilities for pledge.
//!
//! This module provides shared helpers for unit tests:
//! - Consistent tracing-based logging initialization
//! - Phase/section macros for readable test output
//! - Engine and lab constructors
//! - A recording [`RejectionSink`]
//! - Promise outcome assertion macros
//!
//! # Example
//! ```ignore
//! use pledge::test_utils::{init_test_logging, test_engine};
//!
//! init_test_logging();
//! let engine = test_engine();
//! let p = engine.resolve(1);
//! engine.run_until_idle();
//! pledge::assert_fulfilled!(p, 1);
//! ```

use std::sync::{Arc, Once};

use parking_lot::{Mutex, MutexGuard};
use tracing_subscriber::fmt::format::FmtSpan;

use crate::lab::LabRuntime;
use crate::promise::Promise;
use crate::runtime::{Engine, RejectionSink};
use crate::types::{CellId, Value};

static INIT_LOGGING: Once = Once::new();
static ENV_LOCK: Mutex<()> = parking_lot::const_mutex(());

/// Initialize test logging with trace-level output.
///
/// Safe to call multiple times; only initializes once.
pub fn init_test_logging() {
    init_test_logging_with_level(tracing::Level::TRACE);
}

/// Initialize test logging with a custom level.
///
/// The first call wins; later calls are no-ops.
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

/// Acquire the global environment lock for tests that mutate env vars.
pub fn env_lock() -> MutexGuard<'static, ()> {
    ENV_LOCK.lock()
}

/// Engine with default configuration, for tests.
#[must_use]
pub fn test_engine() -> Engine {
    Engine::builder().build()
}

/// Lab runtime over a fresh default engine.
#[must_use]
pub fn test_lab() -> LabRuntime {
    LabRuntime::new(test_engine())
}

/// A [`RejectionSink`] that records every report and retraction.
#[derive(Default)]
pub struct RecordingSink {
    reports: Mutex<Vec<(Value, CellId)>>,
    retractions: Mutex<Vec<CellId>>,
}

impl RecordingSink {
    /// Creates an empty sink, ready to install.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Unhandled reports so far, in order: (reason, promise id).
    #[must_use]
    pub fn reports(&self) -> Vec<(Value, CellId)> {
        self.reports.lock().clone()
    }

    /// Reasons of unhandled reports so far.
    #[must_use]
    pub fn reasons(&self) -> Vec<Value> {
        self.reports.lock().iter().map(|(r, _)| r.clone()).collect()
    }

    /// Ids of promises whose report was retracted.
    #[must_use]
    pub fn retractions(&self) -> Vec<CellId> {
        self.retractions.lock().clone()
    }
}

impl RejectionSink for RecordingSink {
    fn unhandled(&self, reason: &Value, promise: &Promise) {
        self.reports.lock().push((reason.clone(), promise.id()));
    }

    fn handled(&self, promise: &Promise) {
        self.retractions.lock().push(promise.id());
    }
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

/// Assert that a promise is fulfilled with a specific value.
#[macro_export]
macro_rules! assert_fulfilled {
    ($promise:expr, $expected:expr) => {
        let expected = $crate::types::Value::from($expected);
        match $promise.outcome() {
            Some($crate::types::Outcome::Fulfilled(v)) => assert_eq!(v, expected),
            other => unreachable!("expected fulfilled({:?}), got {:?}", expected, other),
        }
    };
}

/// Assert that a promise is rejected (cancellation included), optionally
/// with a specific reason.
#[macro_export]
macro_rules! assert_rejected {
    ($promise:expr) => {
        match $promise.outcome() {
            Some(o) if o.is_rejected() => {}
            other => unreachable!("expected a rejection, got {:?}", other),
        }
    };
    ($promise:expr, $reason:expr) => {
        let expected = $crate::types::Value::from($reason);
        match $promise.outcome() {
            Some(
                $crate::types::Outcome::Rejected(r) | $crate::types::Outcome::Cancelled(r),
            ) => assert_eq!(r, expected),
            other => unreachable!("expected rejected({:?}), got {:?}", expected, other),
        }
    };
}

/// Assert that a promise is still pending.
#[macro_export]
macro_rules! assert_pending {
    ($promise:expr) => {
        match $promise.outcome() {
            None => {}
            Some(o) => unreachable!("expected pending, got {}", o),
        }
    };
}
