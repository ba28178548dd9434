//! Pledge: a promise engine with one-shot settlement, cooperative
//! cancellation and receiver binding.
//!
//! # Overview
//!
//! A [`Promise`] is a shared handle to a settlement cell that moves from
//! pending to fulfilled, rejected or cancelled exactly once. Continuations
//! registered with [`Promise::then`] run from the [`Engine`]'s FIFO job
//! queue, never inside the call that registered them. Foreign objects
//! implementing [`Thenable`] are assimilated without trusting them to call
//! back only once.
//!
//! # Core Guarantees
//!
//! - **Single settlement**: the first resolve, reject or cancel wins
//! - **No synchronous reentry**: handlers run only when the host drains the
//!   engine, in registration order per promise
//! - **Deterministic binding**: handlers downstream of [`Promise::bind`] see
//!   the receiver's final value, whichever side settles first
//! - **Last-consumer cancellation**: cancelling one branch of a fan-out
//!   never cancels a producer another branch still needs
//! - **Reported rejections**: a rejection nobody handles reaches the
//!   [`RejectionSink`] once, and the report is retracted if a handler shows up
//!
//! # Module Structure
//!
//! - [`types`]: values, outcomes and cell identifiers
//! - [`promise`]: the kernel (creation, chaining, binding, cancellation)
//! - [`combinator`]: `all`, `any`, `race`, `some`, `settle`, `props`, `map`,
//!   `filter`, `reduce`, `spread`
//! - [`runtime`]: the engine, its configuration and rejection reporting
//! - [`lab`]: virtual time for tests (`delay`, `timeout`)
//! - [`error`]: error types
//!
//! # Example
//!
//! ```
//! use pledge::{Engine, Value};
//!
//! let engine = Engine::new();
//! let doubled = engine
//!     .all(vec![engine.resolve(1), engine.resolve(2)])
//!     .map(|_, v, _, _| Ok(Value::from(v.as_int().unwrap_or(0) * 2)));
//! engine.run_until_idle();
//! assert_eq!(doubled.value(), Some(Value::list([2, 4])));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_inception)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]

pub mod combinator;
pub mod error;
pub mod lab;
pub mod promise;
pub mod runtime;
#[cfg(any(test, feature = "test-internals"))]
pub mod test_utils;
pub mod tracing_compat;
pub mod types;

pub use error::{ConfigError, Error, ErrorCategory, ErrorContext, ErrorKind};
pub use lab::LabRuntime;
pub use promise::{Deferred, FnThenable, Promise, Resolver, ThenCallback, Thenable};
pub use runtime::{Engine, EngineBuilder, EngineConfig, RejectionSink};
pub use types::{CellId, Outcome, Value};
