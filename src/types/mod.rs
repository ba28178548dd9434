//! Core types for the engine.
//!
//! - [`id`]: cell identifiers
//! - [`outcome`]: terminal states of a cell
//! - [`value`]: dynamically typed payloads

pub mod id;
pub mod outcome;
pub mod value;

pub use id::CellId;
pub use outcome::Outcome;
pub use value::Value;
