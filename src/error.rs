//! Error types and error handling strategy for pledge.
//!
//! Rejection reasons are arbitrary [`Value`]s and the kernel never interprets
//! them. The engine itself only ever produces one kind of reason: an [`Error`]
//! carrying an [`ErrorKind`], wrapped as [`Value::Error`]. Handling follows
//! these principles:
//!
//! - Errors produced by the engine are typed (no stringly-typed errors)
//! - Callers can filter on kind or category without parsing messages
//! - Panics in user code are caught at the call boundary and converted to
//!   `ErrorKind::Panicked`
//! - Aggregate failures keep every underlying reason
//!
//! # Error Categories
//!
//! - **Type**: a value did not have the shape an operation requires
//! - **Range**: an aggregate was asked for more results than it can produce
//! - **Aggregate**: several underlying rejections reported together
//! - **Cancellation**: a chain was cancelled
//! - **Timeout**: a lab timer expired before the source settled
//! - **Internal**: handler panics and self-resolution

use core::fmt;
use std::sync::Arc;

use crate::types::{CellId, Value};

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // === Type contract ===
    /// A value did not have the required shape (e.g. spreading a non-list).
    TypeMismatch,
    /// A promise was resolved with itself, or a thenable fed itself back.
    CircularAssimilation,

    // === Aggregates ===
    /// An aggregate can never produce enough fulfillments (empty `any`,
    /// `some(n)` over fewer than `n` slots).
    EmptyAggregate,
    /// Every contributing input rejected; see [`Error::reasons`].
    Aggregate,

    // === Cancellation / time ===
    /// The chain was cancelled.
    Cancelled,
    /// A lab timeout fired before the source settled.
    Timeout,

    // === Internal ===
    /// User code panicked inside a handler, executor, mapper or thenable.
    Panicked,
}

impl ErrorKind {
    /// Returns the error category for this kind.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::TypeMismatch => ErrorCategory::Type,
            Self::EmptyAggregate => ErrorCategory::Range,
            Self::Aggregate => ErrorCategory::Aggregate,
            Self::Cancelled => ErrorCategory::Cancellation,
            Self::Timeout => ErrorCategory::Timeout,
            Self::CircularAssimilation | Self::Panicked => ErrorCategory::Internal,
        }
    }
}

/// High-level error category for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Type-contract violations.
    Type,
    /// Range violations on aggregate arity.
    Range,
    /// Aggregated rejections.
    Aggregate,
    /// Cancellation.
    Cancellation,
    /// Timer expiry.
    Timeout,
    /// Panics and protocol violations.
    Internal,
}

/// Diagnostic context for an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ErrorContext {
    /// The cell the error was raised for, if known.
    pub cell: Option<CellId>,
}

/// The error type produced by the engine.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    reasons: Vec<Value>,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
    context: ErrorContext,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            reasons: Vec::new(),
            source: None,
            context: ErrorContext { cell: None },
        }
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    /// Returns true if this error represents cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self.kind, ErrorKind::Cancelled)
    }

    /// Returns true if this error is a lab timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self.kind, ErrorKind::Timeout)
    }

    /// Returns true if this is a type-contract violation.
    #[must_use]
    pub const fn is_type_error(&self) -> bool {
        matches!(self.kind.category(), ErrorCategory::Type)
    }

    /// Returns true if this error aggregates several reasons.
    #[must_use]
    pub const fn is_aggregate(&self) -> bool {
        matches!(self.kind, ErrorKind::Aggregate)
    }

    /// Adds a message description to the error.
    #[must_use]
    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Adds structured context to the error.
    #[must_use]
    pub fn with_context(mut self, ctx: ErrorContext) -> Self {
        self.context = ctx;
        self
    }

    /// Adds a source error to the chain.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Returns the error message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns the error context.
    #[must_use]
    pub fn context(&self) -> &ErrorContext {
        &self.context
    }

    /// Returns the underlying reasons of an aggregate, in the order the
    /// producing combinator defines (input order for `any`, completion order
    /// for `some`). Empty for every other kind.
    #[must_use]
    pub fn reasons(&self) -> &[Value] {
        &self.reasons
    }

    /// Creates a type-contract error.
    #[must_use]
    pub fn type_mismatch(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeMismatch).with_message(detail)
    }

    /// Creates the error used when a cell is resolved with itself.
    #[must_use]
    pub fn circular(cell: CellId) -> Self {
        Self::new(ErrorKind::CircularAssimilation)
            .with_message("circular thenable chain")
            .with_context(ErrorContext { cell: Some(cell) })
    }

    /// Creates an empty-aggregate (range) error.
    #[must_use]
    pub fn empty_aggregate(needed: usize, available: usize) -> Self {
        Self::new(ErrorKind::EmptyAggregate).with_message(format!(
            "need {needed} fulfillments but only {available} inputs"
        ))
    }

    /// Creates an aggregate error from the collected reasons.
    #[must_use]
    pub fn aggregate(reasons: Vec<Value>) -> Self {
        let mut err = Self::new(ErrorKind::Aggregate)
            .with_message(format!("{} inputs rejected", reasons.len()));
        err.reasons = reasons;
        err
    }

    /// Creates the default cancellation reason.
    #[must_use]
    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled).with_message("operation cancelled")
    }

    /// Creates a timeout error.
    #[must_use]
    pub fn timeout(after: std::time::Duration) -> Self {
        Self::new(ErrorKind::Timeout).with_message(format!("timed out after {after:?}"))
    }

    /// Creates a panic error from a caught panic payload.
    #[must_use]
    pub fn panicked(payload: &(dyn std::any::Any + Send)) -> Self {
        let detail = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        Self::new(ErrorKind::Panicked).with_message(detail)
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.message == other.message && self.reasons == other.reasons
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(msg) = &self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

/// Errors raised while assembling an [`EngineConfig`](crate::runtime::EngineConfig)
/// from the environment or a config file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable held an unparseable value.
    #[error("invalid value for {var}: expected {expected}, got {value:?}")]
    InvalidEnv {
        /// Variable name.
        var: String,
        /// What the variable should contain.
        expected: &'static str,
        /// The raw value found.
        value: String,
    },

    /// A config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path that was read.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A config file was not valid TOML for the engine schema.
    #[error("failed to parse TOML config: {0}")]
    Parse(String),
}
