//! Logging shim over `tracing`.
//!
//! With the `tracing-integration` feature (on by default) the usual macros
//! are re-exported from `tracing`. Without it they expand to nothing, so the
//! engine carries no logging cost.
//!
//! Engine events:
//!
//! | Level | Event |
//! |-------|-------|
//! | trace | cell created, cell settled, drain cycle finished |
//! | debug | cancellation target chosen, circular assimilation |
//! | warn  | unhandled rejection without a sink, handler panic |
//!
//! ```rust,ignore
//! use pledge::tracing_compat::{debug, trace};
//!
//! trace!(cell = ?id, "cell settled");
//! debug!(target = ?id, "cancellation target selected");
//! ```

#[cfg(feature = "tracing-integration")]
pub use tracing::{debug, error, info, trace, warn};

#[cfg(not(feature = "tracing-integration"))]
mod noop {
    //! Macros that discard their arguments.

    /// No-op trace-level logging macro.
    #[macro_export]
    macro_rules! trace {
        ($($arg:tt)*) => {};
    }

    /// No-op debug-level logging macro.
    #[macro_export]
    macro_rules! debug {
        ($($arg:tt)*) => {};
    }

    /// No-op info-level logging macro.
    #[macro_export]
    macro_rules! info {
        ($($arg:tt)*) => {};
    }

    /// No-op warn-level logging macro.
    #[macro_export]
    macro_rules! warn {
        ($($arg:tt)*) => {};
    }

    /// No-op error-level logging macro.
    #[macro_export]
    macro_rules! error {
        ($($arg:tt)*) => {};
    }

    pub use crate::{debug, error, info, trace, warn};
}

#[cfg(not(feature = "tracing-integration"))]
pub use noop::*;
