//! Terminal states of a settlement cell.
//!
//! - `Fulfilled(value)`: the cell produced a value
//! - `Rejected(reason)`: the cell failed with an opaque reason
//! - `Cancelled(reason)`: the cell was cancelled; a sub-state of rejection
//!
//! Cancellation is distinguishable for callers that do not want to treat it
//! as an ordinary failure, but every predicate that asks "did it fail?"
//! answers yes for both `Rejected` and `Cancelled`.

use super::Value;
use core::fmt;

/// The settled state of a promise.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Settled with a value.
    Fulfilled(Value),
    /// Settled with a rejection reason.
    Rejected(Value),
    /// Settled by cancellation, carrying the cancellation reason.
    Cancelled(Value),
}

impl Outcome {
    /// Returns true for `Fulfilled`.
    #[must_use]
    pub const fn is_fulfilled(&self) -> bool {
        matches!(self, Self::Fulfilled(_))
    }

    /// Returns true for `Rejected` and `Cancelled`.
    #[must_use]
    pub const fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_) | Self::Cancelled(_))
    }

    /// Returns true for `Cancelled` only.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// Returns the fulfillment value, if any.
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Fulfilled(v) => Some(v),
            Self::Rejected(_) | Self::Cancelled(_) => None,
        }
    }

    /// Returns the rejection or cancellation reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<&Value> {
        match self {
            Self::Fulfilled(_) => None,
            Self::Rejected(r) | Self::Cancelled(r) => Some(r),
        }
    }

    /// Returns the carried value or reason.
    #[must_use]
    pub fn into_payload(self) -> Value {
        match self {
            Self::Fulfilled(v) | Self::Rejected(v) | Self::Cancelled(v) => v,
        }
    }

    /// Converts into a standard `Result`, folding cancellation into `Err`.
    pub fn into_result(self) -> Result<Value, Value> {
        match self {
            Self::Fulfilled(v) => Ok(v),
            Self::Rejected(r) | Self::Cancelled(r) => Err(r),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fulfilled(v) => write!(f, "fulfilled({v:?})"),
            Self::Rejected(r) => write!(f, "rejected({r:?})"),
            Self::Cancelled(r) => write!(f, "cancelled({r:?})"),
        }
    }
}
