//! Dynamically typed payloads carried by promises.
//!
//! Fulfillment values, rejection reasons and bound receivers are all
//! [`Value`]s. Data variants compare structurally; promises, thenables and
//! opaque host objects compare by identity.

use core::fmt;
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::Outcome;
use crate::error::Error;
use crate::promise::{FnThenable, Promise, ThenCallback, Thenable};

/// A dynamically typed value.
#[derive(Clone, Default)]
pub enum Value {
    /// The absent value.
    #[default]
    Undefined,
    /// A missing slot in a sparse list. Reads as `Undefined` everywhere except
    /// `race`, which skips it.
    Hole,
    /// Explicit null.
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// String.
    Str(String),
    /// Ordered list; may contain holes.
    List(Vec<Value>),
    /// Keyed mapping with deterministic iteration order.
    Map(BTreeMap<String, Value>),
    /// An engine error.
    Error(Error),
    /// A native promise.
    Promise(Promise),
    /// A foreign object exposing a subscription capability.
    Thenable(Arc<dyn Thenable>),
    /// A per-element descriptor produced by `settle`.
    Settled(Box<Outcome>),
    /// A host object compared by identity.
    Opaque(Arc<dyn Any + Send + Sync>),
}

impl Value {
    /// Builds a list from anything convertible into values.
    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Self>,
    {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    /// Builds a mapping from key/value pairs.
    pub fn map<I, K, T>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, T)>,
        K: Into<String>,
        T: Into<Self>,
    {
        Self::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Wraps a host object. Two opaque values are equal only if they wrap
    /// the same allocation.
    pub fn opaque<T: Any + Send + Sync>(object: T) -> Self {
        Self::Opaque(Arc::new(object))
    }

    /// Builds a thenable from a subscription closure.
    ///
    /// The closure receives the fulfill and reject callbacks. It may call
    /// them synchronously, later, several times or never; returning `Err`
    /// models a subscription that throws.
    pub fn thenable<F>(subscribe: F) -> Self
    where
        F: Fn(ThenCallback, ThenCallback) -> Result<(), Self> + Send + Sync + 'static,
    {
        Self::Thenable(Arc::new(FnThenable::new(subscribe)))
    }

    /// Returns true for `Undefined` and `Hole`.
    #[must_use]
    pub const fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined | Self::Hole)
    }

    /// Returns true for a sparse-list hole.
    #[must_use]
    pub const fn is_hole(&self) -> bool {
        matches!(self, Self::Hole)
    }

    /// Returns true for native promises and thenables.
    #[must_use]
    pub const fn is_promise_like(&self) -> bool {
        matches!(self, Self::Promise(_) | Self::Thenable(_))
    }

    /// Scripting-style truthiness.
    ///
    /// `Undefined`, holes, `Null`, `false`, `0`, `0.0`, `NaN` and the empty
    /// string are falsy; everything else is truthy.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Hole | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0 && !f.is_nan(),
            Self::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Replaces a hole with `Undefined`.
    #[must_use]
    pub fn unhole(self) -> Self {
        match self {
            Self::Hole => Self::Undefined,
            other => other,
        }
    }

    /// Returns the integer, if this is one.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the string slice, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the list elements, if this is a list.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Self]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the mapping, if this is one.
    #[must_use]
    pub const fn as_map(&self) -> Option<&BTreeMap<String, Self>> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Returns the engine error, if this is one.
    #[must_use]
    pub const fn as_error(&self) -> Option<&Error> {
        match self {
            Self::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Returns the native promise, if this is one.
    #[must_use]
    pub const fn as_promise(&self) -> Option<&Promise> {
        match self {
            Self::Promise(p) => Some(p),
            _ => None,
        }
    }

    /// Returns the settle descriptor, if this is one.
    #[must_use]
    pub fn as_settled(&self) -> Option<&Outcome> {
        match self {
            Self::Settled(o) => Some(o),
            _ => None,
        }
    }

    /// Downcasts an opaque host object.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Opaque(obj) => obj.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Reads a property: a mapping key, a list index, or a list's `length`.
    /// Anything else reads as `Undefined`.
    #[must_use]
    pub fn property(&self, key: &str) -> Self {
        match self {
            Self::Map(m) => m.get(key).cloned().unwrap_or_default(),
            Self::List(items) if key == "length" => Self::from(items.len()),
            Self::List(items) => key
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i))
                .cloned()
                .map(Self::unhole)
                .unwrap_or_default(),
            Self::Str(s) if key == "length" => Self::from(s.chars().count()),
            _ => Self::Undefined,
        }
    }

    /// Renders plain data as JSON.
    ///
    /// Errors render as their display string and settle descriptors as
    /// `{"state": ..., "value"|"reason": ...}`; promises, thenables, opaque
    /// objects and non-finite floats map to `null`.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Self::Undefined | Self::Hole | Self::Null => Json::Null,
            Self::Bool(b) => Json::Bool(*b),
            Self::Int(i) => Json::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f).map_or(Json::Null, Json::Number),
            Self::Str(s) => Json::String(s.clone()),
            Self::List(items) => Json::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(m) => Json::Object(m.iter().map(|(k, v)| (k.clone(), v.to_json())).collect()),
            Self::Error(e) => Json::String(e.to_string()),
            Self::Settled(outcome) => {
                let mut obj = serde_json::Map::new();
                match outcome.as_ref() {
                    Outcome::Fulfilled(v) => {
                        obj.insert("state".into(), Json::from("fulfilled"));
                        obj.insert("value".into(), v.to_json());
                    }
                    Outcome::Rejected(r) | Outcome::Cancelled(r) => {
                        obj.insert("state".into(), Json::from("rejected"));
                        obj.insert("reason".into(), r.to_json());
                    }
                }
                Json::Object(obj)
            }
            Self::Promise(_) | Self::Thenable(_) | Self::Opaque(_) => Json::Null,
        }
    }
}

fn same_allocation<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    Arc::as_ptr(a).cast::<()>() == Arc::as_ptr(b).cast::<()>()
}

impl PartialEq for Value {
    #[allow(clippy::cast_precision_loss, clippy::float_cmp)]
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::Undefined | Self::Hole,
                Self::Undefined | Self::Hole,
            )
            | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Int(a), Self::Float(b)) | (Self::Float(b), Self::Int(a)) => *a as f64 == *b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Error(a), Self::Error(b)) => a == b,
            (Self::Promise(a), Self::Promise(b)) => a == b,
            (Self::Thenable(a), Self::Thenable(b)) => same_allocation(a, b),
            (Self::Settled(a), Self::Settled(b)) => a == b,
            (Self::Opaque(a), Self::Opaque(b)) => same_allocation(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Hole => f.write_str("<hole>"),
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x:?}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::List(items) => f.debug_list().entries(items).finish(),
            Self::Map(m) => f.debug_map().entries(m).finish(),
            Self::Error(e) => write!(f, "Error({e})"),
            Self::Promise(p) => write!(f, "Promise({})", p.id()),
            Self::Thenable(_) => f.write_str("Thenable"),
            Self::Settled(o) => write!(f, "{o}"),
            Self::Opaque(_) => f.write_str("Opaque"),
        }
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Self::Undefined
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Self::Int(i64::try_from(n).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl<T: Into<Self>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::list(items)
    }
}

impl From<BTreeMap<String, Self>> for Value {
    fn from(m: BTreeMap<String, Self>) -> Self {
        Self::Map(m)
    }
}

impl From<Error> for Value {
    fn from(e: Error) -> Self {
        Self::Error(e)
    }
}

impl From<Promise> for Value {
    fn from(p: Promise) -> Self {
        Self::Promise(p)
    }
}

impl From<Outcome> for Value {
    fn from(o: Outcome) -> Self {
        Self::Settled(Box::new(o))
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Self::Null,
            Json::Bool(b) => Self::Bool(b),
            Json::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float))
                .unwrap_or(Self::Null),
            Json::String(s) => Self::Str(s),
            Json::Array(items) => Self::list(items),
            Json::Object(obj) => Self::Map(obj.into_iter().map(|(k, v)| (k, v.into())).collect()),
        }
    }
}

impl<T: Into<Self>> FromIterator<T> for Value {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::list(iter)
    }
}
