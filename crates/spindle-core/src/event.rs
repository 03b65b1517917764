//! Events routed between tasks
//!
//! An `Event` is immutable once built and cheap to clone: every clone shares
//! one allocation, so a single event can be handed to every subscribed task
//! of a tick, or broadcast to several threads, without copying its payload.

use std::fmt;
use std::sync::Arc;

/// Numeric type tag of an event, used for subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventType(pub u32);

impl From<u32> for EventType {
    fn from(value: u32) -> Self {
        EventType(value)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A single event parameter
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    /// Boolean flag
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Unsigned integer
    UInt(u64),
    /// Floating point number
    Float(f64),
    /// Shared string
    Str(Arc<str>),
    /// Shared byte buffer
    Bytes(Arc<[u8]>),
}

impl Param {
    /// Get the value as a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Param::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get the value as a signed integer, converting unsigned values that fit
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Param::Int(i) => Some(*i),
            Param::UInt(u) => i64::try_from(*u).ok(),
            _ => None,
        }
    }

    /// Get the value as an unsigned integer, converting non-negative signed values
    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Param::UInt(u) => Some(*u),
            Param::Int(i) => u64::try_from(*i).ok(),
            _ => None,
        }
    }

    /// Get the value as a float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Param::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Get the value as a string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Param::Str(s) => Some(&**s),
            _ => None,
        }
    }

    /// Get the value as a byte slice
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Param::Bytes(b) => Some(&**b),
            _ => None,
        }
    }
}

macro_rules! param_from {
    ($variant:ident, $conv:ty, $($ty:ty),*) => {
        $(
            impl From<$ty> for Param {
                fn from(value: $ty) -> Self {
                    Param::$variant(<$conv>::from(value))
                }
            }
        )*
    };
}

param_from!(Bool, bool, bool);
param_from!(Int, i64, i8, i16, i32, i64);
param_from!(UInt, u64, u8, u16, u32, u64);
param_from!(Float, f64, f32, f64);

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Param::Str(Arc::from(value))
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Param::Str(Arc::from(value))
    }
}

impl From<&[u8]> for Param {
    fn from(value: &[u8]) -> Self {
        Param::Bytes(Arc::from(value))
    }
}

impl From<Vec<u8>> for Param {
    fn from(value: Vec<u8>) -> Self {
        Param::Bytes(Arc::from(value))
    }
}

struct EventInner {
    kind: EventType,
    params: Vec<Param>,
}

/// Immutable, reference-counted message
#[derive(Clone)]
pub struct Event {
    inner: Arc<EventInner>,
}

impl Event {
    /// Create an event without parameters
    pub fn new(kind: impl Into<EventType>) -> Self {
        Self::builder(kind).build()
    }

    /// Start building an event with parameters
    pub fn builder(kind: impl Into<EventType>) -> EventBuilder {
        EventBuilder {
            kind: kind.into(),
            params: Vec::new(),
        }
    }

    /// Type tag of the event
    pub fn kind(&self) -> EventType {
        self.inner.kind
    }

    /// All parameters in order
    pub fn params(&self) -> &[Param] {
        &self.inner.params
    }

    /// Parameter at `index`
    pub fn param(&self, index: usize) -> Option<&Param> {
        self.inner.params.get(index)
    }

    /// Whether both handles refer to the same event instance
    pub fn ptr_eq(&self, other: &Event) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
            || (self.inner.kind == other.inner.kind && self.inner.params == other.inner.params)
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("kind", &self.inner.kind)
            .field("params", &self.inner.params)
            .finish()
    }
}

/// Builder for events carrying parameters
#[derive(Debug)]
pub struct EventBuilder {
    kind: EventType,
    params: Vec<Param>,
}

impl EventBuilder {
    /// Append a parameter
    pub fn param(mut self, value: impl Into<Param>) -> Self {
        self.params.push(value.into());
        self
    }

    /// Freeze the event
    pub fn build(self) -> Event {
        Event {
            inner: Arc::new(EventInner {
                kind: self.kind,
                params: self.params,
            }),
        }
    }
}
