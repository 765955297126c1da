//! Field values
//!
//! Tagged values keyed by field name, validated against a table's field
//! list at the boundary.

use std::collections::BTreeMap;
use std::fmt;

use crate::field::FieldType;

/// Values for one record, keyed by field name
pub type FieldValues = BTreeMap<String, Value>;

/// Byte range of a ref payload inside its side file
///
/// Encoded in the owning slot as two little-endian u64s, `start` then `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RefSpan {
    pub start: u64,
    pub end: u64,
}

impl RefSpan {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Length of the referenced payload
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    /// True when the span covers no bytes
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// True for the zeroed span written when a ref value is absent
    pub fn is_absent(&self) -> bool {
        self.start == 0 && self.end == 0
    }
}

/// A single field value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `string` fields, and the text payload supplied for `ref` fields
    Text(String),

    /// `int` fields
    Int(i64),

    /// `float` fields
    Float(f64),

    /// `timeID` fields (nanoseconds since the Unix epoch)
    TimeId(u64),

    /// `ref` fields as stored in a slot, before resolution
    Ref(RefSpan),
}

impl Value {
    /// Short name of the variant, for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Text(_) => "text",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::TimeId(_) => "timeID",
            Value::Ref(_) => "ref offsets",
        }
    }

    /// Whether a caller may supply this value for a field of `field_type`
    ///
    /// `ref` fields take their payload as text; the offsets are assigned by
    /// the side store.
    pub fn is_input_for(&self, field_type: FieldType) -> bool {
        matches!(
            (field_type, self),
            (FieldType::String, Value::Text(_))
                | (FieldType::Ref, Value::Text(_))
                | (FieldType::Int, Value::Int(_))
                | (FieldType::Float, Value::Float(_))
                | (FieldType::TimeId, Value::TimeId(_))
        )
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_time_id(&self) -> Option<u64> {
        match self {
            Value::TimeId(t) => Some(*t),
            _ => None,
        }
    }

    pub fn as_ref_span(&self) -> Option<RefSpan> {
        match self {
            Value::Ref(span) => Some(*span),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "{}", s),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::TimeId(t) => write!(f, "{}", t),
            Value::Ref(span) => write!(f, "@{}..{}", span.start, span.end),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<RefSpan> for Value {
    fn from(span: RefSpan) -> Self {
        Value::Ref(span)
    }
}
