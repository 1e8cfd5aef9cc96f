//! Typed tuple elements

use crate::tuple::Tuple;
use std::cmp::Ordering;
use std::fmt;
use strata_core::ByteSlice;
use uuid::Uuid;

/// A single typed value inside a [`Tuple`]
///
/// Elements order first by kind, in type-code order
/// (`Null < Bytes < String < Tuple < Int < Float < Double < Bool < Uuid`),
/// then by value. Floating point values use IEEE total order, so `-0.0`
/// sorts before `0.0` and NaNs sort at the extremes, matching their packed
/// encoding.
///
/// Equality is bitwise for floats and by content for bytes: an absent
/// `ByteSlice` inside `Bytes` packs and compares as an empty one.
#[derive(Debug, Clone)]
pub enum Element {
    /// Absent value
    Null,
    /// Opaque byte string
    Bytes(ByteSlice),
    /// UTF-8 text
    String(String),
    /// Signed integer
    Int(i64),
    /// IEEE single precision float
    Float(f32),
    /// IEEE double precision float
    Double(f64),
    /// Boolean
    Bool(bool),
    /// 128-bit identifier
    Uuid(Uuid),
    /// Nested tuple
    Tuple(Tuple),
}

impl Element {
    /// Position of this element's kind in the total order
    fn rank(&self) -> u8 {
        match self {
            Element::Null => 0,
            Element::Bytes(_) => 1,
            Element::String(_) => 2,
            Element::Tuple(_) => 3,
            Element::Int(_) => 4,
            Element::Float(_) => 5,
            Element::Double(_) => 6,
            Element::Bool(_) => 7,
            Element::Uuid(_) => 8,
        }
    }

    /// Human-readable kind name, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Element::Null => "null",
            Element::Bytes(_) => "bytes",
            Element::String(_) => "string",
            Element::Int(_) => "int",
            Element::Float(_) => "float",
            Element::Double(_) => "double",
            Element::Bool(_) => "bool",
            Element::Uuid(_) => "uuid",
            Element::Tuple(_) => "tuple",
        }
    }

    /// Check if this is `Null`
    pub fn is_null(&self) -> bool {
        matches!(self, Element::Null)
    }

    /// Integer value, if this is an `Int`
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Element::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Text value, if this is a `String`
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Element::String(s) => Some(s),
            _ => None,
        }
    }

    /// Byte value, if this is `Bytes`
    pub fn as_bytes(&self) -> Option<&ByteSlice> {
        match self {
            Element::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Boolean value, if this is a `Bool`
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Element::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Floating point value, if this is a `Float` or `Double`
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Element::Float(f) => Some(*f as f64),
            Element::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// Identifier value, if this is a `Uuid`
    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Element::Uuid(u) => Some(*u),
            _ => None,
        }
    }

    /// Nested tuple, if this is a `Tuple`
    pub fn as_tuple(&self) -> Option<&Tuple> {
        match self {
            Element::Tuple(t) => Some(t),
            _ => None,
        }
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Element::Null, Element::Null) => true,
            (Element::Bytes(a), Element::Bytes(b)) => a.as_bytes() == b.as_bytes(),
            (Element::String(a), Element::String(b)) => a == b,
            (Element::Int(a), Element::Int(b)) => a == b,
            (Element::Float(a), Element::Float(b)) => a.to_bits() == b.to_bits(),
            (Element::Double(a), Element::Double(b)) => a.to_bits() == b.to_bits(),
            (Element::Bool(a), Element::Bool(b)) => a == b,
            (Element::Uuid(a), Element::Uuid(b)) => a == b,
            (Element::Tuple(a), Element::Tuple(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Element {}

impl Ord for Element {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Element::Null, Element::Null) => Ordering::Equal,
            (Element::Bytes(a), Element::Bytes(b)) => a.as_bytes().cmp(b.as_bytes()),
            (Element::String(a), Element::String(b)) => a.as_bytes().cmp(b.as_bytes()),
            (Element::Int(a), Element::Int(b)) => a.cmp(b),
            (Element::Float(a), Element::Float(b)) => a.total_cmp(b),
            (Element::Double(a), Element::Double(b)) => a.total_cmp(b),
            (Element::Bool(a), Element::Bool(b)) => a.cmp(b),
            (Element::Uuid(a), Element::Uuid(b)) => a.as_bytes().cmp(b.as_bytes()),
            (Element::Tuple(a), Element::Tuple(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Element {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Element::Null => f.write_str("null"),
            Element::Bytes(b) => write!(f, "b'{}'", b.to_escaped_string()),
            Element::String(s) => write!(f, "{:?}", s),
            Element::Int(n) => write!(f, "{}", n),
            Element::Float(v) => write!(f, "{}f", v),
            Element::Double(v) => write!(f, "{}", v),
            Element::Bool(b) => write!(f, "{}", b),
            Element::Uuid(u) => write!(f, "{}", u.hyphenated()),
            Element::Tuple(t) => write!(f, "{}", t),
        }
    }
}

// ========== Conversions ==========

impl From<&str> for Element {
    fn from(s: &str) -> Self {
        Element::String(s.to_string())
    }
}

impl From<String> for Element {
    fn from(s: String) -> Self {
        Element::String(s)
    }
}

impl From<i64> for Element {
    fn from(n: i64) -> Self {
        Element::Int(n)
    }
}

impl From<i32> for Element {
    fn from(n: i32) -> Self {
        Element::Int(n as i64)
    }
}

impl From<u32> for Element {
    fn from(n: u32) -> Self {
        Element::Int(n as i64)
    }
}

impl From<f32> for Element {
    fn from(v: f32) -> Self {
        Element::Float(v)
    }
}

impl From<f64> for Element {
    fn from(v: f64) -> Self {
        Element::Double(v)
    }
}

impl From<bool> for Element {
    fn from(b: bool) -> Self {
        Element::Bool(b)
    }
}

impl From<Uuid> for Element {
    fn from(u: Uuid) -> Self {
        Element::Uuid(u)
    }
}

impl From<ByteSlice> for Element {
    fn from(b: ByteSlice) -> Self {
        Element::Bytes(b)
    }
}

impl From<Vec<u8>> for Element {
    fn from(b: Vec<u8>) -> Self {
        Element::Bytes(ByteSlice::from_vec(b))
    }
}

impl From<&[u8]> for Element {
    fn from(b: &[u8]) -> Self {
        Element::Bytes(ByteSlice::copy_from(b))
    }
}

impl From<Tuple> for Element {
    fn from(t: Tuple) -> Self {
        Element::Tuple(t)
    }
}

impl<E: Into<Element>> From<Option<E>> for Element {
    fn from(value: Option<E>) -> Self {
        value.map_or(Element::Null, Into::into)
    }
}
