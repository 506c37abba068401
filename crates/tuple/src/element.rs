//! Tuple elements
//!
//! [`Element`] is the tagged sum of every type the codec can carry. The
//! decoder always knows the concrete type from the leading type-code byte,
//! so there is no "any element" indirection anywhere; pattern matching is
//! the whole story.
//!
//! Equality, ordering, and hashing are all defined over the packed bytes.
//! That gives the comparisons the exact semantics of the wire format:
//! distinct float bit patterns (including `+0.0` vs `-0.0`) are distinct
//! elements, and a NaN equals itself when the bit pattern matches.

use crate::tuple::Tuple;
use crate::{decode, encode};
use keyspan_core::{Bytes, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// A single typed element of a tuple.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Element {
    /// Null; sorts before every other type.
    Null,
    /// A byte string.
    Bytes(Bytes),
    /// A UTF-8 string.
    String(String),
    /// A nested tuple.
    Tuple(Tuple),
    /// A signed 64-bit integer.
    Int(i64),
    /// A 32-bit float.
    Float(f32),
    /// A 64-bit float.
    Double(f64),
    /// A boolean.
    Bool(bool),
    /// A UUID, encoded in canonical byte order.
    Uuid(Uuid),
}

impl Element {
    /// Append this element's full type-tagged encoding to `buf`.
    pub fn pack_into(&self, buf: &mut Vec<u8>) {
        encode::encode_element(self, buf);
    }

    /// This element's encoding as a fresh buffer.
    pub fn pack(&self) -> Bytes {
        let mut buf = Vec::new();
        self.pack_into(&mut buf);
        buf
    }

    /// Decode a single element from the front of `data`, returning the
    /// element and the number of bytes consumed.
    pub fn unpack(data: &[u8]) -> Result<(Element, usize)> {
        decode::decode_element(data, 0)
    }

    /// The element's type name, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Element::Null => "Null",
            Element::Bytes(_) => "Bytes",
            Element::String(_) => "String",
            Element::Tuple(_) => "Tuple",
            Element::Int(_) => "Int",
            Element::Float(_) => "Float",
            Element::Double(_) => "Double",
            Element::Bool(_) => "Bool",
            Element::Uuid(_) => "Uuid",
        }
    }

    /// Get as `i64` if this is an `Int`.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Element::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Get as `&str` if this is a `String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Element::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as `&[u8]` if this is a `Bytes`.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Element::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Get as `bool` if this is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Element::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as nested [`Tuple`] if this is a `Tuple`.
    pub fn as_tuple(&self) -> Option<&Tuple> {
        match self {
            Element::Tuple(t) => Some(t),
            _ => None,
        }
    }

    /// Get as [`Uuid`] if this is a `Uuid`.
    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Element::Uuid(u) => Some(*u),
            _ => None,
        }
    }
}

// Comparisons are defined over packed bytes so wire order, equality, and
// hashing can never disagree (NaN bit patterns included).
impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.pack() == other.pack()
    }
}

impl Eq for Element {}

impl PartialOrd for Element {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Element {
    fn cmp(&self, other: &Self) -> Ordering {
        self.pack().cmp(&other.pack())
    }
}

impl Hash for Element {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.pack().hash(state);
    }
}

impl From<()> for Element {
    fn from(_: ()) -> Self {
        Element::Null
    }
}

impl From<Vec<u8>> for Element {
    fn from(v: Vec<u8>) -> Self {
        Element::Bytes(v)
    }
}

impl From<&[u8]> for Element {
    fn from(v: &[u8]) -> Self {
        Element::Bytes(v.to_vec())
    }
}

impl From<String> for Element {
    fn from(s: String) -> Self {
        Element::String(s)
    }
}

impl From<&str> for Element {
    fn from(s: &str) -> Self {
        Element::String(s.to_string())
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
    fn from(f: f32) -> Self {
        Element::Float(f)
    }
}

impl From<f64> for Element {
    fn from(f: f64) -> Self {
        Element::Double(f)
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

impl From<Tuple> for Element {
    fn from(t: Tuple) -> Self {
        Element::Tuple(t)
    }
}
