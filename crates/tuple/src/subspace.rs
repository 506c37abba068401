//! Prefix-scoped key namespaces
//!
//! A [`Subspace`] scopes tuple-encoded keys under a fixed byte prefix.
//! Nesting a subspace concatenates the parent prefix with a packed tuple,
//! so subspaces compose the same way tuples do and sibling subspaces never
//! overlap.

use crate::element::Element;
use crate::tuple::Tuple;
use keyspan_core::{strinc, Bytes, Error, Result};

/// A byte-string prefix defining a scoped keyspace.
///
/// # Example
///
/// ```
/// use keyspan_tuple::{Subspace, Tuple};
///
/// let users = Subspace::from_tuple(&Tuple::new().push("users"));
/// let key = users.pack(&Tuple::new().push("alice").push(7i64));
///
/// assert!(users.contains(&key));
/// assert_eq!(
///     users.unpack(&key).unwrap(),
///     Tuple::new().push("alice").push(7i64)
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subspace {
    prefix: Bytes,
}

impl Subspace {
    /// Create a subspace over a raw byte prefix.
    pub fn new(prefix: impl Into<Bytes>) -> Self {
        Subspace {
            prefix: prefix.into(),
        }
    }

    /// Create a subspace whose prefix is the packed form of `tuple`.
    pub fn from_tuple(tuple: &Tuple) -> Self {
        Subspace {
            prefix: tuple.pack(),
        }
    }

    /// The raw prefix.
    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    /// Create a child subspace: the parent prefix followed by the packed
    /// element.
    pub fn child<E: Into<Element>>(&self, element: E) -> Self {
        let mut prefix = self.prefix.clone();
        element.into().pack_into(&mut prefix);
        Subspace { prefix }
    }

    /// Create a child subspace from a whole tuple of elements.
    pub fn child_tuple(&self, tuple: &Tuple) -> Self {
        let mut prefix = self.prefix.clone();
        tuple.pack_into(&mut prefix);
        Subspace { prefix }
    }

    /// Pack a key within this subspace: prefix followed by the packed
    /// tuple.
    pub fn pack(&self, tuple: &Tuple) -> Bytes {
        let mut key = self.prefix.clone();
        tuple.pack_into(&mut key);
        key
    }

    /// Decode the tuple portion of a key in this subspace.
    ///
    /// # Errors
    ///
    /// [`Error::PrefixMismatch`] when the key does not start with this
    /// subspace's prefix; otherwise any codec error from the suffix.
    pub fn unpack(&self, key: &[u8]) -> Result<Tuple> {
        if !self.contains(key) {
            return Err(Error::PrefixMismatch);
        }
        Tuple::unpack(&key[self.prefix.len()..])
    }

    /// Whether `key` begins with this subspace's prefix.
    pub fn contains(&self, key: &[u8]) -> bool {
        key.starts_with(&self.prefix)
    }

    /// The range of all tuple-encoded keys inside this subspace,
    /// excluding the bare prefix itself: `prefix ∥ 0x00` up to the
    /// prefix's strict upper bound.
    pub fn range(&self) -> (Bytes, Bytes) {
        let mut begin = self.prefix.clone();
        begin.push(0x00);
        (begin, self.upper_bound())
    }

    /// The range of every key starting with the prefix, the bare prefix
    /// included.
    pub fn prefix_range(&self) -> (Bytes, Bytes) {
        (self.prefix.clone(), self.upper_bound())
    }

    /// The range between two tuple-encoded endpoints inside this
    /// subspace: `prefix ∥ pack(from)` up to `prefix ∥ pack(to)`.
    pub fn range_between(&self, from: &Tuple, to: &Tuple) -> (Bytes, Bytes) {
        (self.pack(from), self.pack(to))
    }

    fn upper_bound(&self) -> Bytes {
        strinc(&self.prefix).unwrap_or_else(|_| vec![0xFF])
    }
}

impl Default for Subspace {
    /// The root subspace: an empty prefix containing every key.
    fn default() -> Self {
        Subspace { prefix: Vec::new() }
    }
}
