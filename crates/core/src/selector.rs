//! Relative key addressing
//!
//! A [`KeySelector`] names a position in the keyspace relative to an anchor
//! key rather than naming a key outright: "the first key at or after X",
//! "the third key strictly before Y". Range reads take a selector pair and
//! resolve both ends against the same ordered key sequence.
//!
//! Resolution against a sorted sequence `K[0..n)` works in three steps:
//!
//! 1. `base`: with `or_equal` set, the last index with `K[i] <= key`;
//!    otherwise the last index with `K[i] < key`. `-1` means "before all".
//! 2. `resolved = base + offset`.
//! 3. Clamp into `[0, n]`, where `n` means "past the end".
//!
//! The four factories use the `(or_equal, offset)` pairs that make this
//! algorithm produce the textbook answers on sorted-array backends:
//! `first_greater_or_equal = (false, +1)`, `first_greater_than = (true, +1)`,
//! `last_less_or_equal = (true, 0)`, `last_less_than = (false, 0)`.

use crate::bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A relative reference to a key, resolved against an ordered key sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeySelector {
    /// The anchor key.
    pub key: Bytes,
    /// Whether the anchor itself can serve as the base position.
    pub or_equal: bool,
    /// Offset applied after the base position is found.
    pub offset: i64,
}

impl KeySelector {
    /// Build a selector from raw parts.
    pub fn new(key: impl Into<Bytes>, or_equal: bool, offset: i64) -> Self {
        KeySelector {
            key: key.into(),
            or_equal,
            offset,
        }
    }

    /// The first key equal to or sorting after `key`.
    pub fn first_greater_or_equal(key: impl Into<Bytes>) -> Self {
        KeySelector::new(key, false, 1)
    }

    /// The first key sorting strictly after `key`.
    pub fn first_greater_than(key: impl Into<Bytes>) -> Self {
        KeySelector::new(key, true, 1)
    }

    /// The last key equal to or sorting before `key`.
    pub fn last_less_or_equal(key: impl Into<Bytes>) -> Self {
        KeySelector::new(key, true, 0)
    }

    /// The last key sorting strictly before `key`.
    pub fn last_less_than(key: impl Into<Bytes>) -> Self {
        KeySelector::new(key, false, 0)
    }

    /// Check whether this selector is one of the four canonical forms a
    /// comparison-only backend can honor exactly.
    pub fn is_canonical(&self) -> bool {
        matches!(
            (self.or_equal, self.offset),
            (false, 1) | (true, 1) | (true, 0) | (false, 0)
        )
    }

    /// Resolve this selector to a range endpoint against `keys`, which
    /// must be sorted ascending.
    ///
    /// Returns an index in `[0, keys.len()]`; `keys.len()` means "past the
    /// end" and an index below zero clamps to `0`. The clamping is what
    /// range endpoints need — a scan starting "before all keys" starts at
    /// the first key. Point lookups must use
    /// [`KeySelector::resolve_point`] instead, where landing off either
    /// end means there is no key to return.
    pub fn resolve(&self, keys: &[Bytes]) -> usize {
        let resolved = self.base_index(keys).saturating_add(self.offset);
        resolved.clamp(0, keys.len() as i64) as usize
    }

    /// Resolve this selector to the index of a concrete key, or `None`
    /// when it lands before the first or past the last key.
    pub fn resolve_point(&self, keys: &[Bytes]) -> Option<usize> {
        let resolved = self.base_index(keys).saturating_add(self.offset);
        if (0..keys.len() as i64).contains(&resolved) {
            Some(resolved as usize)
        } else {
            None
        }
    }

    /// The base position: the last index satisfying the anchor
    /// comparison, or `-1` when no key does.
    fn base_index(&self, keys: &[Bytes]) -> i64 {
        if self.or_equal {
            // last index with keys[i] <= key
            keys.partition_point(|k| k.as_slice() <= self.key.as_slice()) as i64 - 1
        } else {
            // last index with keys[i] < key
            keys.partition_point(|k| k.as_slice() < self.key.as_slice()) as i64 - 1
        }
    }
}

/// Resolve a selector pair to the half-open index range `[start, end)`.
///
/// The scan is empty when `start >= end`. Reverse iteration enumerates
/// `end - 1` down to `start`; direction is applied by the caller.
pub fn resolve_range(begin: &KeySelector, end: &KeySelector, keys: &[Bytes]) -> (usize, usize) {
    (begin.resolve(keys), end.resolve(keys))
}
