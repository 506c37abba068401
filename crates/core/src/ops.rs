//! Write-buffer value types
//!
//! A transaction's pending effects are an ordered sequence of [`WriteOp`]s.
//! Order is semantic: reads inside the transaction must observe the
//! snapshot with the buffered ops applied in issue order, and commit applies
//! them to the backing store in the same order.

use crate::bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A single buffered write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteOp {
    /// Set `key` to `value`.
    Set {
        /// Key to write.
        key: Bytes,
        /// Value to store.
        value: Bytes,
    },
    /// Remove `key` if present.
    Clear {
        /// Key to remove.
        key: Bytes,
    },
    /// Remove every key in `[begin, end)`.
    ClearRange {
        /// Inclusive lower bound.
        begin: Bytes,
        /// Exclusive upper bound.
        end: Bytes,
    },
}

impl WriteOp {
    /// Evaluate this op's effect on a single key, if it has one.
    ///
    /// Returns `None` when the op does not touch `key`; otherwise the
    /// value the key holds after the op (`Some(None)` for a clear).
    pub fn effect_on(&self, key: &[u8]) -> Option<Option<&Bytes>> {
        match self {
            WriteOp::Set { key: k, value } if k.as_slice() == key => Some(Some(value)),
            WriteOp::Clear { key: k } if k.as_slice() == key => Some(None),
            WriteOp::ClearRange { begin, end }
                if begin.as_slice() <= key && key < end.as_slice() =>
            {
                Some(None)
            }
            _ => None,
        }
    }
}

/// One key-value pair emitted by a range scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    /// The key.
    pub key: Bytes,
    /// The value stored under the key.
    pub value: Bytes,
}

impl KeyValue {
    /// Build a pair.
    pub fn new(key: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        KeyValue {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// The atomic mutation family.
///
/// Arithmetic and bitwise mutations treat operands as little-endian
/// unsigned integers; a missing existing value behaves as an empty byte
/// string. Backends unable to support a mutation natively either apply it
/// read-modify-write inside the current transaction or reject it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MutationType {
    /// Little-endian addition; the result is truncated to the operand width.
    Add,
    /// Bytewise AND.
    BitAnd,
    /// Bytewise OR.
    BitOr,
    /// Bytewise XOR.
    BitXor,
    /// Keep the larger value under little-endian unsigned comparison.
    Max,
    /// Keep the smaller value under little-endian unsigned comparison.
    Min,
    /// Clear the key if its current value equals the operand exactly.
    CompareAndClear,
    /// Set, substituting the commit versionstamp into the key at a trailing
    /// 32-bit little-endian offset.
    SetVersionstampedKey,
    /// Set, substituting the commit versionstamp into the value at a
    /// trailing 32-bit little-endian offset.
    SetVersionstampedValue,
}

impl MutationType {
    /// Whether this mutation embeds a commit versionstamp.
    pub fn is_versionstamped(&self) -> bool {
        matches!(
            self,
            MutationType::SetVersionstampedKey | MutationType::SetVersionstampedValue
        )
    }
}

/// Which side of conflict detection a manually added range participates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConflictRangeType {
    /// Treat the range as read by this transaction.
    Read,
    /// Treat the range as written by this transaction.
    Write,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_affects_only_its_key() {
        let op = WriteOp::Set {
            key: b"a".to_vec(),
            value: b"1".to_vec(),
        };
        assert_eq!(op.effect_on(b"a"), Some(Some(&b"1".to_vec())));
        assert_eq!(op.effect_on(b"b"), None);
    }

    #[test]
    fn clear_range_is_half_open() {
        let op = WriteOp::ClearRange {
            begin: b"b".to_vec(),
            end: b"d".to_vec(),
        };
        assert_eq!(op.effect_on(b"a"), None);
        assert_eq!(op.effect_on(b"b"), Some(None));
        assert_eq!(op.effect_on(b"c"), Some(None));
        assert_eq!(op.effect_on(b"d"), None);
    }

    #[test]
    fn versionstamped_classification() {
        assert!(MutationType::SetVersionstampedKey.is_versionstamped());
        assert!(MutationType::SetVersionstampedValue.is_versionstamped());
        assert!(!MutationType::Add.is_versionstamped());
        assert!(!MutationType::CompareAndClear.is_versionstamped());
    }
}
