//! The ordered write buffer
//!
//! Every write a transaction issues lands here as one [`WriteOp`], in issue
//! order. That order is the read-your-writes contract: a point read scans
//! the buffer newest-first and the first op touching the key wins, while
//! range reads apply the whole buffer oldest-first over a snapshot. The two
//! views agree because both are "last effect wins".
//!
//! Versionstamped sets are ordinary `Set` ops carrying placeholder bytes;
//! a fix-up record remembers where the commit versionstamp must be patched
//! in just before the buffer is applied.

use keyspan_core::{Bytes, Versionstamp, WriteOp};
use std::collections::BTreeMap;
use std::ops::Bound;

/// The effect the buffer has on a single key, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Override {
    /// The key currently holds this buffered value.
    Value(Bytes),
    /// The key is cleared by a buffered op.
    Cleared,
}

/// Which half of a buffered `Set` receives the versionstamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StampTarget {
    /// Patch the key bytes.
    Key,
    /// Patch the value bytes.
    Value,
}

/// A pending versionstamp substitution.
#[derive(Debug, Clone)]
struct StampFixup {
    /// Index of the `Set` op in the buffer.
    op_index: usize,
    /// Byte offset of the 10-byte placeholder.
    offset: usize,
    target: StampTarget,
}

/// An ordered log of buffered writes.
#[derive(Debug, Default)]
pub struct WriteBuffer {
    ops: Vec<WriteOp>,
    fixups: Vec<StampFixup>,
}

impl WriteBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        WriteBuffer::default()
    }

    /// Number of buffered ops.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether no ops are buffered.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Buffer a set.
    pub fn set(&mut self, key: impl Into<Bytes>, value: impl Into<Bytes>) {
        self.ops.push(WriteOp::Set {
            key: key.into(),
            value: value.into(),
        });
    }

    /// Buffer a clear.
    pub fn clear(&mut self, key: impl Into<Bytes>) {
        self.ops.push(WriteOp::Clear { key: key.into() });
    }

    /// Buffer a range clear over `[begin, end)`.
    pub fn clear_range(&mut self, begin: impl Into<Bytes>, end: impl Into<Bytes>) {
        self.ops.push(WriteOp::ClearRange {
            begin: begin.into(),
            end: end.into(),
        });
    }

    /// Buffer a set whose key or value holds a versionstamp placeholder at
    /// `offset`, to be patched at commit.
    pub(crate) fn set_versionstamped(
        &mut self,
        target: StampTarget,
        key: Bytes,
        value: Bytes,
        offset: usize,
    ) {
        self.fixups.push(StampFixup {
            op_index: self.ops.len(),
            offset,
            target,
        });
        self.ops.push(WriteOp::Set { key, value });
    }

    /// Whether any versionstamp substitutions are pending.
    pub fn has_pending_stamps(&self) -> bool {
        !self.fixups.is_empty()
    }

    /// The buffer's current effect on `key`: the newest op touching it
    /// decides, or `None` when nothing in the buffer touches it.
    pub fn lookup(&self, key: &[u8]) -> Option<Override> {
        for op in self.ops.iter().rev() {
            if let Some(effect) = op.effect_on(key) {
                return Some(match effect {
                    Some(value) => Override::Value(value.clone()),
                    None => Override::Cleared,
                });
            }
        }
        None
    }

    /// Apply every buffered op, oldest first, onto `map`.
    pub fn apply_to(&self, map: &mut BTreeMap<Bytes, Bytes>) {
        for op in &self.ops {
            match op {
                WriteOp::Set { key, value } => {
                    map.insert(key.clone(), value.clone());
                }
                WriteOp::Clear { key } => {
                    map.remove(key);
                }
                WriteOp::ClearRange { begin, end } => {
                    if begin >= end {
                        continue;
                    }
                    let doomed: Vec<Bytes> = map
                        .range::<[u8], _>((
                            Bound::Included(begin.as_slice()),
                            Bound::Excluded(end.as_slice()),
                        ))
                        .map(|(k, _)| k.clone())
                        .collect();
                    for key in doomed {
                        map.remove(&key);
                    }
                }
            }
        }
    }

    /// Patch every pending versionstamp placeholder with `stamp`.
    pub fn resolve_stamps(&mut self, stamp: &Versionstamp) {
        for fixup in self.fixups.drain(..) {
            if let WriteOp::Set { key, value } = &mut self.ops[fixup.op_index] {
                let bytes = match fixup.target {
                    StampTarget::Key => key,
                    StampTarget::Value => value,
                };
                let end = fixup.offset + Versionstamp::LENGTH;
                bytes[fixup.offset..end].copy_from_slice(stamp.as_bytes());
            }
        }
    }

    /// Take the buffered ops in order, leaving the buffer empty.
    ///
    /// Used by flush-then-query backends; callers must have resolved or
    /// rejected versionstamped ops beforehand.
    pub fn drain_ops(&mut self) -> Vec<WriteOp> {
        debug_assert!(self.fixups.is_empty(), "draining with unresolved stamps");
        self.fixups.clear();
        std::mem::take(&mut self.ops)
    }

    /// Discard everything.
    pub fn discard(&mut self) {
        self.ops.clear();
        self.fixups.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_newest_first() {
        let mut buf = WriteBuffer::new();
        buf.set(b"k".to_vec(), b"1".to_vec());
        buf.clear(b"k".to_vec());
        buf.set(b"k".to_vec(), b"2".to_vec());

        assert_eq!(buf.lookup(b"k"), Some(Override::Value(b"2".to_vec())));
        assert_eq!(buf.lookup(b"other"), None);
    }

    #[test]
    fn clear_range_overrides_earlier_sets() {
        let mut buf = WriteBuffer::new();
        buf.set(b"b".to_vec(), b"1".to_vec());
        buf.clear_range(b"a".to_vec(), b"c".to_vec());

        assert_eq!(buf.lookup(b"b"), Some(Override::Cleared));
        // a later set wins over the clear
        buf.set(b"b".to_vec(), b"2".to_vec());
        assert_eq!(buf.lookup(b"b"), Some(Override::Value(b"2".to_vec())));
    }

    #[test]
    fn apply_matches_lookup() {
        let mut buf = WriteBuffer::new();
        buf.set(b"a".to_vec(), b"1".to_vec());
        buf.set(b"b".to_vec(), b"2".to_vec());
        buf.clear_range(b"a".to_vec(), b"b".to_vec());
        buf.set(b"c".to_vec(), b"3".to_vec());
        buf.clear(b"c".to_vec());

        let mut map = BTreeMap::new();
        map.insert(b"z".to_vec(), b"base".to_vec());
        buf.apply_to(&mut map);

        for key in [&b"a"[..], b"b", b"c", b"z"] {
            let from_map = map.get(key).cloned();
            let from_lookup = match buf.lookup(key) {
                Some(Override::Value(v)) => Some(v),
                Some(Override::Cleared) => None,
                None => map.get(key).cloned(),
            };
            assert_eq!(from_map, from_lookup, "key {key:02X?}");
        }
        assert_eq!(map.get(&b"b".to_vec()), Some(&b"2".to_vec()));
        assert_eq!(map.get(&b"a".to_vec()), None);
    }

    #[test]
    fn inverted_clear_range_is_inert() {
        let mut buf = WriteBuffer::new();
        buf.clear_range(b"z".to_vec(), b"a".to_vec());

        let mut map = BTreeMap::new();
        map.insert(b"m".to_vec(), b"1".to_vec());
        buf.apply_to(&mut map);
        assert_eq!(map.len(), 1);
        assert_eq!(buf.lookup(b"m"), None);
    }

    #[test]
    fn stamps_are_patched_in_place() {
        let mut buf = WriteBuffer::new();
        let mut key = b"idx/".to_vec();
        let offset = key.len();
        key.extend_from_slice(&[0u8; Versionstamp::LENGTH]);
        buf.set_versionstamped(StampTarget::Key, key, b"v".to_vec(), offset);
        assert!(buf.has_pending_stamps());

        let stamp = Versionstamp::new(9, 0);
        buf.resolve_stamps(&stamp);
        assert!(!buf.has_pending_stamps());

        let ops = buf.drain_ops();
        match &ops[0] {
            WriteOp::Set { key, .. } => {
                assert_eq!(&key[..4], b"idx/");
                assert_eq!(&key[4..], stamp.as_bytes());
            }
            other => panic!("expected Set, got {other:?}"),
        }
    }

    #[test]
    fn drain_empties_the_buffer() {
        let mut buf = WriteBuffer::new();
        buf.set(b"a".to_vec(), b"1".to_vec());
        buf.clear(b"b".to_vec());
        let ops = buf.drain_ops();
        assert_eq!(ops.len(), 2);
        assert!(buf.is_empty());
        // writes after a drain start a fresh segment
        buf.set(b"c".to_vec(), b"3".to_vec());
        assert_eq!(buf.len(), 1);
    }
}
