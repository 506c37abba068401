//! The snapshot-based in-memory backend
//!
//! [`MemoryEngine`] keeps an ordered map behind a mutex that is held only
//! for two moments: snapshot capture at transaction creation and buffer
//! application at commit. A transaction clones an `Arc` of the map at
//! creation and reads from that snapshot for its whole life without ever
//! taking the lock, so commits by others after creation are invisible
//! until the next transaction.
//!
//! Multiple transactions may be open at once; the engine performs no
//! cross-transaction coordination and the last commit to touch a key wins.
//!
//! Range reads are realized by materialize-and-merge: the snapshot plus
//! the write buffer applied in issue order produce the effective sorted
//! sequence, selectors resolve to indices in it, and the scan emits in the
//! requested direction.

use crate::atomic::{apply_mutation, split_stamp_operand};
use crate::buffer::{Override, StampTarget, WriteBuffer};
use crate::range::RangeScan;
use crate::traits::{not_active, Engine, Transaction, TransactionState};
use keyspan_core::{
    resolve_range, Bytes, ConflictRangeType, Error, KeySelector, KeyValue, MutationType,
    RangeOptions, Result, TransactionOption, Versionstamp,
};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Shared engine state; the mutex is held only during snapshot capture
/// and commit application.
#[derive(Debug)]
struct MemoryState {
    data: Arc<BTreeMap<Bytes, Bytes>>,
    version: u64,
}

/// An in-memory, snapshot-isolated storage backend.
///
/// Cloning the engine clones a handle to the same store.
#[derive(Debug, Clone)]
pub struct MemoryEngine {
    shared: Arc<Mutex<MemoryState>>,
}

impl MemoryEngine {
    /// Create an empty engine.
    pub fn new() -> Self {
        MemoryEngine {
            shared: Arc::new(Mutex::new(MemoryState {
                data: Arc::new(BTreeMap::new()),
                version: 0,
            })),
        }
    }

    /// Number of keys currently committed.
    pub fn len(&self) -> usize {
        self.shared.lock().data.len()
    }

    /// Whether no keys are committed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The latest commit version.
    pub fn current_version(&self) -> u64 {
        self.shared.lock().version
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        MemoryEngine::new()
    }
}

impl Engine for MemoryEngine {
    fn create_transaction(&self) -> Result<Box<dyn Transaction>> {
        let (snapshot, read_version) = {
            let state = self.shared.lock();
            (Arc::clone(&state.data), state.version)
        };
        trace!(read_version, "memory transaction created");
        Ok(Box::new(MemoryTransaction {
            shared: Arc::clone(&self.shared),
            snapshot,
            read_version,
            buffer: WriteBuffer::new(),
            state: TransactionState::Active,
            committed_version: None,
            versionstamp: None,
            deadline: None,
            options: Vec::new(),
            conflict_ranges: Vec::new(),
        }))
    }
}

/// A transaction against a [`MemoryEngine`].
pub struct MemoryTransaction {
    shared: Arc<Mutex<MemoryState>>,
    snapshot: Arc<BTreeMap<Bytes, Bytes>>,
    read_version: u64,
    buffer: WriteBuffer,
    state: TransactionState,
    committed_version: Option<u64>,
    versionstamp: Option<Versionstamp>,
    deadline: Option<Instant>,
    options: Vec<TransactionOption>,
    conflict_ranges: Vec<(Bytes, Bytes, ConflictRangeType)>,
}

impl MemoryTransaction {
    /// Reject reads once the transaction is terminal or timed out.
    fn check_readable(&self) -> Result<()> {
        if self.state.is_terminal() {
            return Err(not_active(self.state));
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(Error::TransactionTooOld);
            }
        }
        Ok(())
    }

    /// The value of `key` under this transaction's view.
    fn read_effective(&self, key: &[u8]) -> Option<Bytes> {
        match self.buffer.lookup(key) {
            Some(Override::Value(value)) => Some(value),
            Some(Override::Cleared) => None,
            None => self.snapshot.get(key).cloned(),
        }
    }

    /// The snapshot with the buffer applied in issue order.
    fn merged(&self) -> BTreeMap<Bytes, Bytes> {
        let mut map = (*self.snapshot).clone();
        self.buffer.apply_to(&mut map);
        map
    }

    /// Inert options recorded on this transaction.
    pub fn recorded_options(&self) -> &[TransactionOption] {
        &self.options
    }

    /// Manually added conflict ranges (recorded, never evaluated).
    pub fn conflict_ranges(&self) -> &[(Bytes, Bytes, ConflictRangeType)] {
        &self.conflict_ranges
    }
}

impl Transaction for MemoryTransaction {
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>> {
        self.check_readable()?;
        Ok(self.read_effective(key))
    }

    fn get_key(&mut self, selector: &KeySelector) -> Result<Option<Bytes>> {
        self.check_readable()?;
        let merged = self.merged();
        let keys: Vec<Bytes> = merged.keys().cloned().collect();
        Ok(selector.resolve_point(&keys).map(|index| keys[index].clone()))
    }

    fn get_range(
        &mut self,
        begin: KeySelector,
        end: KeySelector,
        options: RangeOptions,
    ) -> Result<RangeScan> {
        self.check_readable()?;
        let merged = self.merged();
        let keys: Vec<Bytes> = merged.keys().cloned().collect();
        let (start, stop) = resolve_range(&begin, &end, &keys);
        if start >= stop {
            return Ok(RangeScan::from_pairs(Vec::new()));
        }

        let slice = &keys[start..stop];
        let mut pairs: Vec<KeyValue> = if options.reverse {
            slice
                .iter()
                .rev()
                .map(|k| KeyValue::new(k.clone(), merged[k].clone()))
                .collect()
        } else {
            slice
                .iter()
                .map(|k| KeyValue::new(k.clone(), merged[k].clone()))
                .collect()
        };
        if options.limit > 0 {
            pairs.truncate(options.limit);
        }
        Ok(RangeScan::from_pairs(pairs))
    }

    fn set(&mut self, key: &[u8], value: &[u8]) {
        if self.state.is_terminal() {
            trace!("set on a terminal transaction discarded");
            return;
        }
        self.buffer.set(key.to_vec(), value.to_vec());
    }

    fn clear(&mut self, key: &[u8]) {
        if self.state.is_terminal() {
            return;
        }
        self.buffer.clear(key.to_vec());
    }

    fn clear_range(&mut self, begin: &[u8], end: &[u8]) {
        if self.state.is_terminal() {
            return;
        }
        self.buffer.clear_range(begin.to_vec(), end.to_vec());
    }

    fn atomic_op(&mut self, mutation: MutationType, key: &[u8], param: &[u8]) -> Result<()> {
        if self.state.is_terminal() {
            return Ok(());
        }
        match mutation {
            MutationType::SetVersionstampedKey => {
                let (stamped_key, offset) = split_stamp_operand(key)?;
                self.buffer
                    .set_versionstamped(StampTarget::Key, stamped_key, param.to_vec(), offset);
            }
            MutationType::SetVersionstampedValue => {
                let (stamped_value, offset) = split_stamp_operand(param)?;
                self.buffer.set_versionstamped(
                    StampTarget::Value,
                    key.to_vec(),
                    stamped_value,
                    offset,
                );
            }
            _ => {
                let existing = self.read_effective(key);
                match apply_mutation(mutation, existing.as_deref(), param) {
                    Some(value) => self.buffer.set(key.to_vec(), value),
                    None => self.buffer.clear(key.to_vec()),
                }
            }
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        match self.state {
            TransactionState::Committed => return Ok(()),
            TransactionState::Cancelled | TransactionState::RolledBack => {
                return Err(not_active(self.state));
            }
            TransactionState::Active => {}
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                self.buffer.discard();
                self.state = TransactionState::RolledBack;
                return Err(Error::TransactionTooOld);
            }
        }

        let mut shared = self.shared.lock();
        if self.buffer.is_empty() {
            // read-only commit: nothing applied, no versionstamp
            self.committed_version = Some(shared.version);
            self.state = TransactionState::Committed;
            trace!(version = shared.version, "read-only commit");
            return Ok(());
        }

        let commit_version = shared.version + 1;
        let stamp = Versionstamp::new(commit_version, 0);
        self.buffer.resolve_stamps(&stamp);
        let ops = self.buffer.len();
        self.buffer.apply_to(Arc::make_mut(&mut shared.data));
        shared.version = commit_version;

        self.committed_version = Some(commit_version);
        self.versionstamp = Some(stamp);
        self.buffer.discard();
        self.state = TransactionState::Committed;
        debug!(version = commit_version, ops, "memory transaction committed");
        Ok(())
    }

    fn cancel(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.buffer.discard();
        self.state = TransactionState::Cancelled;
        debug!("memory transaction cancelled");
    }

    fn set_read_version(&mut self, version: u64) {
        // the snapshot is already captured and no history is kept; the
        // request is recorded without effect
        trace!(requested = version, "set_read_version on snapshot backend");
    }

    fn get_read_version(&self) -> Result<u64> {
        self.check_readable()?;
        Ok(self.read_version)
    }

    fn get_committed_version(&self) -> Result<u64> {
        self.committed_version
            .ok_or_else(|| Error::invalid_operation("transaction has not committed"))
    }

    fn get_versionstamp(&self) -> Result<Option<Versionstamp>> {
        Ok(self.versionstamp)
    }

    fn set_option(&mut self, option: TransactionOption) -> Result<()> {
        if self.state.is_terminal() {
            return Err(not_active(self.state));
        }
        match option {
            TransactionOption::Timeout(ms) => {
                self.deadline = Some(Instant::now() + Duration::from_millis(ms));
            }
            other => self.options.push(other),
        }
        Ok(())
    }

    fn add_conflict_range(
        &mut self,
        begin: &[u8],
        end: &[u8],
        kind: ConflictRangeType,
    ) -> Result<()> {
        self.conflict_ranges
            .push((begin.to_vec(), end.to_vec(), kind));
        Ok(())
    }

    fn get_estimated_range_size_bytes(&self, begin: &[u8], end: &[u8]) -> Result<u64> {
        self.check_readable()?;
        if begin >= end {
            return Ok(0);
        }
        let merged = self.merged();
        let total = merged
            .range::<[u8], _>((Bound::Included(begin), Bound::Excluded(end)))
            .map(|(k, v)| (k.len() + v.len()) as u64)
            .sum();
        Ok(total)
    }

    fn get_range_split_points(
        &self,
        begin: &[u8],
        end: &[u8],
        chunk_size: u64,
    ) -> Result<Vec<Bytes>> {
        self.check_readable()?;
        let mut points = vec![begin.to_vec()];
        if chunk_size > 0 && begin < end {
            let merged = self.merged();
            let mut accumulated = 0u64;
            for (key, value) in
                merged.range::<[u8], _>((Bound::Included(begin), Bound::Excluded(end)))
            {
                accumulated += (key.len() + value.len()) as u64;
                if accumulated >= chunk_size {
                    points.push(key.clone());
                    accumulated = 0;
                }
            }
        }
        points.push(end.to_vec());
        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static_assertions::assert_impl_all!(MemoryEngine: Send, Sync);
    static_assertions::assert_impl_all!(MemoryTransaction: Send);

    #[test]
    fn read_your_writes_point_reads() {
        let engine = MemoryEngine::new();
        let mut txn = engine.create_transaction().unwrap();

        assert_eq!(txn.get(b"k").unwrap(), None);
        txn.set(b"k", b"v");
        assert_eq!(txn.get(b"k").unwrap(), Some(b"v".to_vec()));
        txn.clear(b"k");
        assert_eq!(txn.get(b"k").unwrap(), None);
    }

    #[test]
    fn commit_publishes_to_later_transactions() {
        let engine = MemoryEngine::new();
        let mut txn = engine.create_transaction().unwrap();
        txn.set(b"k", b"v");
        txn.commit().unwrap();

        let reader = engine.create_transaction().unwrap();
        assert_eq!(reader.get(b"k").unwrap(), Some(b"v".to_vec()));
        assert_eq!(engine.len(), 1);
    }

    #[test]
    fn snapshot_isolation_across_transactions() {
        let engine = MemoryEngine::new();
        let reader = engine.create_transaction().unwrap();

        let mut writer = engine.create_transaction().unwrap();
        writer.set(b"k", b"new");
        writer.commit().unwrap();

        // the reader started before the commit and must not see it
        assert_eq!(reader.get(b"k").unwrap(), None);

        // a fresh transaction does
        let fresh = engine.create_transaction().unwrap();
        assert_eq!(fresh.get(b"k").unwrap(), Some(b"new".to_vec()));
    }

    #[test]
    fn cancelled_transaction_rejects_reads_and_commit() {
        let engine = MemoryEngine::new();
        let mut txn = engine.create_transaction().unwrap();
        txn.set(b"k", b"v");
        txn.cancel();

        assert!(matches!(
            txn.get(b"k"),
            Err(Error::InvalidOperation { .. })
        ));
        assert!(matches!(txn.commit(), Err(Error::InvalidOperation { .. })));

        // writes after cancel are silently discarded
        txn.set(b"k2", b"v2");
        txn.cancel(); // idempotent

        let reader = engine.create_transaction().unwrap();
        assert_eq!(reader.get(b"k").unwrap(), None);
        assert_eq!(reader.get(b"k2").unwrap(), None);
    }

    #[test]
    fn double_commit_is_a_noop() {
        let engine = MemoryEngine::new();
        let mut txn = engine.create_transaction().unwrap();
        txn.set(b"k", b"v");
        txn.commit().unwrap();
        let version = txn.get_committed_version().unwrap();
        txn.commit().unwrap();
        assert_eq!(txn.get_committed_version().unwrap(), version);
        assert_eq!(engine.current_version(), version);
    }

    #[test]
    fn commit_then_cancel_is_a_noop() {
        let engine = MemoryEngine::new();
        let mut txn = engine.create_transaction().unwrap();
        txn.set(b"k", b"v");
        txn.commit().unwrap();
        txn.cancel();

        let reader = engine.create_transaction().unwrap();
        assert_eq!(reader.get(b"k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn versions_and_versionstamps() {
        let engine = MemoryEngine::new();
        let mut txn = engine.create_transaction().unwrap();
        assert_eq!(txn.get_read_version().unwrap(), 0);
        assert!(txn.get_committed_version().is_err());
        txn.set(b"k", b"v");
        txn.commit().unwrap();

        assert_eq!(txn.get_committed_version().unwrap(), 1);
        let stamp = txn.get_versionstamp().unwrap().unwrap();
        assert_eq!(stamp.transaction_version(), 1);

        // read-only commits get no versionstamp
        let mut reader = engine.create_transaction().unwrap();
        let _ = reader.get(b"k").unwrap();
        reader.commit().unwrap();
        assert_eq!(reader.get_versionstamp().unwrap(), None);
        assert_eq!(reader.get_committed_version().unwrap(), 1);
    }

    #[test]
    fn range_materializes_buffer_over_snapshot() {
        let engine = MemoryEngine::new();
        let mut setup = engine.create_transaction().unwrap();
        setup.set(b"a", b"old");
        setup.set(b"c", b"keep");
        setup.commit().unwrap();

        let mut txn = engine.create_transaction().unwrap();
        txn.set(b"a", b"new");
        txn.set(b"b", b"added");
        txn.clear(b"c");

        let scan = txn
            .get_range(
                KeySelector::first_greater_or_equal(b"a".to_vec()),
                KeySelector::first_greater_or_equal(b"z".to_vec()),
                RangeOptions::default(),
            )
            .unwrap();
        let pairs = scan.into_vec().unwrap();
        let keys: Vec<&[u8]> = pairs.iter().map(|kv| kv.key.as_slice()).collect();
        assert_eq!(keys, vec![&b"a"[..], b"b"]);
        assert_eq!(pairs[0].value, b"new");
    }

    #[test]
    fn range_agrees_with_point_reads() {
        let engine = MemoryEngine::new();
        let mut txn = engine.create_transaction().unwrap();
        for i in 1u8..=5 {
            txn.set(&[i], &[i * 10]);
        }
        txn.clear_range(&[2], &[4]);

        let scan = txn
            .get_range(
                KeySelector::first_greater_or_equal(vec![0]),
                KeySelector::first_greater_or_equal(vec![0xFF]),
                RangeOptions::default(),
            )
            .unwrap();
        for pair in scan.into_vec().unwrap() {
            assert_eq!(txn.get(&pair.key).unwrap(), Some(pair.value));
        }
    }

    #[test]
    fn reverse_range_with_limit() {
        let engine = MemoryEngine::new();
        let mut txn = engine.create_transaction().unwrap();
        for i in 1u8..=5 {
            txn.set(&[i], &[i * 10]);
        }
        let scan = txn
            .get_range(
                KeySelector::first_greater_or_equal(vec![1]),
                KeySelector::first_greater_or_equal(vec![6]),
                RangeOptions::default().with_limit(2).with_reverse(true),
            )
            .unwrap();
        let pairs = scan.into_vec().unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].key, vec![5]);
        assert_eq!(pairs[0].value, vec![50]);
        assert_eq!(pairs[1].key, vec![4]);
    }

    #[test]
    fn get_key_resolves_selectors() {
        let engine = MemoryEngine::new();
        let mut txn = engine.create_transaction().unwrap();
        txn.set(b"b", b"1");
        txn.set(b"d", b"2");

        assert_eq!(
            txn.get_key(&KeySelector::first_greater_or_equal(b"c".to_vec()))
                .unwrap(),
            Some(b"d".to_vec())
        );
        assert_eq!(
            txn.get_key(&KeySelector::last_less_than(b"c".to_vec()))
                .unwrap(),
            Some(b"b".to_vec())
        );
        assert_eq!(
            txn.get_key(&KeySelector::first_greater_than(b"d".to_vec()))
                .unwrap(),
            None
        );
        // before the first key resolves to no key, not the first one
        assert_eq!(
            txn.get_key(&KeySelector::last_less_than(b"b".to_vec()))
                .unwrap(),
            None
        );
        assert_eq!(
            txn.get_key(&KeySelector::last_less_or_equal(b"a".to_vec()))
                .unwrap(),
            None
        );
    }

    #[test]
    fn atomic_add_and_compare_and_clear() {
        let engine = MemoryEngine::new();
        let mut txn = engine.create_transaction().unwrap();
        txn.atomic_op(MutationType::Add, b"counter", &1u64.to_le_bytes())
            .unwrap();
        txn.atomic_op(MutationType::Add, b"counter", &2u64.to_le_bytes())
            .unwrap();
        assert_eq!(
            txn.get(b"counter").unwrap(),
            Some(3u64.to_le_bytes().to_vec())
        );

        txn.atomic_op(
            MutationType::CompareAndClear,
            b"counter",
            &3u64.to_le_bytes(),
        )
        .unwrap();
        assert_eq!(txn.get(b"counter").unwrap(), None);
    }

    #[test]
    fn versionstamped_key_is_patched_at_commit() {
        let engine = MemoryEngine::new();
        let mut txn = engine.create_transaction().unwrap();

        let mut operand = b"log/".to_vec();
        let offset = operand.len() as u32;
        operand.extend_from_slice(&[0u8; Versionstamp::LENGTH]);
        operand.extend_from_slice(&offset.to_le_bytes());
        txn.atomic_op(MutationType::SetVersionstampedKey, &operand, b"entry")
            .unwrap();
        txn.commit().unwrap();

        let stamp = txn.get_versionstamp().unwrap().unwrap();
        let mut expected_key = b"log/".to_vec();
        expected_key.extend_from_slice(stamp.as_bytes());

        let reader = engine.create_transaction().unwrap();
        assert_eq!(reader.get(&expected_key).unwrap(), Some(b"entry".to_vec()));
    }

    #[test]
    fn timeout_expires_reads_then_commit() {
        let engine = MemoryEngine::new();
        let mut txn = engine.create_transaction().unwrap();
        txn.set_option(TransactionOption::Timeout(0)).unwrap();
        std::thread::sleep(Duration::from_millis(2));

        assert_eq!(txn.get(b"k"), Err(Error::TransactionTooOld));
        let err = txn.commit().unwrap_err();
        assert_eq!(err, Error::TransactionTooOld);
        assert!(err.is_retryable());
        // the failed commit rolled the transaction back
        assert!(matches!(txn.commit(), Err(Error::InvalidOperation { .. })));
    }

    #[test]
    fn statistics_reflect_the_effective_range() {
        let engine = MemoryEngine::new();
        let mut txn = engine.create_transaction().unwrap();
        txn.set(b"a", b"xx");
        txn.set(b"b", b"yy");

        let size = txn.get_estimated_range_size_bytes(b"a", b"c").unwrap();
        assert_eq!(size, 6); // two keys of 1 + two values of 2

        let points = txn.get_range_split_points(b"a", b"c", 3).unwrap();
        assert_eq!(points.first().unwrap(), &b"a".to_vec());
        assert_eq!(points.last().unwrap(), &b"c".to_vec());
        assert!(points.len() > 2);
    }

    #[test]
    fn inert_options_and_conflict_ranges_are_recorded() {
        let engine = MemoryEngine::new();
        let mut boxed = engine.create_transaction().unwrap();
        boxed
            .set_option(TransactionOption::PriorityBatch)
            .unwrap();
        boxed
            .add_conflict_range(b"a", b"b", ConflictRangeType::Write)
            .unwrap();
        // recorded, not acted on: commit still succeeds
        boxed.commit().unwrap();
    }
}
