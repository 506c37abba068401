//! The single-writer flush-then-query backend
//!
//! [`SingleWriterEngine`] models an underlying store that tolerates one
//! open transaction at a time: transaction creation blocks until the
//! previous transaction reaches a terminal state. The serialization
//! permit is released inside commit and cancel, and lives in the
//! transaction object between the two, so it survives handoff wherever
//! the transaction travels.
//!
//! Ranges are realized by flush-then-query: buffered ops are persisted to
//! the store inside the transaction (undo-logged so cancel can roll them
//! back), then a native bounded scan runs against the store. After a
//! flush the buffer is empty and subsequent writes start a fresh segment.
//! Scans fetch in fixed-size batches behind the iterator.
//!
//! The store answers boundary comparisons, not key listings, so only the
//! four canonical selector forms resolve exactly; other offsets degrade
//! to a `key >= anchor` bound.

use crate::atomic::apply_mutation;
use crate::buffer::{Override, WriteBuffer};
use crate::range::RangeScan;
use crate::traits::{not_active, Engine, Transaction, TransactionState};
use keyspan_core::{
    Bytes, Error, KeySelector, KeyValue, MutationType, RangeOptions, Result, TransactionOption,
    WriteOp,
};
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::{BTreeMap, VecDeque};
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Rows fetched from the store per batch during a scan.
const SCAN_BATCH_SIZE: usize = 128;

/// Admission control: one transaction holds the permit at a time.
#[derive(Debug, Default)]
struct WritePermit {
    busy: Mutex<bool>,
    released: Condvar,
}

impl WritePermit {
    /// Block until the permit is free, then take it.
    fn acquire(&self) {
        let mut busy = self.busy.lock();
        while *busy {
            self.released.wait(&mut busy);
        }
        *busy = true;
    }

    /// Give the permit back and wake one waiter.
    fn release(&self) {
        let mut busy = self.busy.lock();
        *busy = false;
        self.released.notify_one();
    }
}

/// The store and its admission state.
#[derive(Debug, Default)]
struct StoreShared {
    cells: RwLock<BTreeMap<Bytes, Bytes>>,
    commits: AtomicU64,
    permit: WritePermit,
}

/// A single-writer storage backend with flush-then-query ranges.
///
/// Cloning the engine clones a handle to the same store.
#[derive(Debug, Clone, Default)]
pub struct SingleWriterEngine {
    shared: Arc<StoreShared>,
}

impl SingleWriterEngine {
    /// Create an empty engine.
    pub fn new() -> Self {
        SingleWriterEngine::default()
    }

    /// Number of keys currently in the store.
    pub fn len(&self) -> usize {
        self.shared.cells.read().len()
    }

    /// Whether the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Engine for SingleWriterEngine {
    /// Blocks until the previous transaction reaches a terminal state.
    fn create_transaction(&self) -> Result<Box<dyn Transaction>> {
        self.shared.permit.acquire();
        let read_version = self.shared.commits.load(Ordering::Acquire);
        trace!(read_version, "single-writer transaction admitted");
        Ok(Box::new(SingleWriterTransaction {
            shared: Arc::clone(&self.shared),
            holds_permit: true,
            buffer: WriteBuffer::new(),
            undo: Vec::new(),
            state: TransactionState::Active,
            read_version,
            committed_version: None,
            deadline: None,
            options: Vec::new(),
        }))
    }
}

/// Restores one flushed write on rollback.
#[derive(Debug)]
struct UndoRecord {
    key: Bytes,
    prior: Option<Bytes>,
}

/// A transaction holding the exclusive handle of a [`SingleWriterEngine`].
pub struct SingleWriterTransaction {
    shared: Arc<StoreShared>,
    holds_permit: bool,
    buffer: WriteBuffer,
    undo: Vec<UndoRecord>,
    state: TransactionState,
    read_version: u64,
    committed_version: Option<u64>,
    deadline: Option<Instant>,
    options: Vec<TransactionOption>,
}

impl SingleWriterTransaction {
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

    /// The value of `key` under this transaction's view: the unflushed
    /// buffer first, then the store (which already holds flushed ops).
    fn read_effective(&self, key: &[u8]) -> Option<Bytes> {
        match self.buffer.lookup(key) {
            Some(Override::Value(value)) => Some(value),
            Some(Override::Cleared) => None,
            None => self.shared.cells.read().get(key).cloned(),
        }
    }

    /// Persist the buffered ops to the store, recording undo entries.
    fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let ops = self.buffer.drain_ops();
        let count = ops.len();
        let mut cells = self.shared.cells.write();
        for op in ops {
            match op {
                WriteOp::Set { key, value } => {
                    let prior = cells.insert(key.clone(), value);
                    self.undo.push(UndoRecord { key, prior });
                }
                WriteOp::Clear { key } => {
                    if let Some(prior) = cells.remove(&key) {
                        self.undo.push(UndoRecord {
                            key,
                            prior: Some(prior),
                        });
                    }
                }
                WriteOp::ClearRange { begin, end } => {
                    if begin >= end {
                        continue;
                    }
                    let doomed: Vec<Bytes> = cells
                        .range::<[u8], _>((
                            Bound::Included(begin.as_slice()),
                            Bound::Excluded(end.as_slice()),
                        ))
                        .map(|(k, _)| k.clone())
                        .collect();
                    for key in doomed {
                        let prior = cells.remove(&key);
                        self.undo.push(UndoRecord { key, prior });
                    }
                }
            }
        }
        trace!(ops = count, "flushed buffer into store");
    }

    /// Undo every flushed write, newest first.
    fn rollback_flushed(&mut self) {
        if self.undo.is_empty() {
            return;
        }
        let mut cells = self.shared.cells.write();
        for record in self.undo.drain(..).rev() {
            match record.prior {
                Some(value) => {
                    cells.insert(record.key, value);
                }
                None => {
                    cells.remove(&record.key);
                }
            }
        }
    }

    fn release_permit(&mut self) {
        if self.holds_permit {
            self.holds_permit = false;
            self.shared.permit.release();
        }
    }

    /// Inert options recorded on this transaction.
    pub fn recorded_options(&self) -> &[TransactionOption] {
        &self.options
    }
}

impl Transaction for SingleWriterTransaction {
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>> {
        self.check_readable()?;
        Ok(self.read_effective(key))
    }

    fn get_key(&mut self, selector: &KeySelector) -> Result<Option<Bytes>> {
        self.check_readable()?;
        self.flush();
        let cells = self.shared.cells.read();
        let anchor = selector.key.as_slice();
        let found = match (selector.or_equal, selector.offset) {
            // first key >= anchor
            (false, 1) => cells
                .range::<[u8], _>((Bound::Included(anchor), Bound::Unbounded))
                .next(),
            // first key > anchor
            (true, 1) => cells
                .range::<[u8], _>((Bound::Excluded(anchor), Bound::Unbounded))
                .next(),
            // last key <= anchor
            (true, 0) => cells
                .range::<[u8], _>((Bound::Unbounded, Bound::Included(anchor)))
                .next_back(),
            // last key < anchor
            (false, 0) => cells
                .range::<[u8], _>((Bound::Unbounded, Bound::Excluded(anchor)))
                .next_back(),
            _ => {
                warn!(
                    or_equal = selector.or_equal,
                    offset = selector.offset,
                    "non-canonical selector degraded to first key >= anchor"
                );
                cells
                    .range::<[u8], _>((Bound::Included(anchor), Bound::Unbounded))
                    .next()
            }
        };
        Ok(found.map(|(key, _)| key.clone()))
    }

    fn get_range(
        &mut self,
        begin: KeySelector,
        end: KeySelector,
        options: RangeOptions,
    ) -> Result<RangeScan> {
        self.check_readable()?;
        self.flush();
        let lower = begin_bound(&begin);
        let upper = end_bound(&end);
        Ok(RangeScan::new(Box::new(BatchedScan {
            shared: Arc::clone(&self.shared),
            lower,
            upper,
            reverse: options.reverse,
            remaining: (options.limit > 0).then_some(options.limit),
            batch: VecDeque::new(),
            exhausted: false,
        })))
    }

    fn set(&mut self, key: &[u8], value: &[u8]) {
        if self.state.is_terminal() {
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
        if mutation.is_versionstamped() {
            // the store assigns no versionstamps, so there is nothing to
            // substitute at commit
            return Err(Error::invalid_operation(
                "versionstamped mutations are not supported by this backend",
            ));
        }
        let existing = self.read_effective(key);
        match apply_mutation(mutation, existing.as_deref(), param) {
            Some(value) => self.buffer.set(key.to_vec(), value),
            None => self.buffer.clear(key.to_vec()),
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
                self.rollback_flushed();
                self.state = TransactionState::RolledBack;
                self.release_permit();
                return Err(Error::TransactionTooOld);
            }
        }

        self.flush();
        let version = if self.undo.is_empty() {
            // read-only transaction: the store never changed
            self.shared.commits.load(Ordering::Acquire)
        } else {
            self.shared.commits.fetch_add(1, Ordering::AcqRel) + 1
        };
        self.undo.clear();
        self.committed_version = Some(version);
        self.state = TransactionState::Committed;
        self.release_permit();
        debug!(version, "single-writer transaction committed");
        Ok(())
    }

    fn cancel(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.buffer.discard();
        self.rollback_flushed();
        self.state = TransactionState::Cancelled;
        self.release_permit();
        debug!("single-writer transaction cancelled");
    }

    fn set_read_version(&mut self, version: u64) {
        // the store keeps no version history; recorded without effect
        trace!(requested = version, "set_read_version on single-writer backend");
    }

    fn get_read_version(&self) -> Result<u64> {
        self.check_readable()?;
        Ok(self.read_version)
    }

    fn get_committed_version(&self) -> Result<u64> {
        self.committed_version
            .ok_or_else(|| Error::invalid_operation("transaction has not committed"))
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
}

impl Drop for SingleWriterTransaction {
    fn drop(&mut self) {
        if !self.state.is_terminal() {
            // an abandoned transaction must not leave flushed writes
            // behind or strand the permit
            self.rollback_flushed();
            self.release_permit();
        }
    }
}

/// Translate a begin selector into a store bound; non-canonical forms
/// degrade to `key >= anchor`.
fn begin_bound(selector: &KeySelector) -> Bound<Bytes> {
    match (selector.or_equal, selector.offset) {
        (true, 1) => Bound::Excluded(selector.key.clone()),
        (false, 1) => Bound::Included(selector.key.clone()),
        _ => Bound::Included(selector.key.clone()),
    }
}

/// Translate an end selector into a store bound; non-canonical forms
/// degrade to stopping at `key >= anchor`.
fn end_bound(selector: &KeySelector) -> Bound<Bytes> {
    match (selector.or_equal, selector.offset) {
        (true, 1) => Bound::Included(selector.key.clone()),
        (false, 1) => Bound::Excluded(selector.key.clone()),
        _ => Bound::Excluded(selector.key.clone()),
    }
}

/// Whether `BTreeMap::range` accepts this bound pair.
fn range_is_legal(lower: &Bound<Bytes>, upper: &Bound<Bytes>) -> bool {
    match (lower, upper) {
        (Bound::Excluded(a), Bound::Excluded(b)) => a < b,
        (Bound::Included(a) | Bound::Excluded(a), Bound::Included(b) | Bound::Excluded(b)) => {
            a <= b
        }
        _ => true,
    }
}

fn as_slice_bound(bound: &Bound<Bytes>) -> Bound<&[u8]> {
    match bound {
        Bound::Included(key) => Bound::Included(key.as_slice()),
        Bound::Excluded(key) => Bound::Excluded(key.as_slice()),
        Bound::Unbounded => Bound::Unbounded,
    }
}

/// Lazy store scan fetching [`SCAN_BATCH_SIZE`] rows at a time; the
/// cursor bound advances past the last row of each batch.
struct BatchedScan {
    shared: Arc<StoreShared>,
    lower: Bound<Bytes>,
    upper: Bound<Bytes>,
    reverse: bool,
    remaining: Option<usize>,
    batch: VecDeque<KeyValue>,
    exhausted: bool,
}

impl BatchedScan {
    fn fill(&mut self) {
        if !range_is_legal(&self.lower, &self.upper) {
            self.exhausted = true;
            return;
        }
        let cells = self.shared.cells.read();
        let bounds = (as_slice_bound(&self.lower), as_slice_bound(&self.upper));
        if self.reverse {
            for (key, value) in cells.range::<[u8], _>(bounds).rev().take(SCAN_BATCH_SIZE) {
                self.batch.push_back(KeyValue::new(key.clone(), value.clone()));
            }
            if let Some(last) = self.batch.back() {
                self.upper = Bound::Excluded(last.key.clone());
            }
        } else {
            for (key, value) in cells.range::<[u8], _>(bounds).take(SCAN_BATCH_SIZE) {
                self.batch.push_back(KeyValue::new(key.clone(), value.clone()));
            }
            if let Some(last) = self.batch.back() {
                self.lower = Bound::Excluded(last.key.clone());
            }
        }
        if self.batch.len() < SCAN_BATCH_SIZE {
            self.exhausted = true;
        }
    }
}

impl Iterator for BatchedScan {
    type Item = Result<KeyValue>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == Some(0) {
            return None;
        }
        if self.batch.is_empty() {
            if self.exhausted {
                return None;
            }
            self.fill();
        }
        let pair = self.batch.pop_front()?;
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= 1;
        }
        Some(Ok(pair))
    }
}
