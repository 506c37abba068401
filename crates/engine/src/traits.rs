//! The backend contract
//!
//! Backends expose exactly two trait objects: an [`Engine`] that admits
//! transactions and the [`Transaction`] those admissions return. Everything
//! upstream — retry loop, layers, callers — speaks only these traits, so a
//! physical store is swappable without touching user code.
//!
//! Methods a backend cannot honor default to inert values (zero, empty,
//! no-op) rather than errors; the default bodies here encode that rule.

use crate::range::RangeScan;
use keyspan_core::{
    Bytes, ConflictRangeType, Error, KeySelector, MutationType, RangeOptions, Result,
    TransactionOption, Versionstamp,
};

/// Lifecycle states of a transaction.
///
/// `Active` is the only state that accepts work. The other three are
/// terminal and absorbing: once entered, writes are silently discarded,
/// reads and commit fail, and cancel is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Accepting reads and writes.
    Active,
    /// Commit succeeded.
    Committed,
    /// Cancelled by the caller.
    Cancelled,
    /// Commit was attempted and failed; effects were rolled back.
    RolledBack,
}

impl TransactionState {
    /// Whether the transaction has finished, successfully or not.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionState::Active)
    }

    /// Short name for error messages.
    pub fn describe(&self) -> &'static str {
        match self {
            TransactionState::Active => "active",
            TransactionState::Committed => "committed",
            TransactionState::Cancelled => "cancelled",
            TransactionState::RolledBack => "rolled back",
        }
    }
}

/// A storage backend able to admit transactions.
pub trait Engine: Send + Sync {
    /// Begin a transaction.
    ///
    /// On single-writer backends this blocks until the previous
    /// transaction reaches a terminal state.
    fn create_transaction(&self) -> Result<Box<dyn Transaction>>;
}

/// One transaction against a backend.
///
/// A transaction is single-threaded from the caller's perspective;
/// concurrent calls on the same object are unsupported. Reads consult the
/// write buffer first (read-your-writes) and then the transaction's
/// snapshot of the store. Writes never fail: after a terminal state they
/// are silently discarded.
pub trait Transaction: Send {
    /// Read the value stored under `key`, as visible to this transaction.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidOperation`] once the transaction is terminal;
    /// [`Error::TransactionTooOld`] past a configured timeout.
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>>;

    /// Resolve a selector to a concrete key, or `None` when it lands
    /// before the first or past the last key.
    fn get_key(&mut self, selector: &KeySelector) -> Result<Option<Bytes>>;

    /// Scan the range between two selectors.
    ///
    /// The scan is a finite, single-use sequence in the requested
    /// direction, truncated to `options.limit` after direction is applied.
    fn get_range(
        &mut self,
        begin: KeySelector,
        end: KeySelector,
        options: RangeOptions,
    ) -> Result<RangeScan>;

    /// Buffer a write of `value` under `key`.
    fn set(&mut self, key: &[u8], value: &[u8]);

    /// Buffer removal of `key`.
    fn clear(&mut self, key: &[u8]);

    /// Buffer removal of every key in `[begin, end)`.
    fn clear_range(&mut self, begin: &[u8], end: &[u8]);

    /// Apply an atomic mutation to `key` with operand `param`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidOperation`] for a malformed operand or a mutation
    /// the backend rejects.
    fn atomic_op(&mut self, mutation: MutationType, key: &[u8], param: &[u8]) -> Result<()>;

    /// Commit the buffered operations atomically.
    ///
    /// A second commit is a no-op. Committing a cancelled or rolled-back
    /// transaction fails with [`Error::InvalidOperation`]. If the flush
    /// fails the transaction rolls back, releases its resources, and the
    /// error propagates.
    fn commit(&mut self) -> Result<()>;

    /// Discard the transaction. Idempotent; a no-op after commit; never
    /// fails.
    fn cancel(&mut self);

    /// Request reads as of `version`. Backends keeping no version history
    /// record the request without effect.
    fn set_read_version(&mut self, version: u64);

    /// The version this transaction reads at.
    fn get_read_version(&self) -> Result<u64>;

    /// The version assigned by a successful commit.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidOperation`] before a successful commit.
    fn get_committed_version(&self) -> Result<u64>;

    /// The versionstamp assigned by a successful commit, or `None` on
    /// backends without the concept.
    fn get_versionstamp(&self) -> Result<Option<Versionstamp>> {
        Ok(None)
    }

    /// Apply a transaction option.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidOperation`] for options the backend rejects.
    fn set_option(&mut self, option: TransactionOption) -> Result<()>;

    /// Manually extend conflict detection over `[begin, end)`.
    ///
    /// Backends without conflict detection record the range and nothing
    /// more.
    fn add_conflict_range(
        &mut self,
        begin: &[u8],
        end: &[u8],
        kind: ConflictRangeType,
    ) -> Result<()> {
        let _ = (begin, end, kind);
        Ok(())
    }

    /// Estimated byte size of `[begin, end)`; zero where unsupported.
    fn get_estimated_range_size_bytes(&self, begin: &[u8], end: &[u8]) -> Result<u64> {
        let _ = (begin, end);
        Ok(0)
    }

    /// Keys splitting `[begin, end)` into chunks of roughly `chunk_size`
    /// bytes, boundaries included; just the boundaries where unsupported.
    fn get_range_split_points(
        &self,
        begin: &[u8],
        end: &[u8],
        chunk_size: u64,
    ) -> Result<Vec<Bytes>> {
        let _ = chunk_size;
        Ok(vec![begin.to_vec(), end.to_vec()])
    }
}

/// The error used everywhere a terminal-state transaction rejects work.
pub(crate) fn not_active(state: TransactionState) -> Error {
    Error::invalid_operation(format!("transaction is {}", state.describe()))
}
