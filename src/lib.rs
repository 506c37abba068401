//! # KeyspanDB
//!
//! An ordered key-value transaction layer: tuple-encoded composite keys,
//! prefix subspaces, selector-addressed range scans, and write-buffered
//! transactions with snapshot reads, presented uniformly over pluggable
//! storage backends.
//!
//! # Quick start
//!
//! ```
//! use keyspan::{with_transaction, Engine, KeySelector, RangeOptions, RetryConfig, Subspace, Tuple};
//!
//! fn main() -> keyspan::Result<()> {
//!     let engine = keyspan::memory();
//!     let orders = Subspace::from_tuple(&Tuple::new().push("orders"));
//!
//!     with_transaction(&engine, &RetryConfig::new(), |txn| {
//!         txn.set(&orders.pack(&Tuple::new().push(1i64)), b"first");
//!         txn.set(&orders.pack(&Tuple::new().push(2i64)), b"second");
//!         Ok(())
//!     })?;
//!
//!     let mut txn = engine.create_transaction()?;
//!     let (begin, end) = orders.range();
//!     let pairs = txn
//!         .get_range(
//!             KeySelector::first_greater_or_equal(begin),
//!             KeySelector::first_greater_or_equal(end),
//!             RangeOptions::default(),
//!         )?
//!         .into_vec()?;
//!     assert_eq!(pairs.len(), 2);
//!     assert_eq!(orders.unpack(&pairs[0].key)?.get(0).as_int(), Some(1));
//!     Ok(())
//! }
//! ```
//!
//! # Pieces
//!
//! | Layer | Types |
//! |-------|-------|
//! | Keys | [`Tuple`], [`Element`], [`Subspace`] |
//! | Addressing | [`KeySelector`], [`RangeOptions`], [`StreamingMode`] |
//! | Transactions | [`Engine`], [`Transaction`], [`with_transaction`], [`RetryConfig`] |
//! | Backends | [`MemoryEngine`], [`SingleWriterEngine`] |
//!
//! Reads inside a transaction observe the snapshot taken at creation with
//! the transaction's own writes applied in issue order. Commit is atomic;
//! cancel discards. Errors form one stable taxonomy ([`Error`]) with a
//! single [`Error::is_retryable`] predicate feeding the retry loop.
//!
//! The internal crates (`keyspan-core`, `keyspan-tuple`, `keyspan-engine`)
//! are not meant to be depended on directly; this facade is the stable
//! surface.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub use keyspan_core::{
    compare, resolve_range, strinc, Bytes, ConflictRangeType, Error, KeySelector, KeyValue,
    MutationType, OptionValue, RangeOptions, Result, StreamingMode, TransactionOption, Versionstamp,
    WriteOp,
};
pub use keyspan_engine::{
    with_transaction, Engine, MemoryEngine, RangeScan, RetryConfig, SingleWriterEngine,
    Transaction, TransactionState, WriteBuffer,
};
pub use keyspan_tuple::{Element, Subspace, Tuple};

/// A fresh snapshot-isolated in-memory engine.
pub fn memory() -> MemoryEngine {
    MemoryEngine::new()
}

/// A fresh single-writer flush-then-query engine.
pub fn single_writer() -> SingleWriterEngine {
    SingleWriterEngine::new()
}
