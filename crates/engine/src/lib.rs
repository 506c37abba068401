//! Transaction engine for KeyspanDB
//!
//! This crate provides the write-buffered transaction model over pluggable
//! storage backends:
//!
//! - [`Engine`] / [`Transaction`]: the object-safe backend contract
//! - [`WriteBuffer`]: the ordered operation log giving read-your-writes
//! - [`MemoryEngine`]: snapshot-based backend realizing ranges by
//!   materialize-and-merge
//! - [`SingleWriterEngine`]: exclusive-handle backend realizing ranges by
//!   flush-then-query
//! - [`with_transaction`]: the bounded retry loop
//!
//! A transaction sees the snapshot taken at its creation with its own
//! buffered operations applied in issue order, commits atomically, and
//! lands in exactly one terminal state. Both backends present identical
//! observable behavior through the trait; they differ only in how ranges
//! are realized and how concurrent transactions are admitted.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod atomic;
mod buffer;
mod memory;
mod range;
mod retry;
mod single_writer;
mod traits;

pub use buffer::{Override, WriteBuffer};
pub use memory::{MemoryEngine, MemoryTransaction};
pub use range::RangeScan;
pub use retry::{with_transaction, RetryConfig};
pub use single_writer::{SingleWriterEngine, SingleWriterTransaction};
pub use traits::{Engine, Transaction, TransactionState};
