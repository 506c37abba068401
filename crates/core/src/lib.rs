//! Core types for KeyspanDB
//!
//! This crate holds the leaf types every other layer builds on:
//!
//! - Byte order primitives: lexicographic comparison, `strinc`, and the
//!   null-escape codec shared with the tuple layer
//! - The unified [`Error`] taxonomy and [`Result`] alias
//! - [`KeySelector`]: relative key addressing and its resolution algorithm
//! - [`WriteOp`], [`MutationType`], and the other write-buffer value types
//! - Transaction options and streaming-mode hints
//! - [`Versionstamp`]: the backend-assigned commit identifier
//!
//! Nothing in this crate touches storage. All types are value-semantic and
//! cheap to clone; keys and values are plain byte strings ([`Bytes`]).

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bytes;
pub mod error;
pub mod ops;
pub mod options;
pub mod selector;
pub mod version;

pub use bytes::{compare, escape_nulls, strinc, unescape_nulls, Bytes};
pub use error::{Error, Result};
pub use ops::{ConflictRangeType, KeyValue, MutationType, WriteOp};
pub use options::{OptionValue, RangeOptions, StreamingMode, TransactionOption};
pub use selector::{resolve_range, KeySelector};
pub use version::Versionstamp;
