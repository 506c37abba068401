//! Transaction options and range-read hints
//!
//! Options arrive either as typed [`TransactionOption`] values or as a
//! numeric code plus an [`OptionValue`], the form wire protocols speak.
//! The recognized set is closed; unknown codes are rejected rather than
//! silently ignored.
//!
//! [`StreamingMode`] values are hints only. Backends may ignore them.

use crate::bytes::Bytes;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// An untyped option argument as carried on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptionValue {
    /// No argument.
    None,
    /// A byte-string argument.
    Bytes(Bytes),
    /// An integer argument.
    Int(i64),
    /// A string argument.
    String(String),
}

/// The recognized transaction options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionOption {
    /// Abort reads after the given number of milliseconds with a retryable
    /// error.
    Timeout(u64),
    /// Deprioritize this transaction behind interactive work.
    PriorityBatch,
    /// Run ahead of all other priorities.
    PrioritySystemImmediate,
    /// Lower read priority.
    ReadPriorityLow,
    /// Raise read priority.
    ReadPriorityHigh,
    /// Allow reads and writes under the system key prefix.
    AccessSystemKeys,
    /// Bypass any server-side read cache.
    ReadServerSideCacheDisable,
}

impl TransactionOption {
    /// Decode an option from its numeric code and wire argument.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidOperation`] for an unknown code or an argument of
    /// the wrong shape for the code.
    pub fn from_code(code: i32, value: OptionValue) -> Result<Self> {
        match (code, value) {
            (500, OptionValue::Int(ms)) if ms >= 0 => Ok(TransactionOption::Timeout(ms as u64)),
            (500, _) => Err(Error::invalid_operation(
                "timeout option requires a non-negative integer argument",
            )),
            (200, OptionValue::None) => Ok(TransactionOption::PriorityBatch),
            (300, OptionValue::None) => Ok(TransactionOption::PrioritySystemImmediate),
            (301, OptionValue::None) => Ok(TransactionOption::AccessSystemKeys),
            (507, OptionValue::None) => Ok(TransactionOption::ReadServerSideCacheDisable),
            (510, OptionValue::None) => Ok(TransactionOption::ReadPriorityLow),
            (512, OptionValue::None) => Ok(TransactionOption::ReadPriorityHigh),
            (200 | 300 | 301 | 507 | 510 | 512, _) => Err(Error::invalid_operation(
                "option takes no argument",
            )),
            (other, _) => Err(Error::invalid_operation(format!(
                "unknown transaction option code {other}"
            ))),
        }
    }

    /// The option's stable name.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionOption::Timeout(_) => "timeout",
            TransactionOption::PriorityBatch => "priority_batch",
            TransactionOption::PrioritySystemImmediate => "priority_system_immediate",
            TransactionOption::ReadPriorityLow => "read_priority_low",
            TransactionOption::ReadPriorityHigh => "read_priority_high",
            TransactionOption::AccessSystemKeys => "access_system_keys",
            TransactionOption::ReadServerSideCacheDisable => "read_server_side_cache_disable",
        }
    }
}

/// How the caller intends to consume a range read. Hints only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i8)]
pub enum StreamingMode {
    /// The caller wants the entire range as fast as possible.
    WantAll = -2,
    /// The caller iterates lazily and may stop early.
    Iterator = -1,
    /// The caller knows exactly how many rows it wants.
    Exact = 0,
    /// Small batches.
    Small = 1,
    /// Medium batches.
    Medium = 2,
    /// Large batches.
    Large = 3,
    /// One row at a time.
    Serial = 4,
}

impl StreamingMode {
    /// Decode a streaming mode from its numeric code.
    pub fn from_code(code: i8) -> Option<Self> {
        match code {
            -2 => Some(StreamingMode::WantAll),
            -1 => Some(StreamingMode::Iterator),
            0 => Some(StreamingMode::Exact),
            1 => Some(StreamingMode::Small),
            2 => Some(StreamingMode::Medium),
            3 => Some(StreamingMode::Large),
            4 => Some(StreamingMode::Serial),
            _ => None,
        }
    }
}

/// Options applied to a single range read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeOptions {
    /// Maximum number of pairs to emit; `0` means unlimited. Applied after
    /// direction.
    pub limit: usize,
    /// Emit pairs in descending key order.
    pub reverse: bool,
    /// Batching hint.
    pub mode: StreamingMode,
}

impl Default for RangeOptions {
    fn default() -> Self {
        RangeOptions {
            limit: 0,
            reverse: false,
            mode: StreamingMode::Iterator,
        }
    }
}

impl RangeOptions {
    /// Set the limit.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Set the direction.
    pub fn with_reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    /// Set the batching hint.
    pub fn with_mode(mut self, mode: StreamingMode) -> Self {
        self.mode = mode;
        self
    }
}
