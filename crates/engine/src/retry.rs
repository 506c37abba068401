//! The transaction retry loop
//!
//! [`with_transaction`] runs a closure inside a fresh transaction, commits
//! on success, and retries the whole closure when the failure is
//! retryable (conflict or expiry). The loop is iterative with bounded
//! attempts and exponential backoff between them.
//!
//! The closure may run more than once; callers must keep it idempotent.

use crate::traits::{Engine, Transaction};
use keyspan_core::{Error, Result};
use std::time::Duration;
use tracing::{debug, warn};

/// Retry behavior for [`with_transaction`].
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts before giving up with
    /// [`Error::TransactionTooOld`](keyspan_core::Error::TransactionTooOld).
    pub max_attempts: usize,
    /// Base backoff delay in milliseconds, doubled each attempt.
    pub base_delay_ms: u64,
    /// Ceiling for the backoff delay in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_attempts: 100,
            base_delay_ms: 1,
            max_delay_ms: 100,
        }
    }
}

impl RetryConfig {
    /// Default configuration.
    pub fn new() -> Self {
        RetryConfig::default()
    }

    /// A single attempt, no retries.
    pub fn no_retry() -> Self {
        RetryConfig {
            max_attempts: 1,
            ..RetryConfig::default()
        }
    }

    /// Set the attempt bound.
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the base backoff delay.
    pub fn with_base_delay_ms(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    /// Set the backoff ceiling.
    pub fn with_max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }

    /// Backoff before the attempt after `attempt` (zero-based),
    /// exponential and capped.
    fn calculate_delay(&self, attempt: usize) -> Duration {
        let shift = attempt.min(63) as u32;
        let multiplier = 1u64.checked_shl(shift).unwrap_or(u64::MAX);
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier);
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }
}

/// Run `op` inside a transaction, committing on success and retrying on
/// retryable failures.
///
/// Each attempt creates a fresh transaction, runs `op`, and commits. A
/// retryable error from `op` or from the commit cancels the transaction
/// and starts the next attempt after a backoff. Any other error cancels
/// the transaction and propagates. Exhausting the attempts yields
/// [`Error::TransactionTooOld`].
///
/// Exactly-once execution of `op` is not guaranteed.
pub fn with_transaction<T, F>(engine: &dyn Engine, config: &RetryConfig, mut op: F) -> Result<T>
where
    F: FnMut(&mut dyn Transaction) -> Result<T>,
{
    for attempt in 0..config.max_attempts {
        let mut txn = engine.create_transaction()?;
        match op(txn.as_mut()) {
            Ok(value) => match txn.commit() {
                Ok(()) => return Ok(value),
                Err(err) if err.is_retryable() => {
                    txn.cancel();
                    debug!(attempt, %err, "commit failed, retrying");
                }
                Err(err) => {
                    txn.cancel();
                    return Err(err);
                }
            },
            Err(err) if err.is_retryable() => {
                txn.cancel();
                debug!(attempt, %err, "operation failed, retrying");
            }
            Err(err) => {
                txn.cancel();
                return Err(err);
            }
        }
        if attempt + 1 < config.max_attempts {
            std::thread::sleep(config.calculate_delay(attempt));
        }
    }
    warn!(attempts = config.max_attempts, "retry budget exhausted");
    Err(Error::TransactionTooOld)
}
