//! Range scan results
//!
//! A [`RangeScan`] is the value every `get_range` returns: a finite,
//! single-use, ordered sequence of key-value pairs. Backends that fetch in
//! batches under the hood stay hidden behind the iterator; the first error
//! a batch produces surfaces through `next()` and ends the scan.

use keyspan_core::{KeyValue, Result};
use std::fmt;

/// A finite, single-use sequence of key-value pairs in scan order.
pub struct RangeScan {
    inner: Box<dyn Iterator<Item = Result<KeyValue>> + Send>,
    done: bool,
}

impl RangeScan {
    /// Wrap a backend iterator.
    pub(crate) fn new(inner: Box<dyn Iterator<Item = Result<KeyValue>> + Send>) -> Self {
        RangeScan { inner, done: false }
    }

    /// A scan over an already materialized pair list.
    pub fn from_pairs(pairs: Vec<KeyValue>) -> Self {
        RangeScan::new(Box::new(pairs.into_iter().map(Ok)))
    }

    /// Drain the scan into a vector, stopping at the first error.
    pub fn into_vec(self) -> Result<Vec<KeyValue>> {
        self.collect()
    }
}

impl Iterator for RangeScan {
    type Item = Result<KeyValue>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.inner.next() {
            Some(Err(err)) => {
                // an error is terminal for the scan
                self.done = true;
                Some(Err(err))
            }
            Some(Ok(pair)) => Some(Ok(pair)),
            None => {
                self.done = true;
                None
            }
        }
    }
}

impl fmt::Debug for RangeScan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RangeScan").field("done", &self.done).finish()
    }
}
