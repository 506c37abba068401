//! Byte order primitives
//!
//! Keys and values are plain byte strings ordered lexicographically:
//! octet-by-octet unsigned comparison, with a prefix sorting before any
//! longer string it prefixes. Three primitives live here:
//!
//! - [`compare`]: the ordering seam, named so callers don't reach for ad-hoc
//!   slice comparisons at the few places the ordering is load-bearing
//! - [`strinc`]: the minimum byte string strictly greater than every key
//!   beginning with a given prefix
//! - [`escape_nulls`]/[`unescape_nulls`]: the self-delimiting null-escape
//!   codec the tuple layer uses for byte and string payloads

use crate::error::{Error, Result};
use std::cmp::Ordering;

/// The universal key and value type: an owned byte string.
pub type Bytes = Vec<u8>;

/// Terminator and escape marker for the null-escape codec.
const NULL_BYTE: u8 = 0x00;

/// The byte that follows an escaped null.
const ESCAPE_BYTE: u8 = 0xFF;

/// Compare two byte strings lexicographically.
///
/// The first differing octet decides the order; on a prefix relationship
/// the shorter string is less. This is exactly `[u8]`'s `Ord`, surfaced as
/// a named function so range and selector code reads as intended.
pub fn compare(lhs: &[u8], rhs: &[u8]) -> Ordering {
    lhs.cmp(rhs)
}

/// Compute the strict upper bound of all keys starting with `prefix`.
///
/// Trailing `0xFF` bytes are stripped, then the last remaining byte is
/// incremented. The result is the unique minimum byte string greater than
/// every key that begins with `prefix`.
///
/// # Errors
///
/// [`Error::CannotIncrementKey`] if the prefix is empty or consists
/// entirely of `0xFF` bytes; no upper bound exists for those.
pub fn strinc(prefix: &[u8]) -> Result<Bytes> {
    let trimmed = match prefix.iter().rposition(|&b| b != 0xFF) {
        Some(last) => &prefix[..=last],
        None => return Err(Error::CannotIncrementKey),
    };
    let mut out = trimmed.to_vec();
    // rposition guarantees a non-0xFF last byte
    *out.last_mut().expect("trimmed prefix is non-empty") += 1;
    Ok(out)
}

/// Append the null-escaped form of `src` to `buf`, followed by the `0x00`
/// terminator.
///
/// Each `0x00` in the payload becomes the pair `0x00 0xFF`, keeping the
/// encoding self-delimiting while preserving lexicographic order.
pub fn escape_nulls(src: &[u8], buf: &mut Vec<u8>) {
    for &b in src {
        buf.push(b);
        if b == NULL_BYTE {
            buf.push(ESCAPE_BYTE);
        }
    }
    buf.push(NULL_BYTE);
}

/// Decode a null-escaped payload from the front of `data`.
///
/// Consumes bytes up to and including the first unpaired `0x00` terminator,
/// unescaping `0x00 0xFF` back to `0x00`. Returns the decoded payload and
/// the total number of input bytes consumed (terminator included).
///
/// # Errors
///
/// [`Error::UnexpectedEndOfData`] if the input ends before a terminator.
pub fn unescape_nulls(data: &[u8]) -> Result<(Bytes, usize)> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < data.len() {
        let b = data[i];
        if b == NULL_BYTE {
            if data.get(i + 1) == Some(&ESCAPE_BYTE) {
                out.push(NULL_BYTE);
                i += 2;
            } else {
                return Ok((out, i + 1));
            }
        } else {
            out.push(b);
            i += 1;
        }
    }
    Err(Error::UnexpectedEndOfData { offset: data.len() })
}
