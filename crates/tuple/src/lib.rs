//! Order-preserving tuple codec
//!
//! This crate serializes heterogeneous typed keys into byte strings whose
//! lexicographic order matches the element-wise order of the original
//! tuples, enabling composite keys and efficient range scans over them.
//!
//! # Wire format
//!
//! Each element is a single type-code byte followed by a type-specific
//! payload:
//!
//! | Code | Type | Payload |
//! |------|------|---------|
//! | `0x00` | Null | none |
//! | `0x01` | Bytes | null-escaped, `0x00` terminated |
//! | `0x02` | String | UTF-8, null-escaped, `0x00` terminated |
//! | `0x05` | Nested tuple | child encodings, null-escaped as a whole, `0x00` terminated |
//! | `0x0C`–`0x13` | Negative int | `0x14 - code` big-endian bytes |
//! | `0x14` | Integer zero | none |
//! | `0x15`–`0x1C` | Positive int | `code - 0x14` big-endian bytes |
//! | `0x20` | Float32 | 4 bytes, sign-transformed |
//! | `0x21` | Float64 | 8 bytes, sign-transformed |
//! | `0x26` / `0x27` | False / True | none |
//! | `0x30` | UUID | 16 bytes canonical order |
//!
//! Integers use a variable-length scheme pivoting on `0x14` so that all of
//! `i64` sorts numerically. Floats flip the sign bit (positive) or every
//! bit (negative) so byte order matches numeric order with
//! `-inf < -0.0 < +0.0 < +inf` and NaNs at the extremes by bit pattern.
//!
//! A nested tuple's payload is the concatenated encodings of its children
//! with every `0x00` byte escaped to `0x00 0xFF`, closed by one unescaped
//! `0x00`. Decoding un-escapes into a scratch buffer up to that terminator
//! and recursively unpacks the buffer; no nesting-depth bookkeeping exists
//! anywhere in the decoder.
//!
//! # Example
//!
//! ```
//! use keyspan_tuple::Tuple;
//!
//! let t1 = Tuple::new().push("orders").push(41i64);
//! let t2 = Tuple::new().push("orders").push(42i64);
//!
//! assert!(t1.pack() < t2.pack());
//! assert_eq!(Tuple::unpack(&t1.pack()).unwrap(), t1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod decode;
mod element;
mod encode;
pub mod subspace;
mod tuple;

pub use element::Element;
pub use subspace::Subspace;
pub use tuple::Tuple;

/// Null type code.
pub(crate) const NULL_CODE: u8 = 0x00;
/// Byte-string type code.
pub(crate) const BYTES_CODE: u8 = 0x01;
/// UTF-8 string type code.
pub(crate) const STRING_CODE: u8 = 0x02;
/// Nested-tuple type code.
pub(crate) const NESTED_CODE: u8 = 0x05;
/// Integer-zero type code; pivot for the variable-length integer scheme.
pub(crate) const INT_ZERO_CODE: u8 = 0x14;
/// 32-bit float type code.
pub(crate) const FLOAT_CODE: u8 = 0x20;
/// 64-bit float type code.
pub(crate) const DOUBLE_CODE: u8 = 0x21;
/// Boolean false type code.
pub(crate) const FALSE_CODE: u8 = 0x26;
/// Boolean true type code.
pub(crate) const TRUE_CODE: u8 = 0x27;
/// UUID type code.
pub(crate) const UUID_CODE: u8 = 0x30;
