//! Element decoders
//!
//! Decoding is a single forward pass: read the type-code byte, dispatch to
//! the payload decoder, advance the cursor, repeat while bytes remain.
//! Nested tuples are handled by un-escaping the payload into a scratch
//! buffer and recursing on it, so an inner `0x05` byte is just data and
//! never confuses the framing.

use crate::element::Element;
use crate::tuple::Tuple;
use crate::{
    BYTES_CODE, DOUBLE_CODE, FALSE_CODE, FLOAT_CODE, INT_ZERO_CODE, NESTED_CODE, NULL_CODE,
    STRING_CODE, TRUE_CODE, UUID_CODE,
};
use keyspan_core::bytes::unescape_nulls;
use keyspan_core::{Error, Result};
use uuid::Uuid;

/// Lowest negative-integer type code (8-byte magnitude).
const NEG_INT_MIN_CODE: u8 = 0x0C;
/// Highest positive-integer type code (8-byte magnitude).
const POS_INT_MAX_CODE: u8 = 0x1C;

/// Decode every element in `data`.
pub(crate) fn decode_all(data: &[u8]) -> Result<Vec<Element>> {
    let mut elements = Vec::new();
    let mut offset = 0;
    while offset < data.len() {
        let (element, consumed) = decode_element(data, offset)?;
        elements.push(element);
        offset += consumed;
    }
    Ok(elements)
}

/// Decode one element starting at `offset`; returns the element and the
/// total bytes consumed including the type code.
pub(crate) fn decode_element(data: &[u8], offset: usize) -> Result<(Element, usize)> {
    let code = *data
        .get(offset)
        .ok_or(Error::UnexpectedEndOfData { offset })?;
    match code {
        NULL_CODE => Ok((Element::Null, 1)),
        BYTES_CODE => {
            let (payload, consumed) = unescape_nulls(&data[offset + 1..])?;
            Ok((Element::Bytes(payload), consumed + 1))
        }
        STRING_CODE => {
            let (payload, consumed) = unescape_nulls(&data[offset + 1..])?;
            let s = String::from_utf8(payload).map_err(|_| Error::InvalidUtf8 { offset })?;
            Ok((Element::String(s), consumed + 1))
        }
        NESTED_CODE => {
            let (inner, consumed) = unescape_nulls(&data[offset + 1..])?;
            let children = decode_all(&inner)?;
            Ok((Element::Tuple(Tuple::from_elements(children)), consumed + 1))
        }
        FALSE_CODE => Ok((Element::Bool(false), 1)),
        TRUE_CODE => Ok((Element::Bool(true), 1)),
        FLOAT_CODE => {
            let payload = fixed_payload::<4>(data, offset)?;
            Ok((Element::Float(decode_f32(payload)), 5))
        }
        DOUBLE_CODE => {
            let payload = fixed_payload::<8>(data, offset)?;
            Ok((Element::Double(decode_f64(payload)), 9))
        }
        UUID_CODE => {
            let payload = fixed_payload::<16>(data, offset)?;
            Ok((Element::Uuid(Uuid::from_bytes(payload)), 17))
        }
        NEG_INT_MIN_CODE..=POS_INT_MAX_CODE => decode_int(data, offset, code),
        _ => Err(Error::InvalidTypeCode { code, offset }),
    }
}

/// Read a fixed-width payload following the type code at `offset`.
fn fixed_payload<const N: usize>(data: &[u8], offset: usize) -> Result<[u8; N]> {
    let start = offset + 1;
    let payload = data
        .get(start..start + N)
        .ok_or(Error::UnexpectedEndOfData { offset })?;
    let mut out = [0u8; N];
    out.copy_from_slice(payload);
    Ok(out)
}

/// Decode a variable-length integer whose type code is `code`.
fn decode_int(data: &[u8], offset: usize, code: u8) -> Result<(Element, usize)> {
    if code == INT_ZERO_CODE {
        return Ok((Element::Int(0), 1));
    }

    let (size, negative) = if code > INT_ZERO_CODE {
        ((code - INT_ZERO_CODE) as usize, false)
    } else {
        ((INT_ZERO_CODE - code) as usize, true)
    };
    let start = offset + 1;
    let payload = data
        .get(start..start + size)
        .ok_or(Error::UnexpectedEndOfData { offset })?;

    let mut raw = 0u64;
    for &b in payload {
        raw = (raw << 8) | b as u64;
    }

    let n = if negative {
        if size == 8 {
            // full-width negatives are the raw two's-complement pattern;
            // a clear top bit means the value is below i64's range
            if raw & 0x8000_0000_0000_0000 == 0 {
                return Err(Error::IntegerOverflow { offset });
            }
            raw as i64
        } else {
            let mask = (1u64 << (size * 8)) - 1;
            -((mask - raw) as i64)
        }
    } else {
        if raw > i64::MAX as u64 {
            return Err(Error::IntegerOverflow { offset });
        }
        raw as i64
    };
    Ok((Element::Int(n), 1 + size))
}

/// Invert the f32 order transform.
fn decode_f32(payload: [u8; 4]) -> f32 {
    let transformed = u32::from_be_bytes(payload);
    let bits = if transformed & 0x8000_0000 != 0 {
        transformed ^ 0x8000_0000
    } else {
        !transformed
    };
    f32::from_bits(bits)
}

/// Invert the f64 order transform.
fn decode_f64(payload: [u8; 8]) -> f64 {
    let transformed = u64::from_be_bytes(payload);
    let bits = if transformed & 0x8000_0000_0000_0000 != 0 {
        transformed ^ 0x8000_0000_0000_0000
    } else {
        !transformed
    };
    f64::from_bits(bits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_type_code() {
        let err = decode_element(&[0x42], 0).unwrap_err();
        assert_eq!(err, Error::InvalidTypeCode { code: 0x42, offset: 0 });
    }

    #[test]
    fn truncated_inputs_fail_cleanly() {
        // string without terminator
        assert!(matches!(
            decode_element(&[STRING_CODE, b'h', b'i'], 0),
            Err(Error::UnexpectedEndOfData { .. })
        ));
        // float missing payload bytes
        assert!(matches!(
            decode_element(&[FLOAT_CODE, 0x80], 0),
            Err(Error::UnexpectedEndOfData { .. })
        ));
        // uuid missing payload bytes
        assert!(matches!(
            decode_element(&[UUID_CODE, 1, 2, 3], 0),
            Err(Error::UnexpectedEndOfData { .. })
        ));
        // 4-byte positive integer with only 2 payload bytes
        assert!(matches!(
            decode_element(&[0x18, 0x00, 0x01], 0),
            Err(Error::UnexpectedEndOfData { .. })
        ));
        // empty input
        assert!(matches!(
            decode_element(&[], 0),
            Err(Error::UnexpectedEndOfData { offset: 0 })
        ));
    }

    #[test]
    fn positive_overflow_is_rejected() {
        // 8-byte positive payload above i64::MAX
        let mut data = vec![0x1C];
        data.extend_from_slice(&u64::MAX.to_be_bytes());
        assert!(matches!(
            decode_element(&data, 0),
            Err(Error::IntegerOverflow { .. })
        ));
    }

    #[test]
    fn negative_overflow_is_rejected() {
        // 8-byte negative payload with a clear top bit encodes a value
        // below i64::MIN
        let mut data = vec![0x0C];
        data.extend_from_slice(&0x7000_0000_0000_0000u64.to_be_bytes());
        assert!(matches!(
            decode_element(&data, 0),
            Err(Error::IntegerOverflow { .. })
        ));
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let data = [STRING_CODE, 0xFE, 0xFE, 0x00];
        assert_eq!(
            decode_element(&data, 0).unwrap_err(),
            Error::InvalidUtf8 { offset: 0 }
        );
    }

    #[test]
    fn utf8_with_escaped_null_roundtrips() {
        let mut buf = Vec::new();
        Element::String("a\0b".into()).pack_into(&mut buf);
        let (element, consumed) = decode_element(&buf, 0).unwrap();
        assert_eq!(element, Element::String("a\0b".into()));
        assert_eq!(consumed, buf.len());
    }

    #[test]
    fn error_offsets_point_at_the_failing_element() {
        // a valid null, then a truncated integer at offset 1
        let data = [NULL_CODE, 0x18, 0x00];
        let err = decode_all(&data).unwrap_err();
        assert_eq!(err, Error::UnexpectedEndOfData { offset: 1 });
    }

    #[test]
    fn trailing_bytes_continue_the_pass() {
        // two elements back to back decode as two elements
        let mut data = Vec::new();
        Element::Int(7).pack_into(&mut data);
        Element::Bool(true).pack_into(&mut data);
        let elements = decode_all(&data).unwrap();
        assert_eq!(elements, vec![Element::Int(7), Element::Bool(true)]);
    }
}
