//! Atomic mutation evaluation
//!
//! Backends here apply atomic mutations read-modify-write inside the
//! current transaction, which is correct because each transaction already
//! owns an isolated view (snapshot plus its own buffer) and commits
//! atomically.
//!
//! Arithmetic and bitwise operands are little-endian unsigned byte
//! strings. A missing existing value stores the operand as-is. Where the
//! operand widths differ the shorter side is zero-extended; `Add`
//! truncates its result to the operand width.

use keyspan_core::{Bytes, Error, MutationType, Result, Versionstamp};

/// The key's state after applying `mutation`: `Some(new value)` or `None`
/// when the mutation clears it.
///
/// Versionstamped mutations are not handled here; they are buffered with
/// placeholder bytes and patched at commit.
pub(crate) fn apply_mutation(
    mutation: MutationType,
    existing: Option<&[u8]>,
    param: &[u8],
) -> Option<Bytes> {
    let current = match existing {
        Some(bytes) => bytes,
        None => {
            // no existing value: everything except compare-and-clear
            // stores the operand
            return match mutation {
                MutationType::CompareAndClear => None,
                _ => Some(param.to_vec()),
            };
        }
    };

    match mutation {
        MutationType::Add => Some(add_le(current, param)),
        MutationType::BitAnd => Some(bitwise(current, param, |a, b| a & b)),
        MutationType::BitOr => Some(bitwise(current, param, |a, b| a | b)),
        MutationType::BitXor => Some(bitwise(current, param, |a, b| a ^ b)),
        MutationType::Max => Some(pick_le(current, param, true)),
        MutationType::Min => Some(pick_le(current, param, false)),
        MutationType::CompareAndClear => {
            if current == param {
                None
            } else {
                Some(current.to_vec())
            }
        }
        MutationType::SetVersionstampedKey | MutationType::SetVersionstampedValue => {
            unreachable!("versionstamped mutations are buffered, not evaluated")
        }
    }
}

/// Little-endian addition, truncated to the operand width.
fn add_le(current: &[u8], param: &[u8]) -> Bytes {
    let mut out = vec![0u8; param.len()];
    let mut carry = 0u16;
    for (i, slot) in out.iter_mut().enumerate() {
        let a = *current.get(i).unwrap_or(&0) as u16;
        let b = param[i] as u16;
        let sum = a + b + carry;
        *slot = sum as u8;
        carry = sum >> 8;
    }
    out
}

/// Bytewise operation over both operands zero-extended to the longer
/// width.
fn bitwise(current: &[u8], param: &[u8], op: fn(u8, u8) -> u8) -> Bytes {
    let len = current.len().max(param.len());
    (0..len)
        .map(|i| {
            op(
                *current.get(i).unwrap_or(&0),
                *param.get(i).unwrap_or(&0),
            )
        })
        .collect()
}

/// Keep the larger (or smaller) operand under little-endian unsigned
/// comparison, zero-extended to the longer width.
fn pick_le(current: &[u8], param: &[u8], want_max: bool) -> Bytes {
    let len = current.len().max(param.len());
    let mut current_wins = false;
    let mut decided = false;
    // most significant byte is the last one
    for i in (0..len).rev() {
        let a = *current.get(i).unwrap_or(&0);
        let b = *param.get(i).unwrap_or(&0);
        if a != b {
            current_wins = a > b;
            decided = true;
            break;
        }
    }
    if !decided {
        current_wins = false; // equal: the operand is the canonical result
    }
    let winner = if current_wins == want_max { current } else { param };
    let mut out = winner.to_vec();
    out.resize(len, 0);
    out
}

/// Split a versionstamped operand into its payload and the placeholder
/// offset.
///
/// The operand carries a trailing 32-bit little-endian offset naming where
/// the 10-byte placeholder sits within the remaining payload.
///
/// # Errors
///
/// [`Error::InvalidOperation`] when the operand is too short or the offset
/// does not leave room for a full placeholder.
pub(crate) fn split_stamp_operand(operand: &[u8]) -> Result<(Bytes, usize)> {
    if operand.len() < 4 {
        return Err(Error::invalid_operation(
            "versionstamped operand is missing its offset suffix",
        ));
    }
    let (payload, suffix) = operand.split_at(operand.len() - 4);
    let offset = u32::from_le_bytes([suffix[0], suffix[1], suffix[2], suffix[3]]) as usize;
    if offset + Versionstamp::LENGTH > payload.len() {
        return Err(Error::invalid_operation(
            "versionstamp placeholder does not fit the operand",
        ));
    }
    Ok((payload.to_vec(), offset))
}
