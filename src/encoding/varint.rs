// src/encoding/varint.rs
//! Variable-length unsigned integer codec
//!
//! Values are split into 7-bit groups, low-order group first. Every byte but
//! the last carries the continuation bit `0x80`. A `u64` needs at most nine
//! bytes: after eight groups (56 bits) at most eight bits remain, and the
//! ninth byte carries them unmasked with no continuation bit.
//!
//! The padded form always spends exactly four bytes on a 28-bit value so a
//! size header can be reserved up front and back-patched once the event is
//! complete.

use crate::utils::errors::{RecorderError, Result};

/// Longest encoding of a `u64`
pub const MAX_VARINT_LEN: usize = 9;

/// Width of a padded varint
pub const PADDED_LEN: usize = 4;

/// Largest value a padded varint can carry (28 bits)
pub const MAX_PADDED_VALUE: u32 = (1 << 28) - 1;

const CONTINUATION: u8 = 0x80;
const GROUP_MASK: u64 = 0x7F;

/// Encode `value` into the front of `out`, returning the bytes written.
///
/// Panics if `out` is shorter than [`encoded_len`]`(value)`; callers reserve
/// capacity before encoding.
#[inline]
pub fn encode(mut value: u64, out: &mut [u8]) -> usize {
    for i in 0..MAX_VARINT_LEN - 1 {
        if value <= GROUP_MASK {
            out[i] = value as u8;
            return i + 1;
        }
        out[i] = (value & GROUP_MASK) as u8 | CONTINUATION;
        value >>= 7;
    }
    // Eight groups consumed, whatever is left fits in one byte
    out[MAX_VARINT_LEN - 1] = value as u8;
    MAX_VARINT_LEN
}

/// Number of bytes [`encode`] emits for `value`
#[inline]
pub fn encoded_len(mut value: u64) -> usize {
    let mut len = 1;
    while value > GROUP_MASK && len < MAX_VARINT_LEN {
        value >>= 7;
        len += 1;
    }
    len
}

/// Encode into a fresh vector
pub fn encode_to_vec(value: u64) -> Vec<u8> {
    let mut out = [0u8; MAX_VARINT_LEN];
    let len = encode(value, &mut out);
    out[..len].to_vec()
}

/// Decode a varint from the front of `input`, returning the value and the
/// number of bytes consumed
pub fn decode(input: &[u8]) -> Result<(u64, usize)> {
    let mut value = 0u64;

    for i in 0..MAX_VARINT_LEN - 1 {
        let byte = *input
            .get(i)
            .ok_or(RecorderError::VarintTruncated { needed: 1 })?;
        value |= (u64::from(byte) & GROUP_MASK) << (7 * i);
        if byte & CONTINUATION == 0 {
            return Ok((value, i + 1));
        }
    }

    // Ninth byte terminates unconditionally
    let last = *input
        .get(MAX_VARINT_LEN - 1)
        .ok_or(RecorderError::VarintTruncated { needed: 1 })?;
    value |= u64::from(last) << 56;
    Ok((value, MAX_VARINT_LEN))
}

/// Encode a size into the fixed 4-byte padded form
#[inline]
pub fn encode_padded(value: u32) -> [u8; PADDED_LEN] {
    debug_assert!(value <= MAX_PADDED_VALUE, "padded varint overflow: {}", value);
    let v = u64::from(value);
    [
        (v & GROUP_MASK) as u8 | CONTINUATION,
        ((v >> 7) & GROUP_MASK) as u8 | CONTINUATION,
        ((v >> 14) & GROUP_MASK) as u8 | CONTINUATION,
        ((v >> 21) & GROUP_MASK) as u8,
    ]
}

/// Checked variant of [`encode_padded`] for values of unknown magnitude
pub fn try_encode_padded(value: u64) -> Result<[u8; PADDED_LEN]> {
    if value > u64::from(MAX_PADDED_VALUE) {
        return Err(RecorderError::PaddedVarintOverflow(value));
    }
    Ok(encode_padded(value as u32))
}

/// Decode a padded varint from the front of `input`
pub fn decode_padded(input: &[u8]) -> Result<u32> {
    if input.len() < PADDED_LEN {
        return Err(RecorderError::VarintTruncated {
            needed: PADDED_LEN - input.len(),
        });
    }

    let value = input[..PADDED_LEN]
        .iter()
        .enumerate()
        .fold(0u32, |acc, (i, byte)| {
            acc | (u32::from(*byte) & GROUP_MASK as u32) << (7 * i)
        });
    Ok(value)
}
