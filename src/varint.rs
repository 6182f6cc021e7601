//! Count prefix shared by variable-length values and multi-value fields.
//!
//! Base-128 little-endian groups, the high bit of a byte marks that another byte
//! follows. At most 4 bytes are used, so a count is below 2^28.

use crate::error::KKVError;
use crate::Result;

pub const MAX_COUNT_BYTES: usize = 4;
pub const MAX_COUNT: u32 = (1 << (7 * MAX_COUNT_BYTES)) - 1;

/// Bytes needed to encode `count`.
pub fn count_encoded_len(count: u32) -> usize {
    match count {
        0..=0x7f => 1,
        0x80..=0x3fff => 2,
        0x4000..=0x1f_ffff => 3,
        _ => 4,
    }
}

/// Encode `count` into `buf`, returns the used length.
pub fn encode_count(count: u32, buf: &mut [u8; MAX_COUNT_BYTES]) -> usize {
    assert!(count <= MAX_COUNT, "count {} exceeds {}", count, MAX_COUNT);
    let len = count_encoded_len(count);
    let mut rest = count;
    for (i, byte) in buf.iter_mut().take(len).enumerate() {
        *byte = (rest & 0x7f) as u8;
        rest >>= 7;
        if i + 1 < len {
            *byte |= 0x80;
        }
    }
    len
}

/// Returns (count, bytes consumed).
pub fn decode_count(bytes: &[u8]) -> Result<(u32, usize)> {
    let mut count = 0u32;
    for (i, &byte) in bytes.iter().take(MAX_COUNT_BYTES).enumerate() {
        count |= ((byte & 0x7f) as u32) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((count, i + 1));
        }
    }
    Err(KKVError::Corruption(format!(
        "invalid count prefix {:?}",
        &bytes[..bytes.len().min(MAX_COUNT_BYTES)]
    )))
}
