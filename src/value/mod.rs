//! Values of a normal table, stored apart from their skey nodes.
//!
//! ## Value Entry
//!
//! ```text
//! fixed-length:    +-------------+
//!                  | value       |
//!                  +-------------+
//!
//! variable-length: +----------------------+
//!                  | length | value       |
//!                  +----------------------+
//!                  \--------/
//!                  1-4 bytes, see [crate::varint]
//! ```
//!
//! Value chunks are aligned to 2^[VALUE_CHUNK_ALIGN_BIT] bytes, so skey nodes drop the
//! low bits of a value's chunk offset.

use crate::chunk::{ChunkWriter, ItemOffset};
use crate::env::Directory;
use crate::error::KKVError;
use crate::options::WriterOptions;
use crate::skey::MAX_VALUE_CHUNK_OFFSET;
use crate::varint::{decode_count, encode_count, MAX_COUNT, MAX_COUNT_BYTES};
use crate::Result;

mod field;

pub use field::{compare_field, locate_field, PackedValueBuilder};

pub const VALUE_CHUNK_ALIGN_BIT: u8 = 3;

/// [ItemOffset] into the value file.
pub type ValueOffset = ItemOffset;

/// Encode the length prefix of a `len` bytes value. Returns the prefix length, `0`
/// for fixed-length values.
///
/// # Panics
///
/// A fixed-length value whose length differs from `fixed_len`, or a variable-length
/// value longer than [MAX_COUNT].
pub fn encode_value_header(
    fixed_len: usize,
    len: usize,
    buf: &mut [u8; MAX_COUNT_BYTES],
) -> usize {
    if fixed_len > 0 {
        assert_eq!(len, fixed_len, "fixed-length value size mismatch");
        0
    } else {
        let count = match u32::try_from(len) {
            Ok(count) => count,
            Err(_) => panic!("value length {} exceeds {}", len, MAX_COUNT),
        };
        encode_count(count, buf)
    }
}

/// Value starting at `pos` in `chunk`.
pub fn decode_value(chunk: &[u8], pos: usize, fixed_len: usize) -> Result<&[u8]> {
    let (start, len) = if fixed_len > 0 {
        (pos, fixed_len)
    } else {
        let header = chunk.get(pos..).ok_or_else(|| truncated(pos, chunk.len()))?;
        let (len, header_len) = decode_count(header)?;
        (pos + header_len, len as usize)
    };
    chunk
        .get(start..start + len)
        .ok_or_else(|| truncated(start + len, chunk.len()))
}

fn truncated(end: usize, chunk_len: usize) -> KKVError {
    KKVError::Corruption(format!(
        "value ends at {} beyond chunk length {}",
        end, chunk_len
    ))
}

pub struct ValueWriter {
    chunk_writer: ChunkWriter,
    fixed_len: usize,
    max_value_len: usize,
    value_count: u64,
    max_chunk_offset: u64,
}

impl ValueWriter {
    pub fn open(
        directory: &dyn Directory,
        file_name: &str,
        options: &WriterOptions,
        fixed_len: usize,
    ) -> Result<ValueWriter> {
        Ok(ValueWriter {
            chunk_writer: ChunkWriter::open(directory, file_name, options, VALUE_CHUNK_ALIGN_BIT)?,
            fixed_len,
            max_value_len: 0,
            value_count: 0,
            max_chunk_offset: MAX_VALUE_CHUNK_OFFSET,
        })
    }

    pub fn dump(&mut self, value: &[u8]) -> Result<ValueOffset> {
        let mut header = [0u8; MAX_COUNT_BYTES];
        let header_len = encode_value_header(self.fixed_len, value.len(), &mut header);
        let offset = if header_len == 0 {
            self.chunk_writer.insert_item(value)?
        } else {
            let offset = self.chunk_writer.insert_item(&header[..header_len])?;
            self.chunk_writer.append_data(value);
            offset
        };

        let chunk_offset = offset.chunk_offset() >> VALUE_CHUNK_ALIGN_BIT;
        if chunk_offset > self.max_chunk_offset {
            error!(
                "value chunk offset {} exceeds {}, value file too large",
                chunk_offset, self.max_chunk_offset
            );
            return Err(KKVError::ValueOffsetOutOfRange {
                chunk_offset,
                max: self.max_chunk_offset,
            });
        }

        self.value_count += 1;
        self.max_value_len = self.max_value_len.max(header_len + value.len());
        Ok(offset)
    }

    pub fn close(&mut self) -> Result<()> {
        self.chunk_writer.close()
    }

    /// Max encoded value size, length prefix included.
    #[inline]
    pub fn max_value_len(&self) -> usize {
        self.max_value_len
    }

    #[inline]
    pub fn value_count(&self) -> u64 {
        self.value_count
    }

    #[cfg(test)]
    pub(crate) fn set_max_chunk_offset(&mut self, max_chunk_offset: u64) {
        self.max_chunk_offset = max_chunk_offset;
    }
}
