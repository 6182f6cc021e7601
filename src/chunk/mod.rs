//! Length framed chunks.
//!
//! # Chunk File
//!
//! ```text
//! +------------------------------------------------+ (offset 0)
//! | ChunkMeta | payload | padding                  |
//! +------------------------------------------------+ (aligned to 2^align_bit)
//! | ChunkMeta | payload | padding                  |
//! +------------------------------------------------+
//! | ...                                            |
//! +------------------------------------------------+
//! ```
//!
//! ## ChunkMeta
//!
//! ```text
//! +---------------------------+
//! | length     | reserved     |
//! +---------------------------+
//! \------------/\-------------/
//!    24 bits        8 bits
//! ```
//!
//! Items inside a chunk are addressed by [ItemOffset], the file offset of the chunk's
//! meta plus the item's byte offset inside the payload. Only the start of an item must
//! fit in [MAX_IN_CHUNK_OFFSET], so an item may run past it.
//!
//! NOTE: All fixed-length integer are little-endian. Padding is zero-filled.

use std::fmt;

mod reader;
mod writer;

pub use reader::ChunkReader;
pub use writer::ChunkWriter;

pub const CHUNK_META_SIZE: u64 = 4;

const CHUNK_LENGTH_BITS: u32 = 24;
/// `ChunkMeta.length` wraps above this.
pub const MAX_CHUNK_LENGTH: u32 = (1 << CHUNK_LENGTH_BITS) - 1;

const CHUNK_OFFSET_BITS: u32 = 52;
const IN_CHUNK_OFFSET_BITS: u32 = 12;

/// Also the invalid sentinel.
pub const MAX_CHUNK_OFFSET: u64 = (1 << CHUNK_OFFSET_BITS) - 1;
pub const MAX_IN_CHUNK_OFFSET: u64 = (1 << IN_CHUNK_OFFSET_BITS) - 1;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ChunkMeta {
    pub length: u32,
    pub reserved: u8,
}

impl ChunkMeta {
    /// Lengths of 2^24 bytes or more are silently truncated.
    pub fn new(length: usize) -> ChunkMeta {
        ChunkMeta {
            length: length as u32 & MAX_CHUNK_LENGTH,
            reserved: 0,
        }
    }

    pub fn encode(&self) -> [u8; CHUNK_META_SIZE as usize] {
        let reserved = (self.reserved as u32) << CHUNK_LENGTH_BITS;
        ((self.length & MAX_CHUNK_LENGTH) | reserved).to_le_bytes()
    }

    pub fn decode(bytes: [u8; CHUNK_META_SIZE as usize]) -> ChunkMeta {
        let word = u32::from_le_bytes(bytes);
        ChunkMeta {
            length: word & MAX_CHUNK_LENGTH,
            reserved: (word >> CHUNK_LENGTH_BITS) as u8,
        }
    }
}

/// Location of an item: chunk start address and byte offset in the chunk payload.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct ItemOffset(u64);

impl ItemOffset {
    pub fn new(chunk_offset: u64, in_chunk_offset: u64) -> ItemOffset {
        assert!(
            chunk_offset <= MAX_CHUNK_OFFSET,
            "chunk offset {} out of range",
            chunk_offset
        );
        assert!(
            in_chunk_offset <= MAX_IN_CHUNK_OFFSET,
            "in chunk offset {} out of range",
            in_chunk_offset
        );
        ItemOffset(in_chunk_offset << CHUNK_OFFSET_BITS | chunk_offset)
    }

    #[inline]
    pub const fn invalid() -> ItemOffset {
        ItemOffset(MAX_CHUNK_OFFSET)
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.chunk_offset() != MAX_CHUNK_OFFSET
    }

    #[inline]
    pub fn chunk_offset(&self) -> u64 {
        self.0 & MAX_CHUNK_OFFSET
    }

    #[inline]
    pub fn in_chunk_offset(&self) -> u64 {
        self.0 >> CHUNK_OFFSET_BITS
    }

    #[inline]
    pub fn to_u64(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn from_u64(raw: u64) -> ItemOffset {
        ItemOffset(raw)
    }
}

impl Default for ItemOffset {
    fn default() -> Self {
        ItemOffset::invalid()
    }
}

impl fmt::Debug for ItemOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "ItemOffset({}+{})", self.chunk_offset(), self.in_chunk_offset())
        } else {
            write!(f, "ItemOffset(invalid)")
        }
    }
}

#[inline]
pub(crate) fn align_up(offset: u64, align_bit: u8) -> u64 {
    let mask = (1u64 << align_bit) - 1;
    (offset + mask) & !mask
}

/// File offset of the chunk following a chunk at `offset` with a `length` bytes payload.
pub fn calc_next_chunk_offset(offset: u64, length: u64, align_bit: u8) -> u64 {
    align_up(offset + length + CHUNK_META_SIZE, align_bit)
}

#[cfg(test)]
mod tests {
    use crate::chunk::{
        calc_next_chunk_offset, ChunkMeta, ItemOffset, MAX_CHUNK_LENGTH, MAX_CHUNK_OFFSET,
        MAX_IN_CHUNK_OFFSET,
    };

    #[test]
    fn test_chunk_meta() {
        let meta = ChunkMeta::new(0x123456);
        assert_eq!(meta.encode(), [0x56, 0x34, 0x12, 0x00]);
        assert_eq!(ChunkMeta::decode(meta.encode()), meta);

        let meta = ChunkMeta {
            length: MAX_CHUNK_LENGTH,
            reserved: 0xab,
        };
        assert_eq!(ChunkMeta::decode(meta.encode()), meta);

        // wraps modulo 2^24
        assert_eq!(ChunkMeta::new((1 << 24) + 5).length, 5);
    }

    #[test]
    fn test_item_offset() {
        let offset = ItemOffset::new(MAX_CHUNK_OFFSET - 1, MAX_IN_CHUNK_OFFSET);
        assert!(offset.is_valid());
        assert_eq!(offset.chunk_offset(), MAX_CHUNK_OFFSET - 1);
        assert_eq!(offset.in_chunk_offset(), MAX_IN_CHUNK_OFFSET);
        assert_eq!(ItemOffset::from_u64(offset.to_u64()), offset);

        let offset = ItemOffset::new(4096, 17);
        assert_eq!((offset.chunk_offset(), offset.in_chunk_offset()), (4096, 17));

        assert!(!ItemOffset::invalid().is_valid());
        assert!(!ItemOffset::default().is_valid());
    }

    #[test]
    #[should_panic]
    fn test_item_offset_overflow() {
        ItemOffset::new(0, MAX_IN_CHUNK_OFFSET + 1);
    }

    #[test]
    fn test_calc_next_chunk_offset() {
        assert_eq!(calc_next_chunk_offset(0, 10, 0), 14);
        assert_eq!(calc_next_chunk_offset(0, 10, 3), 16);
        assert_eq!(calc_next_chunk_offset(16, 4, 3), 24);
        assert_eq!(calc_next_chunk_offset(4096, 100, 12), 8192);
    }
}
