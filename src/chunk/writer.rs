use crate::chunk::{
    calc_next_chunk_offset, ChunkMeta, ItemOffset, CHUNK_META_SIZE, MAX_IN_CHUNK_OFFSET,
};
use crate::env::{Directory, FileWriter};
use crate::error::KKVError;
use crate::options::WriterOptions;
use crate::Result;
use std::io::Write;

const PADDING: [u8; 64] = [0u8; 64];

/// Appends items to a chunk file, see [crate::chunk].
pub struct ChunkWriter {
    file_name: String,
    writer: Option<Box<dyn FileWriter>>,
    /// payload of the chunk being built
    buffer: Vec<u8>,
    /// file offset of the chunk being built
    chunk_offset: u64,
    align_bit: u8,
    chunk_count: u64,
}

impl ChunkWriter {
    pub fn open(
        directory: &dyn Directory,
        file_name: &str,
        options: &WriterOptions,
        align_bit: u8,
    ) -> Result<ChunkWriter> {
        let writer = directory.create_file_writer(file_name, options)?;
        debug_assert_eq!(writer.position(), 0);
        Ok(ChunkWriter {
            file_name: file_name.to_string(),
            writer: Some(writer),
            buffer: Vec::with_capacity(2 * (MAX_IN_CHUNK_OFFSET as usize + 1)),
            chunk_offset: 0,
            align_bit,
            chunk_count: 0,
        })
    }

    /// Start a new item. The current chunk is flushed first when the item would
    /// start beyond [MAX_IN_CHUNK_OFFSET].
    pub fn insert_item(&mut self, data: &[u8]) -> Result<ItemOffset> {
        if self.buffer.len() as u64 > MAX_IN_CHUNK_OFFSET {
            self.flush_chunk()?;
        }
        let offset = ItemOffset::new(self.chunk_offset, self.buffer.len() as u64);
        self.buffer.extend_from_slice(data);
        Ok(offset)
    }

    /// Append to the last inserted item.
    #[inline]
    pub fn append_data(&mut self, data: &[u8]) {
        debug_assert!(self.writer.is_some(), "append to closed {}", self.file_name);
        self.buffer.extend_from_slice(data);
    }

    /// Bytes in the file once the pending chunk is flushed, padding excluded.
    pub fn length(&self) -> u64 {
        if self.buffer.is_empty() {
            self.chunk_offset
        } else {
            self.chunk_offset + CHUNK_META_SIZE + self.buffer.len() as u64
        }
    }

    #[inline]
    pub fn chunk_count(&self) -> u64 {
        self.chunk_count
    }

    pub fn close(&mut self) -> Result<()> {
        if self.writer.is_none() {
            warn!("chunk file `{}` closed twice", self.file_name);
            return Ok(());
        }
        if !self.buffer.is_empty() {
            self.flush_chunk()?;
        }
        if let Some(mut writer) = self.writer.take() {
            writer.close()?;
        }
        debug!(
            "chunk file `{}` closed, {} chunks, {} bytes",
            self.file_name, self.chunk_count, self.chunk_offset
        );
        Ok(())
    }

    fn flush_chunk(&mut self) -> Result<()> {
        let writer = self.writer.as_mut().ok_or_else(|| {
            KKVError::Custom(format!("chunk file `{}` is closed", self.file_name))
        })?;
        debug_assert_eq!(writer.position(), self.chunk_offset);

        let length = self.buffer.len() as u64;
        writer.write_all(&ChunkMeta::new(self.buffer.len()).encode())?;
        writer.write_all(&self.buffer)?;

        let next_chunk_offset = calc_next_chunk_offset(self.chunk_offset, length, self.align_bit);
        let mut padding = next_chunk_offset - (self.chunk_offset + CHUNK_META_SIZE + length);
        while padding > 0 {
            let n = padding.min(PADDING.len() as u64);
            writer.write_all(&PADDING[..n as usize])?;
            padding -= n;
        }

        self.chunk_offset = next_chunk_offset;
        self.chunk_count += 1;
        self.buffer.clear();
        Ok(())
    }
}
