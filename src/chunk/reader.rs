use crate::chunk::{calc_next_chunk_offset, ChunkMeta, CHUNK_META_SIZE};
use crate::env::SequentialReadableFile;
use crate::error::KKVError;
use crate::ioutils::read_bytes_exact;
use crate::Result;
use std::io::{Read, Seek, SeekFrom};

/// Loads chunks of a chunk file one at a time. The last loaded chunk is cached.
pub struct ChunkReader {
    reader: Box<dyn SequentialReadableFile>,
    align_bit: u8,
    file_length: Option<u64>,
    chunk_offset: Option<u64>,
    chunk: Vec<u8>,
}

impl ChunkReader {
    pub fn new(reader: Box<dyn SequentialReadableFile>, align_bit: u8) -> ChunkReader {
        ChunkReader {
            reader,
            align_bit,
            file_length: None,
            chunk_offset: None,
            chunk: Vec::new(),
        }
    }

    /// Payload of the chunk starting at `chunk_offset`.
    pub fn load_chunk(&mut self, chunk_offset: u64) -> Result<&[u8]> {
        if self.chunk_offset != Some(chunk_offset) {
            let file_length = self.file_length()?;
            if chunk_offset + CHUNK_META_SIZE > file_length {
                return Err(KKVError::Corruption(format!(
                    "chunk offset {} beyond file length {}",
                    chunk_offset, file_length
                )));
            }
            self.reader.seek(SeekFrom::Start(chunk_offset))?;
            let mut meta = [0u8; CHUNK_META_SIZE as usize];
            self.reader.read_exact(&mut meta)?;
            let meta = ChunkMeta::decode(meta);
            self.chunk = read_bytes_exact(&mut self.reader, meta.length as u64)?;
            self.chunk_offset = Some(chunk_offset);
        }
        Ok(&self.chunk)
    }

    /// Offset of the chunk following the one at `chunk_offset`.
    pub fn next_chunk_offset(&mut self, chunk_offset: u64) -> Result<u64> {
        let length = self.load_chunk(chunk_offset)?.len() as u64;
        Ok(calc_next_chunk_offset(chunk_offset, length, self.align_bit))
    }

    /// Start offsets of all the chunks in the file.
    pub fn chunk_offsets(&mut self) -> Result<Vec<u64>> {
        let file_length = self.file_length()?;
        let mut offsets = vec![];
        let mut offset = 0;
        while offset < file_length {
            offsets.push(offset);
            offset = self.next_chunk_offset(offset)?;
        }
        Ok(offsets)
    }

    pub fn file_length(&mut self) -> Result<u64> {
        match self.file_length {
            Some(length) => Ok(length),
            None => {
                let length = self.reader.seek(SeekFrom::End(0))?;
                self.file_length = Some(length);
                Ok(length)
            }
        }
    }
}
