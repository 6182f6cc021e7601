//! Table from pkey to the first skey node of its group.
//!
//! ```text
//! +-------------------------------------+-------------------------+
//! | pkey(u64) | item offset(u64) | ...  | count(u64) | magic(u32) |
//! +-------------------------------------+-------------------------+
//!                                        \--------- footer -------/
//! ```

use crate::chunk::ItemOffset;
use crate::env::{Directory, FileWriter};
use crate::error::KKVError;
use crate::ioutils::{read_u32, read_u64};
use crate::options::WriterOptions;
use crate::Result;
use std::io::{Seek, SeekFrom, Write};

pub const PKEY_TABLE_MAGIC_NUMBER: u32 = 0x6b6b7670;
pub const PKEY_TABLE_FOOTER_SIZE: i64 = 12;
const PKEY_ENTRY_SIZE: u64 = 16;

/// Sink of the pkey to skey offset mapping of a dumped table.
pub trait PKeyDumper {
    fn dump(&mut self, pkey: u64, skey_offset: ItemOffset) -> Result<()>;

    fn close(&mut self) -> Result<()>;
}

/// Collects the whole table and writes it sorted by pkey at close.
pub struct PKeyOffsetWriter {
    writer: Box<dyn FileWriter>,
    entries: Vec<(u64, ItemOffset)>,
    closed: bool,
}

impl PKeyOffsetWriter {
    pub fn open(
        directory: &dyn Directory,
        file_name: &str,
        options: &WriterOptions,
        estimated_pkey_count: usize,
    ) -> Result<PKeyOffsetWriter> {
        Ok(PKeyOffsetWriter {
            writer: directory.create_file_writer(file_name, options)?,
            entries: Vec::with_capacity(estimated_pkey_count),
            closed: false,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PKeyDumper for PKeyOffsetWriter {
    fn dump(&mut self, pkey: u64, skey_offset: ItemOffset) -> Result<()> {
        debug_assert!(skey_offset.is_valid());
        self.entries.push((pkey, skey_offset));
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            warn!("pkey table closed twice");
            return Ok(());
        }
        self.entries.sort_unstable_by_key(|(pkey, _)| *pkey);
        for (pkey, offset) in &self.entries {
            self.writer.write_all(&pkey.to_le_bytes())?;
            self.writer.write_all(&offset.to_u64().to_le_bytes())?;
        }
        self.writer.write_all(&(self.entries.len() as u64).to_le_bytes())?;
        self.writer.write_all(&PKEY_TABLE_MAGIC_NUMBER.to_le_bytes())?;
        self.writer.close()?;
        self.closed = true;
        Ok(())
    }
}

/// Entries of a pkey table written by [PKeyOffsetWriter], sorted by pkey.
pub fn load_pkey_offsets(
    directory: &dyn Directory,
    file_name: &str,
) -> Result<Vec<(u64, ItemOffset)>> {
    let mut reader = directory.open_file_reader(file_name)?;
    let file_length = reader.seek(SeekFrom::End(0))?;
    if file_length < PKEY_TABLE_FOOTER_SIZE as u64 {
        return Err(KKVError::Corruption(format!(
            "pkey table of {} bytes has no footer",
            file_length
        )));
    }

    reader.seek(SeekFrom::End(-PKEY_TABLE_FOOTER_SIZE))?;
    let count = read_u64(&mut reader)?;
    let magic_number = read_u32(&mut reader)?;
    if magic_number != PKEY_TABLE_MAGIC_NUMBER {
        return Err(KKVError::Corruption("invalid pkey table magic number".into()));
    }
    if count * PKEY_ENTRY_SIZE + PKEY_TABLE_FOOTER_SIZE as u64 != file_length {
        return Err(KKVError::Corruption(format!(
            "pkey table holds {} entries but is {} bytes long",
            count, file_length
        )));
    }

    reader.seek(SeekFrom::Start(0))?;
    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let pkey = read_u64(&mut reader)?;
        let offset = ItemOffset::from_u64(read_u64(&mut reader)?);
        entries.push((pkey, offset));
    }
    Ok(entries)
}
