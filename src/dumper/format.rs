use crate::env::{Directory, FileWriter};
use crate::error::KKVError;
use crate::ioutils::read_u32;
use crate::Result;
use std::io::Read;

pub const FORMAT_MAGIC_NUMBER: u32 = 0x6b6b7601;

const STORE_TS_FLAG: u8 = 1;
const KEEP_SKEY_SORTED_FLAG: u8 = 1 << 1;
const VALUE_INLINE_FLAG: u8 = 1 << 2;

/// Table level layout flags, written when a dump is closed.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct KKVFormat {
    pub store_ts: bool,
    /// Every group is ordered by the sort comparator and none was truncated.
    pub keep_skey_sorted: bool,
    pub value_inline: bool,
}

impl KKVFormat {
    fn flags(&self) -> u8 {
        let mut flags = 0;
        if self.store_ts {
            flags |= STORE_TS_FLAG;
        }
        if self.keep_skey_sorted {
            flags |= KEEP_SKEY_SORTED_FLAG;
        }
        if self.value_inline {
            flags |= VALUE_INLINE_FLAG;
        }
        flags
    }

    /// Write the descriptor and close `writer`.
    pub fn write_to(&self, writer: &mut dyn FileWriter) -> Result<()> {
        writer.write_all(&FORMAT_MAGIC_NUMBER.to_le_bytes())?;
        writer.write_all(&[self.flags()])?;
        writer.close()
    }

    pub fn load(directory: &dyn Directory, file_name: &str) -> Result<KKVFormat> {
        let mut reader = directory.open_file_reader(file_name)?;
        let magic_number = read_u32(&mut reader)?;
        if magic_number != FORMAT_MAGIC_NUMBER {
            return Err(KKVError::Corruption("invalid format magic number".into()));
        }
        let mut flags = [0u8; 1];
        reader.read_exact(&mut flags)?;
        let flags = flags[0];
        Ok(KKVFormat {
            store_ts: flags & STORE_TS_FLAG != 0,
            keep_skey_sorted: flags & KEEP_SKEY_SORTED_FLAG != 0,
            value_inline: flags & VALUE_INLINE_FLAG != 0,
        })
    }
}
