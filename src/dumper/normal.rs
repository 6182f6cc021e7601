use crate::chunk::ItemOffset;
use crate::doc::{DocValue, KKVDoc};
use crate::dumper::{DumpEncoder, SKEY_FILE_NAME, VALUE_FILE_NAME};
use crate::env::Directory;
use crate::options::{KKVIndexConfig, WriterOptions};
use crate::skey::{NormalSKeyWriter, SKeyType, SKeyWriter};
use crate::value::{ValueOffset, ValueWriter};
use crate::Result;

/// Values go to the value file, skey nodes refer to them by [ValueOffset].
pub struct NormalDumpEncoder<S: SKeyType> {
    skey_writer: NormalSKeyWriter<S>,
    value_writer: ValueWriter,
}

impl<S: SKeyType> DumpEncoder for NormalDumpEncoder<S> {
    const VALUE_INLINE: bool = false;

    fn open(
        directory: &dyn Directory,
        config: &KKVIndexConfig,
        skey_options: &WriterOptions,
        value_options: &WriterOptions,
    ) -> Result<Self> {
        let value_writer = ValueWriter::open(
            directory,
            VALUE_FILE_NAME,
            value_options,
            config.value.fixed_len,
        )?;
        let skey_writer = NormalSKeyWriter::open(
            directory,
            SKEY_FILE_NAME,
            skey_options,
            config.skey_chunk_align_bit,
            config.store_ts,
            config.store_expire_time,
        )?;
        Ok(NormalDumpEncoder {
            skey_writer,
            value_writer,
        })
    }

    fn encode(
        &mut self,
        is_deleted_pkey: bool,
        is_last_node: bool,
        doc: &KKVDoc,
    ) -> Result<ItemOffset> {
        let is_deleted_skey = !is_deleted_pkey && doc.skey_deleted;
        let value_offset = if is_deleted_pkey || is_deleted_skey {
            ValueOffset::invalid()
        } else {
            match &doc.value {
                DocValue::Bytes(value) => self.value_writer.dump(value)?,
                DocValue::None => self.value_writer.dump(&[])?,
                DocValue::Offset(offset) => *offset,
            }
        };
        self.skey_writer.dump(
            is_deleted_pkey,
            is_deleted_skey,
            is_last_node,
            doc.skey,
            doc.timestamp,
            doc.expire_time,
            value_offset,
        )
    }

    fn close(&mut self) -> Result<()> {
        self.value_writer.close()?;
        self.skey_writer.close()
    }

    #[inline]
    fn max_value_len(&self) -> usize {
        self.value_writer.max_value_len()
    }

    #[inline]
    fn total_skey_count(&self) -> u64 {
        self.skey_writer.total_skey_count()
    }

    #[inline]
    fn max_skey_count(&self) -> u32 {
        self.skey_writer.max_skey_count()
    }
}
