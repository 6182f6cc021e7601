use crate::chunk::ItemOffset;
use crate::doc::{DocValue, KKVDoc};
use crate::dumper::{DumpEncoder, SKEY_FILE_NAME};
use crate::env::Directory;
use crate::options::{KKVIndexConfig, WriterOptions};
use crate::skey::{InlineSKeyWriter, SKeyType, SKeyWriter};
use crate::Result;

/// Values follow their skey node in the skey file.
pub struct InlineDumpEncoder<S: SKeyType> {
    skey_writer: InlineSKeyWriter<S>,
}

impl<S: SKeyType> DumpEncoder for InlineDumpEncoder<S> {
    const VALUE_INLINE: bool = true;

    fn open(
        directory: &dyn Directory,
        config: &KKVIndexConfig,
        skey_options: &WriterOptions,
        _value_options: &WriterOptions,
    ) -> Result<Self> {
        Ok(InlineDumpEncoder {
            skey_writer: InlineSKeyWriter::open(
                directory,
                SKEY_FILE_NAME,
                skey_options,
                config.skey_chunk_align_bit,
                config.store_ts,
                config.store_expire_time,
                config.value.fixed_len,
            )?,
        })
    }

    /// # Panics
    ///
    /// A live record referring to a value offset, an inline table has no value file.
    fn encode(
        &mut self,
        is_deleted_pkey: bool,
        is_last_node: bool,
        doc: &KKVDoc,
    ) -> Result<ItemOffset> {
        let is_deleted_skey = !is_deleted_pkey && doc.skey_deleted;
        let value: &[u8] = match &doc.value {
            DocValue::Bytes(value) => value,
            DocValue::None => &[],
            DocValue::Offset(offset) => {
                assert!(
                    is_deleted_pkey || is_deleted_skey,
                    "inline table got value offset {:?}",
                    offset
                );
                &[]
            }
        };
        self.skey_writer.dump(
            is_deleted_pkey,
            is_deleted_skey,
            is_last_node,
            doc.skey,
            doc.timestamp,
            doc.expire_time,
            value,
        )
    }

    fn close(&mut self) -> Result<()> {
        self.skey_writer.close()
    }

    #[inline]
    fn max_value_len(&self) -> usize {
        self.skey_writer.max_value_len()
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
