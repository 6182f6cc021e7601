//! Read-back of a dumped table, one pkey group at a time.

use crate::chunk::{calc_next_chunk_offset, ChunkReader, ItemOffset};
use crate::dumper::{
    load_pkey_offsets, KKVFormat, FORMAT_FILE_NAME, PKEY_FILE_NAME, SKEY_FILE_NAME,
    VALUE_FILE_NAME,
};
use crate::env::Directory;
use crate::error::KKVError;
use crate::ioutils::u32_from_le_bytes;
use crate::options::KKVIndexConfig;
use crate::skey::{InlineSKeyNode, NormalSKeyNode, SKeyNode, SKeyType};
use crate::value::{decode_value, VALUE_CHUNK_ALIGN_BIT};
use crate::varint::count_encoded_len;
use crate::Result;
use std::marker::PhantomData;

/// One decoded skey node.
#[derive(Clone, Debug, PartialEq)]
pub struct SKeyRecord<S> {
    pub skey: S,
    /// `None` when the table does not store timestamps.
    pub ts: Option<u32>,
    pub expire_time: Option<u32>,
    pub is_deleted_pkey: bool,
    pub is_deleted_skey: bool,
    pub is_last_node: bool,
    /// `None` for tombstones.
    pub value: Option<Vec<u8>>,
}

/// Trailing fields of a node and how values are stored.
struct RecordLayout {
    store_ts: bool,
    store_expire_time: bool,
    value_fixed_len: usize,
}

impl RecordLayout {
    /// Timestamp and expire time following a node ending at `pos`.
    fn decode_trailer(
        &self,
        chunk: &[u8],
        mut pos: usize,
    ) -> Result<(Option<u32>, Option<u32>, usize)> {
        let mut next_u32 = |enabled: bool| -> Result<Option<u32>> {
            if !enabled {
                return Ok(None);
            }
            let bytes = chunk.get(pos..pos + 4).ok_or_else(|| truncated(pos + 4))?;
            pos += 4;
            Ok(Some(u32_from_le_bytes(bytes)))
        };
        let ts = next_u32(self.store_ts)?;
        let expire_time = next_u32(self.store_expire_time)?;
        Ok((ts, expire_time, pos))
    }

    fn decode_inline<S: SKeyType>(
        &self,
        chunk: &[u8],
        pos: usize,
    ) -> Result<(SKeyRecord<S>, usize)> {
        let node_end = pos + InlineSKeyNode::<S>::SIZE;
        let node_bytes = chunk.get(pos..node_end).ok_or_else(|| truncated(node_end))?;
        let node = InlineSKeyNode::<S>::decode(node_bytes);
        let (ts, expire_time, mut end) = self.decode_trailer(chunk, node_end)?;
        let value = if node.has_value() {
            let value = decode_value(chunk, end, self.value_fixed_len)?;
            end += value.len();
            if self.value_fixed_len == 0 {
                end += count_encoded_len(value.len() as u32);
            }
            Some(value.to_vec())
        } else {
            None
        };
        let record = SKeyRecord {
            skey: node.skey(),
            ts,
            expire_time,
            is_deleted_pkey: node.is_pkey_deleted(),
            is_deleted_skey: node.is_skey_deleted(),
            is_last_node: node.is_last_node(),
            value,
        };
        Ok((record, end))
    }

    /// Decodes a normal node, its value is resolved through `value_reader`.
    fn decode_normal<S: SKeyType>(
        &self,
        chunk: &[u8],
        pos: usize,
        value_reader: &mut ChunkReader,
    ) -> Result<(SKeyRecord<S>, usize)> {
        let node_end = pos + NormalSKeyNode::<S>::SIZE;
        let node_bytes = chunk.get(pos..node_end).ok_or_else(|| truncated(node_end))?;
        let node = NormalSKeyNode::<S>::decode(node_bytes);
        let (ts, expire_time, end) = self.decode_trailer(chunk, node_end)?;
        let value = match node.value_offset() {
            Some(offset) => {
                let value_chunk = value_reader.load_chunk(offset.chunk_offset())?;
                let value = decode_value(
                    value_chunk,
                    offset.in_chunk_offset() as usize,
                    self.value_fixed_len,
                )?;
                Some(value.to_vec())
            }
            None => None,
        };
        let record = SKeyRecord {
            skey: node.skey(),
            ts,
            expire_time,
            is_deleted_pkey: node.is_pkey_deleted(),
            is_deleted_skey: node.is_skey_deleted(),
            is_last_node: node.is_last_node(),
            value,
        };
        Ok((record, end))
    }
}

pub struct KKVTableReader<S: SKeyType> {
    format: KKVFormat,
    layout: RecordLayout,
    skey_align_bit: u8,
    pkey_offsets: Vec<(u64, ItemOffset)>,
    skey_reader: ChunkReader,
    /// `None` for inline tables.
    value_reader: Option<ChunkReader>,
    _phantom: PhantomData<S>,
}

impl<S: SKeyType> KKVTableReader<S> {
    pub fn open(directory: &dyn Directory, config: &KKVIndexConfig) -> Result<KKVTableReader<S>> {
        let format = KKVFormat::load(directory, FORMAT_FILE_NAME)?;
        if format.value_inline != config.value_inline || format.store_ts != config.store_ts {
            error!("table format {:?} does not match config", format);
            return Err(KKVError::InvalidConfig(format!(
                "table format {:?} does not match config",
                format
            )));
        }

        let value_reader = if format.value_inline {
            None
        } else {
            Some(ChunkReader::new(
                directory.open_file_reader(VALUE_FILE_NAME)?,
                VALUE_CHUNK_ALIGN_BIT,
            ))
        };
        Ok(KKVTableReader {
            format,
            layout: RecordLayout {
                store_ts: format.store_ts,
                store_expire_time: config.store_expire_time,
                value_fixed_len: config.value.fixed_len,
            },
            skey_align_bit: config.skey_chunk_align_bit,
            pkey_offsets: load_pkey_offsets(directory, PKEY_FILE_NAME)?,
            skey_reader: ChunkReader::new(
                directory.open_file_reader(SKEY_FILE_NAME)?,
                config.skey_chunk_align_bit,
            ),
            value_reader,
            _phantom: PhantomData,
        })
    }

    #[inline]
    pub fn format(&self) -> KKVFormat {
        self.format
    }

    /// Dumped pkeys in ascending order.
    pub fn pkeys(&self) -> impl Iterator<Item = u64> + '_ {
        self.pkey_offsets.iter().map(|(pkey, _)| *pkey)
    }

    /// Records of `pkey`, `None` if the pkey was not dumped.
    pub fn lookup(&mut self, pkey: u64) -> Result<Option<Vec<SKeyRecord<S>>>> {
        match self.pkey_offsets.binary_search_by_key(&pkey, |(pkey, _)| *pkey) {
            Ok(idx) => {
                let offset = self.pkey_offsets[idx].1;
                self.scan(offset).map(Some)
            }
            Err(_) => Ok(None),
        }
    }

    /// Records of the group whose first node is at `start`, up to its last node.
    pub fn scan(&mut self, start: ItemOffset) -> Result<Vec<SKeyRecord<S>>> {
        let mut chunk_offset = start.chunk_offset();
        let mut pos = start.in_chunk_offset() as usize;
        let mut records = vec![];
        loop {
            let chunk = self.skey_reader.load_chunk(chunk_offset)?;
            if pos >= chunk.len() {
                if pos > chunk.len() {
                    return Err(truncated(pos));
                }
                chunk_offset =
                    calc_next_chunk_offset(chunk_offset, chunk.len() as u64, self.skey_align_bit);
                pos = 0;
                continue;
            }

            let (record, end) = match self.value_reader.as_mut() {
                Some(value_reader) => self.layout.decode_normal::<S>(chunk, pos, value_reader)?,
                None => self.layout.decode_inline::<S>(chunk, pos)?,
            };
            let is_last_node = record.is_last_node;
            records.push(record);
            if is_last_node {
                return Ok(records);
            }
            pos = end;
        }
    }
}

fn truncated(end: usize) -> KKVError {
    KKVError::Corruption(format!("skey record ends at {} beyond its chunk", end))
}
