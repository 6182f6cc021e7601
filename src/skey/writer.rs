use crate::chunk::{ChunkWriter, ItemOffset};
use crate::env::Directory;
use crate::options::WriterOptions;
use crate::skey::node::{InlineSKeyNode, NormalSKeyNode, SKeyNode};
use crate::skey::SKeyType;
use crate::value::{encode_value_header, ValueOffset};
use crate::Result;
use std::marker::PhantomData;

/// Writes skey nodes into the skey chunk file.
pub trait SKeyWriter {
    /// What a value bearing node refers to its value with.
    type ValueRef<'a>;

    /// `value` is ignored for tombstones.
    #[allow(clippy::too_many_arguments)]
    fn dump(
        &mut self,
        is_deleted_pkey: bool,
        is_deleted_skey: bool,
        is_last_node: bool,
        skey: u64,
        ts: u32,
        expire_time: u32,
        value: Self::ValueRef<'_>,
    ) -> Result<ItemOffset>;

    fn close(&mut self) -> Result<()>;

    fn total_skey_count(&self) -> u64;

    /// Max node count of one pkey group.
    fn max_skey_count(&self) -> u32;
}

struct SKeyWriterBase {
    chunk_writer: ChunkWriter,
    store_ts: bool,
    store_expire_time: bool,
    node_buf: Vec<u8>,
    total_skey_count: u64,
    cur_skey_count: u32,
    max_skey_count: u32,
}

impl SKeyWriterBase {
    fn open(
        directory: &dyn Directory,
        file_name: &str,
        options: &WriterOptions,
        align_bit: u8,
        store_ts: bool,
        store_expire_time: bool,
    ) -> Result<SKeyWriterBase> {
        Ok(SKeyWriterBase {
            chunk_writer: ChunkWriter::open(directory, file_name, options, align_bit)?,
            store_ts,
            store_expire_time,
            node_buf: Vec::with_capacity(16),
            total_skey_count: 0,
            cur_skey_count: 0,
            max_skey_count: 0,
        })
    }

    /// Write the node encoded in `node_buf` and the trailing ts and expire time.
    fn dump_node(&mut self, is_last_node: bool, ts: u32, expire_time: u32) -> Result<ItemOffset> {
        let offset = self.chunk_writer.insert_item(&self.node_buf)?;
        if self.store_ts {
            self.chunk_writer.append_data(&ts.to_le_bytes());
        }
        if self.store_expire_time {
            self.chunk_writer.append_data(&expire_time.to_le_bytes());
        }

        self.total_skey_count += 1;
        self.cur_skey_count += 1;
        if is_last_node {
            self.max_skey_count = self.max_skey_count.max(self.cur_skey_count);
            self.cur_skey_count = 0;
        }
        Ok(offset)
    }
}

/// Writes [InlineSKeyNode]s, each value bearing node followed by its value.
pub struct InlineSKeyWriter<S: SKeyType> {
    base: SKeyWriterBase,
    value_fixed_len: usize,
    max_value_len: usize,
    _phantom: PhantomData<S>,
}

impl<S: SKeyType> InlineSKeyWriter<S> {
    pub fn open(
        directory: &dyn Directory,
        file_name: &str,
        options: &WriterOptions,
        align_bit: u8,
        store_ts: bool,
        store_expire_time: bool,
        value_fixed_len: usize,
    ) -> Result<Self> {
        Ok(InlineSKeyWriter {
            base: SKeyWriterBase::open(
                directory,
                file_name,
                options,
                align_bit,
                store_ts,
                store_expire_time,
            )?,
            value_fixed_len,
            max_value_len: 0,
            _phantom: PhantomData,
        })
    }

    /// Max encoded value size, length prefix included.
    #[inline]
    pub fn max_value_len(&self) -> usize {
        self.max_value_len
    }
}

impl<S: SKeyType> SKeyWriter for InlineSKeyWriter<S> {
    type ValueRef<'a> = &'a [u8];

    fn dump(
        &mut self,
        is_deleted_pkey: bool,
        is_deleted_skey: bool,
        is_last_node: bool,
        skey: u64,
        ts: u32,
        expire_time: u32,
        value: &[u8],
    ) -> Result<ItemOffset> {
        let skey = S::from_raw(skey);
        let node = if is_deleted_pkey {
            InlineSKeyNode::pkey_deleted_node(skey, is_last_node)
        } else if is_deleted_skey {
            InlineSKeyNode::skey_deleted_node(skey, is_last_node)
        } else {
            InlineSKeyNode::of(skey, is_last_node)
        };
        self.base.node_buf.clear();
        node.encode(&mut self.base.node_buf);
        let offset = self.base.dump_node(is_last_node, ts, expire_time)?;

        if node.has_value() {
            let mut header = [0u8; 4];
            let header_len = encode_value_header(self.value_fixed_len, value.len(), &mut header);
            self.base.chunk_writer.append_data(&header[..header_len]);
            self.base.chunk_writer.append_data(value);
            self.max_value_len = self.max_value_len.max(header_len + value.len());
        }
        Ok(offset)
    }

    fn close(&mut self) -> Result<()> {
        self.base.chunk_writer.close()
    }

    #[inline]
    fn total_skey_count(&self) -> u64 {
        self.base.total_skey_count
    }

    #[inline]
    fn max_skey_count(&self) -> u32 {
        self.base.max_skey_count
    }
}

/// Writes [NormalSKeyNode]s referring to values in the value file.
pub struct NormalSKeyWriter<S: SKeyType> {
    base: SKeyWriterBase,
    _phantom: PhantomData<S>,
}

impl<S: SKeyType> NormalSKeyWriter<S> {
    pub fn open(
        directory: &dyn Directory,
        file_name: &str,
        options: &WriterOptions,
        align_bit: u8,
        store_ts: bool,
        store_expire_time: bool,
    ) -> Result<Self> {
        Ok(NormalSKeyWriter {
            base: SKeyWriterBase::open(
                directory,
                file_name,
                options,
                align_bit,
                store_ts,
                store_expire_time,
            )?,
            _phantom: PhantomData,
        })
    }
}

impl<S: SKeyType> SKeyWriter for NormalSKeyWriter<S> {
    type ValueRef<'a> = ValueOffset;

    fn dump(
        &mut self,
        is_deleted_pkey: bool,
        is_deleted_skey: bool,
        is_last_node: bool,
        skey: u64,
        ts: u32,
        expire_time: u32,
        value: ValueOffset,
    ) -> Result<ItemOffset> {
        let skey = S::from_raw(skey);
        let node = if is_deleted_pkey {
            NormalSKeyNode::pkey_deleted_node(skey, is_last_node)
        } else if is_deleted_skey {
            NormalSKeyNode::skey_deleted_node(skey, is_last_node)
        } else {
            NormalSKeyNode::of(skey, value, is_last_node)
        };
        self.base.node_buf.clear();
        node.encode(&mut self.base.node_buf);
        self.base.dump_node(is_last_node, ts, expire_time)
    }

    fn close(&mut self) -> Result<()> {
        self.base.chunk_writer.close()
    }

    #[inline]
    fn total_skey_count(&self) -> u64 {
        self.base.total_skey_count
    }

    #[inline]
    fn max_skey_count(&self) -> u32 {
        self.base.max_skey_count
    }
}

#[cfg(test)]
mod tests {
    use crate::chunk::{ChunkReader, ItemOffset};
    use crate::env::{Directory, FsDirectory};
    use crate::options::WriterOptions;
    use crate::skey::node::{InlineSKeyNode, NormalSKeyNode, SKeyNode};
    use crate::skey::writer::{InlineSKeyWriter, NormalSKeyWriter, SKeyWriter};
    use crate::value::ValueOffset;

    #[test]
    fn test_inline_writer() {
        let temp_dir = tempfile::tempdir().unwrap();
        let directory = FsDirectory::open(temp_dir.path()).unwrap();
        let mut writer = InlineSKeyWriter::<u32>::open(
            &directory,
            "skey",
            &WriterOptions::default(),
            0,
            true,
            true,
            0,
        )
        .unwrap();

        let first = writer.dump(false, false, false, 1, 10, 20, b"1").unwrap();
        let second = writer.dump(false, true, true, 2, 11, 21, b"ignored").unwrap();
        let third = writer.dump(true, false, true, 0, 12, 22, b"").unwrap();
        writer.close().unwrap();

        // node(5) + ts(4) + expire(4) + prefix(1) + value(1)
        assert_eq!(first, ItemOffset::new(0, 0));
        assert_eq!(second, ItemOffset::new(0, 15));
        assert_eq!(third, ItemOffset::new(0, 28));
        assert_eq!(writer.total_skey_count(), 3);
        assert_eq!(writer.max_skey_count(), 2);
        assert_eq!(writer.max_value_len(), 2);

        let mut reader = ChunkReader::new(directory.open_file_reader("skey").unwrap(), 0);
        let chunk = reader.load_chunk(0).unwrap();
        assert_eq!(chunk.len(), 41);
        let node = InlineSKeyNode::<u32>::decode(chunk);
        assert!(node.has_value());
        assert_eq!(&chunk[5..9], &10u32.to_le_bytes());
        assert_eq!(&chunk[9..13], &20u32.to_le_bytes());
        assert_eq!(&chunk[13..15], &[1, b'1']);
        let node = InlineSKeyNode::<u32>::decode(&chunk[15..]);
        assert!(node.is_skey_deleted() && node.is_last_node());
        let node = InlineSKeyNode::<u32>::decode(&chunk[28..]);
        assert!(node.is_pkey_deleted() && node.is_last_node());
    }

    fn open_fixed_len_writer(directory: &FsDirectory) -> InlineSKeyWriter<u32> {
        InlineSKeyWriter::<u32>::open(
            directory,
            "skey",
            &WriterOptions::default(),
            0,
            false,
            false,
            4,
        )
        .unwrap()
    }

    #[test]
    fn test_inline_fixed_len_values() {
        let temp_dir = tempfile::tempdir().unwrap();
        let directory = FsDirectory::open(temp_dir.path()).unwrap();
        let mut writer = open_fixed_len_writer(&directory);
        let first = writer.dump(false, false, false, 1, 0, 0, &[1, 2, 3, 4]).unwrap();
        let second = writer.dump(false, true, false, 2, 0, 0, b"").unwrap();
        let third = writer.dump(false, false, true, 3, 0, 0, &[5, 6, 7, 8]).unwrap();
        writer.close().unwrap();

        // node(5) + value(4), no length prefix
        assert_eq!(first, ItemOffset::new(0, 0));
        assert_eq!(second, ItemOffset::new(0, 9));
        assert_eq!(third, ItemOffset::new(0, 14));
        assert_eq!(writer.max_value_len(), 4);

        let mut reader = ChunkReader::new(directory.open_file_reader("skey").unwrap(), 0);
        let chunk = reader.load_chunk(0).unwrap();
        assert_eq!(chunk.len(), 23);
        assert_eq!(&chunk[5..9], &[1, 2, 3, 4]);
        assert!(InlineSKeyNode::<u32>::decode(&chunk[9..]).is_skey_deleted());
        let node = InlineSKeyNode::<u32>::decode(&chunk[14..]);
        assert!(node.has_value() && node.is_last_node());
        assert_eq!(node.skey(), 3);
        assert_eq!(&chunk[19..23], &[5, 6, 7, 8]);
    }

    #[test]
    #[should_panic(expected = "fixed-length value size mismatch")]
    fn test_inline_fixed_len_mismatch() {
        let temp_dir = tempfile::tempdir().unwrap();
        let directory = FsDirectory::open(temp_dir.path()).unwrap();
        let mut writer = open_fixed_len_writer(&directory);
        let _ = writer.dump(false, false, true, 1, 0, 0, &[1, 2, 3]);
    }

    #[test]
    fn test_normal_writer_without_ts() {
        let temp_dir = tempfile::tempdir().unwrap();
        let directory = FsDirectory::open(temp_dir.path()).unwrap();
        let mut writer = NormalSKeyWriter::<u64>::open(
            &directory,
            "skey",
            &WriterOptions::default(),
            0,
            false,
            false,
        )
        .unwrap();
        let value_offset = ValueOffset::new(64, 3);
        writer.dump(false, false, false, 7, 1, 1, value_offset).unwrap();
        writer.dump(false, false, false, 8, 1, 1, value_offset).unwrap();
        writer.dump(false, false, true, 9, 1, 1, value_offset).unwrap();
        writer.dump(false, true, true, 3, 1, 1, ValueOffset::invalid()).unwrap();
        writer.close().unwrap();
        assert_eq!(writer.total_skey_count(), 4);
        assert_eq!(writer.max_skey_count(), 3);

        let mut reader = ChunkReader::new(directory.open_file_reader("skey").unwrap(), 0);
        let chunk = reader.load_chunk(0).unwrap();
        assert_eq!(chunk.len(), 4 * 14);
        let node = NormalSKeyNode::<u64>::decode(&chunk[28..]);
        assert_eq!(node.skey(), 9);
        assert_eq!(node.value_offset(), Some(value_offset));
        let node = NormalSKeyNode::<u64>::decode(&chunk[42..]);
        assert!(node.is_skey_deleted());
    }
}
