//! Records handed to a dumper, and their compact form used while sorting.

use crate::value::ValueOffset;
use std::ops::{Index, IndexMut};

pub const UNINITIALIZED_EXPIRE_TIME: u32 = u32::MAX;

pub type Value = Vec<u8>;

#[derive(Clone, Debug, PartialEq)]
pub enum DocValue {
    None,
    Bytes(Value),
    /// Value already written to the value file of the table being dumped.
    Offset(ValueOffset),
}

/// One skey record of a pkey group.
#[derive(Clone, Debug, PartialEq)]
pub struct KKVDoc {
    /// Raw skey, see [crate::skey::SKeyType].
    pub skey: u64,
    pub timestamp: u32,
    pub expire_time: u32,
    pub skey_deleted: bool,
    pub duplicated_key: bool,
    pub in_cache: bool,
    pub value: DocValue,
}

impl KKVDoc {
    pub fn new(skey: u64, timestamp: u32, value: Value) -> KKVDoc {
        KKVDoc {
            skey,
            timestamp,
            expire_time: UNINITIALIZED_EXPIRE_TIME,
            skey_deleted: false,
            duplicated_key: false,
            in_cache: false,
            value: DocValue::Bytes(value),
        }
    }

    pub fn with_value_offset(skey: u64, timestamp: u32, value_offset: ValueOffset) -> KKVDoc {
        KKVDoc {
            value: DocValue::Offset(value_offset),
            ..KKVDoc::new(skey, timestamp, Value::new())
        }
    }

    pub fn deleted_skey(skey: u64, timestamp: u32) -> KKVDoc {
        KKVDoc {
            skey_deleted: true,
            value: DocValue::None,
            ..KKVDoc::new(skey, timestamp, Value::new())
        }
    }

    /// Record of a whole pkey deletion, dumped with `is_deleted_pkey` set.
    pub fn deleted_pkey(timestamp: u32) -> KKVDoc {
        KKVDoc {
            value: DocValue::None,
            ..KKVDoc::new(0, timestamp, Value::new())
        }
    }

    pub fn expire_at(mut self, expire_time: u32) -> KKVDoc {
        self.expire_time = expire_time;
        self
    }

    #[inline]
    pub fn has_expire_time(&self) -> bool {
        self.expire_time != UNINITIALIZED_EXPIRE_TIME
    }

    /// Raw value bytes, empty unless the value is [DocValue::Bytes].
    pub fn value_bytes(&self) -> &[u8] {
        match &self.value {
            DocValue::Bytes(v) => v,
            _ => &[],
        }
    }
}

/// Sort view of a buffered [KKVDoc]. The value is referred to by `doc_id`, the index
/// of the doc in the batch the info was collected from.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SKeyCollectInfo {
    pub skey: u64,
    pub ts: u32,
    pub expire_time: u32,
    pub is_deleted_pkey: bool,
    pub is_deleted_skey: bool,
    pub doc_id: usize,
}

impl SKeyCollectInfo {
    pub fn fill(&mut self, is_deleted_pkey: bool, doc: &KKVDoc, doc_id: usize) {
        self.skey = doc.skey;
        self.ts = doc.timestamp;
        self.expire_time = doc.expire_time;
        self.is_deleted_pkey = is_deleted_pkey;
        self.is_deleted_skey = !is_deleted_pkey && doc.skey_deleted;
        self.doc_id = doc_id;
    }

    #[inline]
    pub fn value<'a>(&self, docs: &'a [KKVDoc]) -> &'a [u8] {
        docs[self.doc_id].value_bytes()
    }
}

/// Reusable infos of one pkey group. Slots are kept across [SKeyCollectInfoPool::reset].
#[derive(Default)]
pub struct SKeyCollectInfoPool {
    infos: Vec<SKeyCollectInfo>,
    cursor: usize,
}

impl SKeyCollectInfoPool {
    /// Index of a free slot.
    pub fn allocate(&mut self) -> usize {
        if self.cursor == self.infos.len() {
            self.infos.push(SKeyCollectInfo::default());
        }
        self.cursor += 1;
        self.cursor - 1
    }

    #[inline]
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cursor
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cursor == 0
    }

    /// Slots allocated so far, used or not.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.infos.len()
    }
}

impl Index<usize> for SKeyCollectInfoPool {
    type Output = SKeyCollectInfo;

    fn index(&self, index: usize) -> &Self::Output {
        debug_assert!(index < self.cursor);
        &self.infos[index]
    }
}

impl IndexMut<usize> for SKeyCollectInfoPool {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        debug_assert!(index < self.cursor);
        &mut self.infos[index]
    }
}
