//! Table level options of a KKV index.

/// Reserved sort field name selecting the record timestamp.
pub const TIMESTAMP_SORT_FIELD: &str = "$TIME_STAMP";

pub const DEFAULT_WRITE_BUFFER_SIZE: usize = 64 * 1024;

/// Buffering hints for a single output file.
#[derive(Clone, Debug)]
pub struct WriterOptions {
    pub buffer_size: usize,
    /// Call `sync_data` when the file is closed.
    pub sync_on_close: bool,
}

impl Default for WriterOptions {
    fn default() -> Self {
        WriterOptions {
            buffer_size: DEFAULT_WRITE_BUFFER_SIZE,
            sync_on_close: false,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FieldType {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float,
    Double,
    String,
}

impl FieldType {
    /// Byte width of one element, `None` for strings.
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            FieldType::Int8 | FieldType::UInt8 => Some(1),
            FieldType::Int16 | FieldType::UInt16 => Some(2),
            FieldType::Int32 | FieldType::UInt32 | FieldType::Float => Some(4),
            FieldType::Int64 | FieldType::UInt64 | FieldType::Double => Some(8),
            FieldType::String => None,
        }
    }

    #[inline]
    pub fn is_numeric(self) -> bool {
        self != FieldType::String
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldSchema {
    pub name: String,
    pub field_type: FieldType,
    pub multi_value: bool,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> FieldSchema {
        FieldSchema {
            name: name.into(),
            field_type,
            multi_value: false,
        }
    }

    pub fn multi(name: impl Into<String>, field_type: FieldType) -> FieldSchema {
        FieldSchema {
            name: name.into(),
            field_type,
            multi_value: true,
        }
    }

    /// Width of the packed field when it does not need a count prefix.
    pub fn packed_width(&self) -> Option<usize> {
        if self.multi_value {
            None
        } else {
            self.field_type.fixed_width()
        }
    }
}

/// Layout of the value part of a record.
///
/// A value is the concatenation of its fields in declaration order. Single-value
/// numeric fields are stored as little-endian fixed-width numbers, strings and
/// multi-value fields as a count prefix (see [crate::varint]) followed by the
/// elements.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValueConfig {
    pub fields: Vec<FieldSchema>,
    /// Length of every value in bytes, `0` for variable-length values.
    pub fixed_len: usize,
}

impl ValueConfig {
    /// Derives `fixed_len` from `fields`: fixed only when no field needs a count prefix.
    pub fn from_fields(fields: Vec<FieldSchema>) -> ValueConfig {
        let fixed_len = fields
            .iter()
            .map(FieldSchema::packed_width)
            .sum::<Option<usize>>()
            .unwrap_or(0);
        ValueConfig { fields, fixed_len }
    }

    pub fn var_len() -> ValueConfig {
        ValueConfig::default()
    }

    #[inline]
    pub fn is_fixed_len(&self) -> bool {
        self.fixed_len > 0
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl Default for SortOrder {
    fn default() -> Self {
        SortOrder::Ascending
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SortParam {
    pub field: String,
    pub order: SortOrder,
}

impl SortParam {
    pub fn new(field: impl Into<String>, order: SortOrder) -> SortParam {
        SortParam {
            field: field.into(),
            order,
        }
    }

    pub fn timestamp(order: SortOrder) -> SortParam {
        SortParam::new(TIMESTAMP_SORT_FIELD, order)
    }
}

#[derive(Clone, Debug)]
pub struct KKVIndexConfig {
    /// String skeys are stored as their 64-bit hash.
    pub skey_field: FieldSchema,
    pub value: ValueConfig,
    pub store_ts: bool,
    pub store_expire_time: bool,
    /// Store values right after their skey node instead of in a separate value file.
    pub value_inline: bool,
    /// Max valid skeys kept for one pkey, `None` means unlimited.
    pub skey_count_limit: Option<u32>,
    pub sort_params: Vec<SortParam>,
    pub keep_sort_sequence: bool,
    pub skey_order: SortOrder,
    pub skey_chunk_align_bit: u8,
}

impl Default for KKVIndexConfig {
    fn default() -> Self {
        KKVIndexConfig {
            skey_field: FieldSchema::new("skey", FieldType::UInt64),
            value: ValueConfig::var_len(),
            store_ts: true,
            store_expire_time: false,
            value_inline: false,
            skey_count_limit: None,
            sort_params: vec![],
            keep_sort_sequence: false,
            skey_order: SortOrder::Ascending,
            skey_chunk_align_bit: 0,
        }
    }
}
