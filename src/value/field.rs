use crate::options::{FieldSchema, FieldType};
use crate::varint::{decode_count, encode_count, MAX_COUNT_BYTES};
use std::cmp::Ordering;

/// Bytes of field `index` inside a packed value, `None` if the value is malformed.
pub fn locate_field<'a>(fields: &[FieldSchema], value: &'a [u8], index: usize) -> Option<&'a [u8]> {
    let mut pos = 0;
    for (i, field) in fields.iter().enumerate() {
        let len = match field.packed_width() {
            Some(width) => width,
            None => {
                let (count, header_len) = decode_count(value.get(pos..)?).ok()?;
                pos += header_len;
                count as usize * field.field_type.fixed_width().unwrap_or(1)
            }
        };
        if i == index {
            return value.get(pos..pos + len);
        }
        pos += len;
    }
    None
}

macro_rules! cmp_le {
    ($t:ty, $lhs:expr, $rhs:expr) => {{
        let mut l = [0u8; std::mem::size_of::<$t>()];
        let mut r = [0u8; std::mem::size_of::<$t>()];
        l.copy_from_slice($lhs);
        r.copy_from_slice($rhs);
        <$t>::from_le_bytes(l).cmp(&<$t>::from_le_bytes(r))
    }};
}

macro_rules! cmp_float_le {
    ($t:ty, $lhs:expr, $rhs:expr) => {{
        let mut l = [0u8; std::mem::size_of::<$t>()];
        let mut r = [0u8; std::mem::size_of::<$t>()];
        l.copy_from_slice($lhs);
        r.copy_from_slice($rhs);
        <$t>::from_le_bytes(l).total_cmp(&<$t>::from_le_bytes(r))
    }};
}

/// Compare two single-value numeric fields of type `field_type`.
pub fn compare_field(field_type: FieldType, lhs: &[u8], rhs: &[u8]) -> Ordering {
    match field_type {
        FieldType::Int8 => cmp_le!(i8, lhs, rhs),
        FieldType::Int16 => cmp_le!(i16, lhs, rhs),
        FieldType::Int32 => cmp_le!(i32, lhs, rhs),
        FieldType::Int64 => cmp_le!(i64, lhs, rhs),
        FieldType::UInt8 => cmp_le!(u8, lhs, rhs),
        FieldType::UInt16 => cmp_le!(u16, lhs, rhs),
        FieldType::UInt32 => cmp_le!(u32, lhs, rhs),
        FieldType::UInt64 => cmp_le!(u64, lhs, rhs),
        FieldType::Float => cmp_float_le!(f32, lhs, rhs),
        FieldType::Double => cmp_float_le!(f64, lhs, rhs),
        FieldType::String => lhs.cmp(rhs),
    }
}

/// Builds a packed value field by field.
#[derive(Default)]
pub struct PackedValueBuilder {
    buf: Vec<u8>,
}

impl PackedValueBuilder {
    pub fn new() -> PackedValueBuilder {
        PackedValueBuilder::default()
    }

    /// Single-value numeric field, already little-endian.
    pub fn push_fixed(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    /// String or multi-value field of `count` elements.
    pub fn push_var(&mut self, count: u32, elements: &[u8]) -> &mut Self {
        let mut header = [0u8; MAX_COUNT_BYTES];
        let header_len = encode_count(count, &mut header);
        self.buf.extend_from_slice(&header[..header_len]);
        self.buf.extend_from_slice(elements);
        self
    }

    pub fn push_str(&mut self, s: &str) -> &mut Self {
        self.push_var(s.len() as u32, s.as_bytes())
    }

    pub fn build(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }
}
