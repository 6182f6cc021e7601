//! Secondary key nodes.
//!
//! Every record of a pkey group is written to the skey file as a fixed-size node,
//! optionally followed by the record's timestamp and expire time:
//!
//! ```text
//! +---------------------------------------------------+
//! | node meta | skey | ts (opt) | expire time (opt)   | ...
//! +---------------------------------------------------+
//!              \----/\---------/\-------------------/
//!              S::WIDTH   u32           u32
//! ```
//!
//! Two node encodings exist, see [InlineSKeyNode] and [NormalSKeyNode]. A table uses
//! one of them for its whole lifetime.

use crate::options::FieldType;
use std::fmt::Debug;

mod node;
mod writer;

pub use node::{
    InlineSKeyNode, NodeStatus, NormalSKeyNode, SKeyNode, MAX_VALUE_CHUNK_OFFSET,
    NORMAL_NODE_META_SIZE,
};
pub use writer::{InlineSKeyWriter, NormalSKeyWriter, SKeyWriter};

/// Fixed-width integer a skey is stored as.
///
/// Records carry skeys as raw `u64`: unsigned keys zero-extended, signed keys
/// sign-extended, string keys hashed.
pub trait SKeyType: Copy + Debug + PartialEq + Send + 'static {
    const WIDTH: usize;
    const FIELD_TYPE: FieldType;

    fn from_raw(raw: u64) -> Self;
    fn to_raw(self) -> u64;
    fn write_le(self, buf: &mut Vec<u8>);
    /// `bytes` holds at least `WIDTH` bytes.
    fn read_le(bytes: &[u8]) -> Self;
}

macro_rules! impl_skey_type {
    ($($t:ty => $field_type:expr),* $(,)?) => {
        $(
            impl SKeyType for $t {
                const WIDTH: usize = std::mem::size_of::<$t>();
                const FIELD_TYPE: FieldType = $field_type;

                #[inline]
                fn from_raw(raw: u64) -> Self {
                    raw as $t
                }

                #[inline]
                fn to_raw(self) -> u64 {
                    self as i64 as u64
                }

                #[inline]
                fn write_le(self, buf: &mut Vec<u8>) {
                    buf.extend_from_slice(&self.to_le_bytes());
                }

                #[inline]
                fn read_le(bytes: &[u8]) -> Self {
                    let mut buf = [0u8; std::mem::size_of::<$t>()];
                    buf.copy_from_slice(&bytes[..Self::WIDTH]);
                    <$t>::from_le_bytes(buf)
                }
            }
        )*
    };
}

impl_skey_type!(
    i8 => FieldType::Int8,
    i16 => FieldType::Int16,
    i32 => FieldType::Int32,
    i64 => FieldType::Int64,
    u8 => FieldType::UInt8,
    u16 => FieldType::UInt16,
    u32 => FieldType::UInt32,
    u64 => FieldType::UInt64,
);
