use crate::skey::SKeyType;
use crate::value::{ValueOffset, VALUE_CHUNK_ALIGN_BIT};

/// Node of one skey record.
pub trait SKeyNode<S: SKeyType>: Sized {
    /// Encoded size in bytes.
    const SIZE: usize;

    fn encode(&self, buf: &mut Vec<u8>);
    /// `bytes` holds at least `SIZE` bytes.
    fn decode(bytes: &[u8]) -> Self;

    fn skey(&self) -> S;
    /// Last node of its pkey group.
    fn is_last_node(&self) -> bool;
    fn is_pkey_deleted(&self) -> bool;
    fn is_skey_deleted(&self) -> bool;
    fn has_value(&self) -> bool;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NodeStatus {
    Invalid = 0,
    SKeyDeleted = 1,
    PKeyDeleted = 2,
    HasValue = 3,
}

impl NodeStatus {
    fn from_bits(bits: u8) -> NodeStatus {
        match bits & 0b11 {
            1 => NodeStatus::SKeyDeleted,
            2 => NodeStatus::PKeyDeleted,
            3 => NodeStatus::HasValue,
            _ => NodeStatus::Invalid,
        }
    }
}

/// Node of a table whose values follow their node in the skey file.
///
/// ```text
/// +---------------------------------------------+
/// | status | last node | reserved | skey        |
/// +---------------------------------------------+
/// \--------/\----------/\---------/\-----------/
///   2 bits     1 bit      5 bits    S::WIDTH
/// ```
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct InlineSKeyNode<S: SKeyType> {
    pub status: NodeStatus,
    pub last_node: bool,
    pub skey: S,
}

impl<S: SKeyType> InlineSKeyNode<S> {
    pub fn of(skey: S, last_node: bool) -> Self {
        InlineSKeyNode {
            status: NodeStatus::HasValue,
            last_node,
            skey,
        }
    }

    pub fn skey_deleted_node(skey: S, last_node: bool) -> Self {
        InlineSKeyNode {
            status: NodeStatus::SKeyDeleted,
            last_node,
            skey,
        }
    }

    pub fn pkey_deleted_node(skey: S, last_node: bool) -> Self {
        InlineSKeyNode {
            status: NodeStatus::PKeyDeleted,
            last_node,
            skey,
        }
    }
}

impl<S: SKeyType> SKeyNode<S> for InlineSKeyNode<S> {
    const SIZE: usize = 1 + S::WIDTH;

    fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(self.status as u8 | (self.last_node as u8) << 2);
        self.skey.write_le(buf);
    }

    fn decode(bytes: &[u8]) -> Self {
        InlineSKeyNode {
            status: NodeStatus::from_bits(bytes[0]),
            last_node: bytes[0] & 0b100 != 0,
            skey: S::read_le(&bytes[1..]),
        }
    }

    #[inline]
    fn skey(&self) -> S {
        self.skey
    }

    #[inline]
    fn is_last_node(&self) -> bool {
        self.last_node
    }

    #[inline]
    fn is_pkey_deleted(&self) -> bool {
        self.status == NodeStatus::PKeyDeleted
    }

    #[inline]
    fn is_skey_deleted(&self) -> bool {
        self.status == NodeStatus::SKeyDeleted
    }

    #[inline]
    fn has_value(&self) -> bool {
        self.status == NodeStatus::HasValue
    }
}

const NORMAL_CHUNK_OFFSET_BITS: u32 = 35;
const NORMAL_IN_CHUNK_OFFSET_BITS: u32 = 12;
const NORMAL_CHUNK_OFFSET_MASK: u64 = (1 << NORMAL_CHUNK_OFFSET_BITS) - 1;
const NORMAL_IN_CHUNK_OFFSET_MASK: u64 = (1 << NORMAL_IN_CHUNK_OFFSET_BITS) - 1;
const NORMAL_LAST_NODE_SHIFT: u32 = NORMAL_CHUNK_OFFSET_BITS + NORMAL_IN_CHUNK_OFFSET_BITS;

const INVALID_CHUNK_OFFSET: u64 = NORMAL_CHUNK_OFFSET_MASK;
const SKEY_DELETED_CHUNK_OFFSET: u64 = INVALID_CHUNK_OFFSET - 1;
const PKEY_DELETED_CHUNK_OFFSET: u64 = INVALID_CHUNK_OFFSET - 2;
/// Largest value chunk offset (shifted by [VALUE_CHUNK_ALIGN_BIT]) a normal node holds.
pub const MAX_VALUE_CHUNK_OFFSET: u64 = INVALID_CHUNK_OFFSET - 3;

pub const NORMAL_NODE_META_SIZE: usize = 6;

/// Node of a table whose values live in a separate value file.
///
/// ```text
/// +----------------------------------------------------+
/// | chunk offset | in chunk offset | last node | skey  |
/// +----------------------------------------------------+
/// \-------------/\----------------/\----------/\-------/
///     35 bits         12 bits         1 bit    S::WIDTH
/// ```
///
/// The chunk offset is the value chunk's file offset shifted right by
/// [VALUE_CHUNK_ALIGN_BIT]. Two values above [MAX_VALUE_CHUNK_OFFSET] mark skey
/// and pkey tombstones.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct NormalSKeyNode<S: SKeyType> {
    chunk_offset: u64,
    in_chunk_offset: u64,
    last_node: bool,
    skey: S,
}

impl<S: SKeyType> NormalSKeyNode<S> {
    pub fn of(skey: S, value_offset: ValueOffset, last_node: bool) -> Self {
        assert!(value_offset.is_valid(), "invalid value offset for skey {:?}", skey);
        let chunk_offset = value_offset.chunk_offset();
        debug_assert_eq!(chunk_offset & ((1 << VALUE_CHUNK_ALIGN_BIT) - 1), 0);
        let chunk_offset = chunk_offset >> VALUE_CHUNK_ALIGN_BIT;
        assert!(
            chunk_offset <= MAX_VALUE_CHUNK_OFFSET,
            "value chunk offset {} out of range",
            chunk_offset
        );
        NormalSKeyNode {
            chunk_offset,
            in_chunk_offset: value_offset.in_chunk_offset(),
            last_node,
            skey,
        }
    }

    pub fn skey_deleted_node(skey: S, last_node: bool) -> Self {
        NormalSKeyNode {
            chunk_offset: SKEY_DELETED_CHUNK_OFFSET,
            in_chunk_offset: 0,
            last_node,
            skey,
        }
    }

    pub fn pkey_deleted_node(skey: S, last_node: bool) -> Self {
        NormalSKeyNode {
            chunk_offset: PKEY_DELETED_CHUNK_OFFSET,
            in_chunk_offset: 0,
            last_node,
            skey,
        }
    }

    /// Location of the value in the value file.
    pub fn value_offset(&self) -> Option<ValueOffset> {
        if self.has_value() {
            Some(ValueOffset::new(
                self.chunk_offset << VALUE_CHUNK_ALIGN_BIT,
                self.in_chunk_offset,
            ))
        } else {
            None
        }
    }
}

impl<S: SKeyType> SKeyNode<S> for NormalSKeyNode<S> {
    const SIZE: usize = NORMAL_NODE_META_SIZE + S::WIDTH;

    fn encode(&self, buf: &mut Vec<u8>) {
        let meta = self.chunk_offset & NORMAL_CHUNK_OFFSET_MASK
            | (self.in_chunk_offset & NORMAL_IN_CHUNK_OFFSET_MASK) << NORMAL_CHUNK_OFFSET_BITS
            | (self.last_node as u64) << NORMAL_LAST_NODE_SHIFT;
        buf.extend_from_slice(&meta.to_le_bytes()[..NORMAL_NODE_META_SIZE]);
        self.skey.write_le(buf);
    }

    fn decode(bytes: &[u8]) -> Self {
        let mut meta = [0u8; 8];
        meta[..NORMAL_NODE_META_SIZE].copy_from_slice(&bytes[..NORMAL_NODE_META_SIZE]);
        let meta = u64::from_le_bytes(meta);
        NormalSKeyNode {
            chunk_offset: meta & NORMAL_CHUNK_OFFSET_MASK,
            in_chunk_offset: (meta >> NORMAL_CHUNK_OFFSET_BITS) & NORMAL_IN_CHUNK_OFFSET_MASK,
            last_node: (meta >> NORMAL_LAST_NODE_SHIFT) & 1 == 1,
            skey: S::read_le(&bytes[NORMAL_NODE_META_SIZE..]),
        }
    }

    #[inline]
    fn skey(&self) -> S {
        self.skey
    }

    #[inline]
    fn is_last_node(&self) -> bool {
        self.last_node
    }

    #[inline]
    fn is_pkey_deleted(&self) -> bool {
        self.chunk_offset == PKEY_DELETED_CHUNK_OFFSET
    }

    #[inline]
    fn is_skey_deleted(&self) -> bool {
        self.chunk_offset == SKEY_DELETED_CHUNK_OFFSET
    }

    #[inline]
    fn has_value(&self) -> bool {
        self.chunk_offset <= MAX_VALUE_CHUNK_OFFSET
    }
}
