//! Byte layout of a history tree file.
//!
//! Every offset the decoder uses comes from here. Offsets inside a block depend on the node kind
//! and on the tree-wide `max_children`, which sizes the two fixed-capacity children arrays of core nodes:
//!
//! ```text
//! common header   [0..34)
//! core header     [34..42)                       extended: u32, children_count: u32
//! child seqs      [42..42 + 4 * max_children)
//! child starts    [42 + 4 * max_children..42 + 12 * max_children)
//! intervals       core: 42 + 12 * max_children, leaf: 34; 25 bytes each
//! ```
//!
//! All arithmetic is checked: `None` means the offset does not fit in `usize`,
//! which callers report the same way as a region past the end of the buffer.

use std::marker::PhantomData;

use enum_dispatch::enum_dispatch;

use crate::{
    error::{DecodeError, Result},
    node::NodeKind,
};

/// Size of the file preamble holding the [crate::header::TreeHeader].
pub const TREE_HEADER_SIZE: usize = 4096;
pub const COMMON_HEADER_SIZE: usize = 34;
/// `extended` + `children_count`.
pub const CORE_HEADER_SIZE: usize = 8;
pub const CHILDREN_BASE: usize = COMMON_HEADER_SIZE + CORE_HEADER_SIZE;
pub const CHILD_SEQ_STRIDE: usize = 4;
pub const CHILD_START_STRIDE: usize = 8;
pub const INTERVAL_RECORD_SIZE: usize = 25;

/// A little endian integer at a fixed offset.
pub struct Field<T> {
    name: &'static str,
    offset: usize,
    _phantom: PhantomData<T>,
}

impl<T> Clone for Field<T> {
    fn clone(&self) -> Self {
        Self::at_offset(self.name, self.offset)
    }
}

impl<T> Copy for Field<T> {}

impl<T> Field<T> {
    pub const fn at_offset(name: &'static str, offset: usize) -> Self {
        Self {
            name,
            offset,
            _phantom: PhantomData,
        }
    }

    pub const fn offset(&self) -> usize {
        self.offset
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Same field, relative to `base` instead of the start of the buffer.
    pub fn shifted(&self, base: usize) -> Option<Self> {
        Some(Self::at_offset(self.name, base.checked_add(self.offset)?))
    }
}

/// Borrows `len` bytes at `offset`, or reports which field ran past the end.
pub fn region<'a>(
    storage: &'a [u8],
    field: &'static str,
    offset: usize,
    len: usize,
) -> Result<&'a [u8]> {
    match offset.checked_add(len) {
        Some(end) if end <= storage.len() => Ok(&storage[offset..end]),
        end => Err(DecodeError::TruncatedInput {
            field,
            needed: end.unwrap_or(usize::MAX),
            available: storage.len(),
        }),
    }
}

/// Turns an overflowed offset computation into the error a too-short buffer would produce.
pub fn checked(field: &'static str, offset: Option<usize>, storage: &[u8]) -> Result<usize> {
    offset.ok_or(DecodeError::TruncatedInput {
        field,
        needed: usize::MAX,
        available: storage.len(),
    })
}

macro_rules! int_field {
    ($type:ident) => {
        impl Field<$type> {
            pub const fn size() -> usize {
                std::mem::size_of::<$type>()
            }

            pub fn read(&self, storage: &[u8]) -> Result<$type> {
                let bytes = region(storage, self.name, self.offset, Self::size())?;
                let mut value = [0; std::mem::size_of::<$type>()];
                value.copy_from_slice(bytes);
                Ok($type::from_le_bytes(value))
            }

            pub fn write(&self, storage: &mut [u8], value: $type) -> Result<()> {
                region(storage, self.name, self.offset, Self::size())?;
                storage[self.offset..(self.offset + Self::size())]
                    .copy_from_slice(&value.to_le_bytes());
                Ok(())
            }
        }
    };
}

int_field!(u8);
int_field!(u32);

/// Fields of the file preamble.
pub mod tree_header {
    use super::Field;

    pub const MAGIC: Field<u32> = Field::at_offset("magic", 0);
    pub const MAJOR: Field<u32> = Field::at_offset("major", 4);
    pub const MINOR: Field<u32> = Field::at_offset("minor", 8);
    pub const BLOCK_SIZE: Field<u32> = Field::at_offset("block size", 12);
    pub const MAX_CHILDREN: Field<u32> = Field::at_offset("max children", 16);
    pub const NODE_COUNT: Field<u32> = Field::at_offset("node count", 20);
    pub const ROOT_SEQ: Field<u32> = Field::at_offset("root seq number", 24);
}

/// Fields present in every block.
///
/// `start` and `end` occupy 8 bytes each on disk; only their low 4 bytes are read.
pub mod common {
    use super::Field;

    pub const TYPE_TAG: Field<u8> = Field::at_offset("type", 0);
    pub const START: Field<u32> = Field::at_offset("start", 1);
    pub const END: Field<u32> = Field::at_offset("end", 9);
    pub const SEQ_NUMBER: Field<u32> = Field::at_offset("seq number", 17);
    pub const PARENT_SEQ_NUMBER: Field<u32> = Field::at_offset("parent seq number", 21);
    pub const INTERVAL_COUNT: Field<u32> = Field::at_offset("interval count", 25);
    pub const VAR_DATA_OFFSET: Field<u32> = Field::at_offset("var data offset", 29);
    pub const DONE: Field<u8> = Field::at_offset("done", 33);
}

/// Fields only core nodes carry.
pub mod core_node {
    use super::Field;

    pub const EXTENDED: Field<u32> = Field::at_offset("extended", 34);
    pub const CHILDREN_COUNT: Field<u32> = Field::at_offset("children count", 38);
}

/// Fields of an interval record, relative to the record.
pub mod interval {
    use super::Field;

    pub const START: Field<u32> = Field::at_offset("interval start", 0);
    pub const END: Field<u32> = Field::at_offset("interval end", 8);
    pub const ATTRIBUTE: Field<u32> = Field::at_offset("interval attribute", 16);
    pub const VALUE_TYPE: Field<u8> = Field::at_offset("interval value type", 20);
    pub const VALUE: Field<u32> = Field::at_offset("interval value", 21);
}

/// Offset of the `index`th child's sequence number.
pub fn child_seq_offset(index: u32) -> Option<usize> {
    CHILDREN_BASE.checked_add((index as usize).checked_mul(CHILD_SEQ_STRIDE)?)
}

/// Offset of the `index`th child's start; the array follows all `max_children` sequence numbers.
pub fn child_start_offset(max_children: u32, index: u32) -> Option<usize> {
    let base = child_seq_offset(max_children)?;
    base.checked_add((index as usize).checked_mul(CHILD_START_STRIDE)?)
}

/// Where the interval records of a `kind` block begin. `None` for kinds without intervals.
pub fn intervals_base(kind: NodeKind, max_children: u32) -> Option<usize> {
    NodeLayout::from(kind).intervals_base(max_children)
}

/// Offset of the `index`th interval record.
pub fn interval_offset(kind: NodeKind, max_children: u32, index: u32) -> Option<usize> {
    intervals_base(kind, max_children)?
        .checked_add((index as usize).checked_mul(INTERVAL_RECORD_SIZE)?)
}

/// The part of the layout which differs between node kinds.
#[enum_dispatch]
pub trait BlockLayout {
    /// Bytes between the common header and the interval records.
    /// `None` when the kind has no known layout past the common header.
    fn specific_header_len(&self, max_children: u32) -> Option<usize>;

    /// Number of slots in the children arrays.
    fn children_capacity(&self, max_children: u32) -> u32;

    fn intervals_base(&self, max_children: u32) -> Option<usize> {
        COMMON_HEADER_SIZE.checked_add(self.specific_header_len(max_children)?)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CoreLayout;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LeafLayout;

/// Unrecognized type tag: only the common header can be trusted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpaqueLayout;

impl BlockLayout for CoreLayout {
    fn specific_header_len(&self, max_children: u32) -> Option<usize> {
        let arrays = (max_children as usize).checked_mul(CHILD_SEQ_STRIDE + CHILD_START_STRIDE)?;
        CORE_HEADER_SIZE.checked_add(arrays)
    }

    fn children_capacity(&self, max_children: u32) -> u32 {
        max_children
    }
}

impl BlockLayout for LeafLayout {
    fn specific_header_len(&self, _max_children: u32) -> Option<usize> {
        Some(0)
    }

    fn children_capacity(&self, _max_children: u32) -> u32 {
        0
    }
}

impl BlockLayout for OpaqueLayout {
    fn specific_header_len(&self, _max_children: u32) -> Option<usize> {
        None
    }

    fn children_capacity(&self, _max_children: u32) -> u32 {
        0
    }
}

#[enum_dispatch(BlockLayout)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeLayout {
    CoreLayout,
    LeafLayout,
    OpaqueLayout,
}

impl From<NodeKind> for NodeLayout {
    fn from(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Core => CoreLayout.into(),
            NodeKind::Leaf => LeafLayout.into(),
            NodeKind::Unknown(_) => OpaqueLayout.into(),
        }
    }
}

/// Offset of block `index` in the file.
pub fn block_offset(block_size: u32, index: u32) -> Option<usize> {
    TREE_HEADER_SIZE.checked_add((index as usize).checked_mul(block_size as usize)?)
}
