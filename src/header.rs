//! The 4096 byte preamble of a history tree file.

use crate::{
    error::{DecodeError, Result},
    layout::{self, tree_header, TREE_HEADER_SIZE},
    node::SeqNumber,
};

/// Magic number written by the history tree writer.
pub const HF_MAGIC_NUMBER: u32 = 0x05ff_a900;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TreeHeader {
    pub magic: u32,
    pub major: u32,
    pub minor: u32,
    pub block_size: u32,
    pub max_children: u32,
    pub node_count: u32,
    pub root_seq: SeqNumber,
}

impl TreeHeader {
    /// Reads the header from the start of `data`.
    ///
    /// Magic and version are reported as found, not checked:
    /// files with unexpected values are still worth inspecting.
    pub fn read(data: &[u8]) -> Result<Self> {
        if data.len() < TREE_HEADER_SIZE {
            return Err(DecodeError::TruncatedInput {
                field: "tree header",
                needed: TREE_HEADER_SIZE,
                available: data.len(),
            });
        }
        let data = &data[..TREE_HEADER_SIZE];
        Ok(TreeHeader {
            magic: tree_header::MAGIC.read(data)?,
            major: tree_header::MAJOR.read(data)?,
            minor: tree_header::MINOR.read(data)?,
            block_size: tree_header::BLOCK_SIZE.read(data)?,
            max_children: tree_header::MAX_CHILDREN.read(data)?,
            node_count: tree_header::NODE_COUNT.read(data)?,
            root_seq: tree_header::ROOT_SEQ.read(data)?.into(),
        })
    }

    pub fn has_expected_magic(&self) -> bool {
        self.magic == HF_MAGIC_NUMBER
    }

    /// Byte range of block `index` within the file, or `None` if it can't be addressed.
    pub fn block_range(&self, index: u32) -> Option<std::ops::Range<usize>> {
        let start = layout::block_offset(self.block_size, index)?;
        Some(start..start.checked_add(self.block_size as usize)?)
    }

    /// Bytes the whole file needs to hold `node_count` blocks.
    pub fn expected_len(&self) -> Option<usize> {
        layout::block_offset(self.block_size, self.node_count)
    }
}
