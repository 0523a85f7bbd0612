//! Walking all node blocks of a history tree file in storage order.

use crate::{
    error::{DecodeError, Result},
    header::TreeHeader,
    node::{decode_block, DecodedNode, NodeRecord},
};

/// A whole history tree file held in memory.
#[derive(Clone, Copy)]
pub struct HistoryFile<'a> {
    header: TreeHeader,
    data: &'a [u8],
}

impl<'a> HistoryFile<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let header = TreeHeader::read(data)?;
        if let Some(expected) = header.expected_len() {
            if data.len() > expected {
                log::debug!(
                    "ignoring {} trailing bytes after block {}",
                    data.len() - expected,
                    header.node_count
                );
            }
        }
        Ok(HistoryFile { header, data })
    }

    pub fn header(&self) -> &TreeHeader {
        &self.header
    }

    /// Raw bytes of block `index`.
    pub fn block(&self, index: u32) -> Result<&'a [u8]> {
        let available = self.data.len();
        match self.header.block_range(index) {
            Some(range) if range.end <= available => Ok(&self.data[range]),
            range => Err(DecodeError::TruncatedInput {
                field: "block",
                needed: range.map_or(usize::MAX, |r| r.end),
                available,
            }),
        }
    }

    /// Number of complete blocks the file actually holds, regardless of `node_count`.
    pub fn stored_blocks(&self) -> usize {
        if self.header.block_size == 0 {
            return 0;
        }
        let body = self.data.len().saturating_sub(crate::layout::TREE_HEADER_SIZE);
        let (blocks, _rest) = num_integer::div_rem(body, self.header.block_size as usize);
        blocks
    }

    pub fn decode(&self, index: u32) -> Result<DecodedNode> {
        decode_block(self.block(index)?, self.header.max_children)
    }

    /// Walks blocks `0..node_count`. Each call starts a new walk.
    pub fn nodes(&self) -> NodeWalker<'a> {
        NodeWalker {
            file: *self,
            index: 0,
            failed: false,
        }
    }

    /// Decodes every node, logging recoverable issues and stopping at the first fatal one.
    pub fn decode_all(&self) -> Result<Vec<NodeRecord>> {
        let mut records = Vec::with_capacity(self.stored_blocks().min(self.header.node_count as usize));
        for (index, node) in self.nodes().enumerate() {
            let node = node?;
            if let Some(issue) = &node.issue {
                log::warn!("node {}: {}", index, issue);
            }
            records.push(node.record);
        }
        Ok(records)
    }
}

/// Iterator over the decoded blocks of a [HistoryFile], in block order.
///
/// Unknown node types are yielded with their issue attached and the walk goes on.
/// After a [DecodeError::TruncatedInput] the walker yields nothing more.
#[derive(Clone)]
pub struct NodeWalker<'a> {
    file: HistoryFile<'a>,
    index: u32,
    failed: bool,
}

impl<'a> NodeWalker<'a> {
    /// Index of the block the next call to `next` decodes.
    pub fn position(&self) -> u32 {
        self.index
    }
}

impl<'a> Iterator for NodeWalker<'a> {
    type Item = Result<DecodedNode>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.index >= self.file.header.node_count {
            return None;
        }
        log::debug!("reading node {}", self.index);
        let result = self.file.decode(self.index);
        self.index += 1;
        if result.is_err() {
            self.failed = true;
        }
        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.failed {
            return (0, Some(0));
        }
        let remaining = self.file.header.node_count.saturating_sub(self.index) as usize;
        (0, Some(remaining))
    }
}

impl std::iter::FusedIterator for NodeWalker<'_> {}
