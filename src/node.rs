//! Decoding of a single node block.

use std::fmt;

use crate::{
    error::{DecodeError, Result},
    interval::IntervalRecord,
    layout::{self, common, core_node, BlockLayout, CoreLayout, Field, INTERVAL_RECORD_SIZE},
};

/// Unique identifier of a node, independent of where its block is stored.
#[derive(
    Ord,
    PartialOrd,
    Eq,
    PartialEq,
    Copy,
    Clone,
    Hash,
    Debug,
    derive_more::From,
    derive_more::Into,
    derive_more::Display,
)]
pub struct SeqNumber(pub u32);

/// Raw `parent_seq_number` of the root node (-1 as written by the tree writer).
pub const ROOT_SENTINEL: u32 = u32::MAX;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParentRef {
    Root,
    ChildOf(SeqNumber),
}

impl ParentRef {
    pub fn from_raw(raw: u32) -> Self {
        if raw == ROOT_SENTINEL {
            ParentRef::Root
        } else {
            ParentRef::ChildOf(SeqNumber(raw))
        }
    }

    pub fn to_raw(self) -> u32 {
        match self {
            ParentRef::Root => ROOT_SENTINEL,
            ParentRef::ChildOf(seq) => seq.0,
        }
    }

    pub fn seq_number(self) -> Option<SeqNumber> {
        match self {
            ParentRef::Root => None,
            ParentRef::ChildOf(seq) => Some(seq),
        }
    }

    pub fn is_root(self) -> bool {
        self == ParentRef::Root
    }
}

impl fmt::Display for ParentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParentRef::Root => write!(f, "root"),
            ParentRef::ChildOf(seq) => write!(f, "{}", seq),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Core,
    Leaf,
    Unknown(u8),
}

impl NodeKind {
    pub fn from_tag(tag: u8) -> Self {
        match tag {
            1 => NodeKind::Core,
            2 => NodeKind::Leaf,
            other => NodeKind::Unknown(other),
        }
    }

    pub fn tag(self) -> u8 {
        match self {
            NodeKind::Core => 1,
            NodeKind::Leaf => 2,
            NodeKind::Unknown(tag) => tag,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Core => write!(f, "core"),
            NodeKind::Leaf => write!(f, "leaf"),
            NodeKind::Unknown(tag) => write!(f, "unknown ({})", tag),
        }
    }
}

/// Fields which depend on the node kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpecificHeader {
    Core { extended: bool, children_count: u32 },
    Leaf,
    /// Unrecognized type tag: nothing past the common header was read.
    Unknown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChildEntry {
    pub seq_number: SeqNumber,
    pub start: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeRecord {
    pub kind: NodeKind,
    pub start: u32,
    pub end: u32,
    pub seq_number: SeqNumber,
    pub parent: ParentRef,
    pub interval_count: u32,
    /// Passed through, never followed by the decoder.
    pub var_data_offset: u32,
    pub done: bool,
    pub specific: SpecificHeader,
    pub children: Vec<ChildEntry>,
    pub intervals: Vec<IntervalRecord>,
}

impl NodeRecord {
    pub fn is_root(&self) -> bool {
        self.parent.is_root()
    }

    /// Declared children count; 0 for anything but core nodes.
    pub fn children_count(&self) -> u32 {
        match self.specific {
            SpecificHeader::Core { children_count, .. } => children_count,
            _ => 0,
        }
    }
}

/// A decoded block, plus the recoverable problem found while decoding it, if any.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedNode {
    pub record: NodeRecord,
    /// Only ever [DecodeError::UnknownNodeType].
    pub issue: Option<DecodeError>,
}

/// Decodes one block of a tree whose core nodes have room for `max_children` children.
///
/// An unknown type tag is not an error: the common header is returned with
/// [SpecificHeader::Unknown] and the condition is reported in [DecodedNode::issue].
/// Any field which would be read past the end of `block` fails with [DecodeError::TruncatedInput].
pub fn decode_block(block: &[u8], max_children: u32) -> Result<DecodedNode> {
    let kind = NodeKind::from_tag(common::TYPE_TAG.read(block)?);
    let mut record = NodeRecord {
        kind,
        start: common::START.read(block)?,
        end: common::END.read(block)?,
        seq_number: common::SEQ_NUMBER.read(block)?.into(),
        parent: ParentRef::from_raw(common::PARENT_SEQ_NUMBER.read(block)?),
        interval_count: common::INTERVAL_COUNT.read(block)?,
        var_data_offset: common::VAR_DATA_OFFSET.read(block)?,
        done: common::DONE.read(block)? != 0,
        specific: SpecificHeader::Unknown,
        children: vec![],
        intervals: vec![],
    };

    match kind {
        NodeKind::Core => {
            let children_count = core_node::CHILDREN_COUNT.read(block)?;
            record.specific = SpecificHeader::Core {
                extended: core_node::EXTENDED.read(block)? != 0,
                children_count,
            };
            record.children = read_children(block, max_children, children_count)?;
        }
        NodeKind::Leaf => record.specific = SpecificHeader::Leaf,
        NodeKind::Unknown(tag) => {
            return Ok(DecodedNode {
                record,
                issue: Some(DecodeError::UnknownNodeType { tag }),
            })
        }
    }

    record.intervals = read_intervals(block, kind, max_children, record.interval_count)?;
    Ok(DecodedNode {
        record,
        issue: None,
    })
}

fn read_children(block: &[u8], max_children: u32, children_count: u32) -> Result<Vec<ChildEntry>> {
    // Entries past the array capacity don't exist in the layout.
    let capacity = CoreLayout.children_capacity(max_children);
    let count = children_count.min(capacity);
    if count < children_count {
        log::debug!(
            "children count {} exceeds capacity {}, reading {}",
            children_count,
            capacity,
            count
        );
    }

    (0..count)
        .map(|i| {
            let seq_at = layout::checked("child seq number", layout::child_seq_offset(i), block)?;
            let start_at = layout::checked(
                "child start",
                layout::child_start_offset(max_children, i),
                block,
            )?;
            Ok(ChildEntry {
                seq_number: Field::<u32>::at_offset("child seq number", seq_at)
                    .read(block)?
                    .into(),
                start: Field::<u32>::at_offset("child start", start_at).read(block)?,
            })
        })
        .collect()
}

fn read_intervals(
    block: &[u8],
    kind: NodeKind,
    max_children: u32,
    interval_count: u32,
) -> Result<Vec<IntervalRecord>> {
    // No region to read, even if the base lies past the block.
    if interval_count == 0 {
        return Ok(vec![]);
    }
    let base = layout::checked("interval", layout::intervals_base(kind, max_children), block)?;
    let len = layout::checked(
        "interval",
        (interval_count as usize).checked_mul(INTERVAL_RECORD_SIZE),
        block,
    )?;
    let region = layout::region(block, "interval", base, len)?;
    region
        .chunks_exact(INTERVAL_RECORD_SIZE)
        .map(IntervalRecord::read)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        fixture,
        interval::ValueType,
        layout::{COMMON_HEADER_SIZE, INTERVAL_RECORD_SIZE},
    };

    fn leaf(seq: u32, parent: ParentRef, intervals: Vec<IntervalRecord>) -> NodeRecord {
        NodeRecord {
            kind: NodeKind::Leaf,
            start: 100,
            end: 200,
            seq_number: SeqNumber(seq),
            parent,
            interval_count: intervals.len() as u32,
            var_data_offset: 256,
            done: true,
            specific: SpecificHeader::Leaf,
            children: vec![],
            intervals,
        }
    }

    fn interval(attribute: u32, value_type: u8, value: u32) -> IntervalRecord {
        IntervalRecord {
            start: 110,
            end: 120,
            attribute,
            value_type: ValueType::from_tag(value_type),
            value,
        }
    }

    #[test]
    fn parent_sentinel() {
        assert_eq!(ParentRef::from_raw(0xFFFF_FFFF), ParentRef::Root);
        assert_eq!(ParentRef::from_raw(0), ParentRef::ChildOf(SeqNumber(0)));
        assert_eq!(ParentRef::Root.to_raw(), u32::MAX);
        assert_eq!(ParentRef::Root.to_string(), "root");
        assert_eq!(ParentRef::ChildOf(SeqNumber(4)).to_string(), "4");
        assert_eq!(ParentRef::ChildOf(SeqNumber(4)).seq_number(), Some(SeqNumber(4)));
    }

    #[test]
    fn common_header_offsets() {
        let mut block = vec![0u8; 64];
        block[0] = 2;
        block[1..5].copy_from_slice(&5u32.to_le_bytes());
        block[9..13].copy_from_slice(&6u32.to_le_bytes());
        block[17..21].copy_from_slice(&7u32.to_le_bytes());
        block[21..25].copy_from_slice(&[0xff; 4]);
        block[29..33].copy_from_slice(&64u32.to_le_bytes());
        block[33] = 1;

        let decoded = decode_block(&block, 3).unwrap();
        assert_eq!(decoded.issue, None);
        let r = decoded.record;
        assert_eq!(r.kind, NodeKind::Leaf);
        assert_eq!((r.start, r.end), (5, 6));
        assert_eq!(r.seq_number, SeqNumber(7));
        assert!(r.is_root());
        assert_eq!(r.interval_count, 0);
        assert_eq!(r.var_data_offset, 64);
        assert!(r.done);
        assert!(r.children.is_empty());
    }

    #[test]
    fn leaf_intervals() {
        let record = leaf(
            3,
            ParentRef::ChildOf(SeqNumber(1)),
            vec![interval(1, 0, 5), interval(2, 3, 1.0f32.to_bits())],
        );
        let block = fixture::encode_block(&record, 128, 4).unwrap();
        let decoded = decode_block(&block, 4).unwrap();
        assert_eq!(decoded.record, record);
        // Leaf intervals start right after the common header.
        assert_eq!(block[COMMON_HEADER_SIZE + 16], 1);
        assert_eq!(block[COMMON_HEADER_SIZE + INTERVAL_RECORD_SIZE + 16], 2);
    }

    #[test]
    fn core_children_and_intervals() {
        let record = NodeRecord {
            kind: NodeKind::Core,
            start: 0,
            end: 1000,
            seq_number: SeqNumber(0),
            parent: ParentRef::Root,
            interval_count: 1,
            var_data_offset: 512,
            done: false,
            specific: SpecificHeader::Core {
                extended: false,
                children_count: 2,
            },
            children: vec![
                ChildEntry {
                    seq_number: SeqNumber(1),
                    start: 0,
                },
                ChildEntry {
                    seq_number: SeqNumber(2),
                    start: 500,
                },
            ],
            intervals: vec![interval(9, 9, 77)],
        };
        let block = fixture::encode_block(&record, 512, 5).unwrap();
        assert_eq!(&block[46..50], &2u32.to_le_bytes());
        assert_eq!(&block[42 + 20 + 8..42 + 20 + 12], &500u32.to_le_bytes());
        assert_eq!(block[42 + 60 + 20], 9);

        let decoded = decode_block(&block, 5).unwrap();
        assert_eq!(decoded.issue, None);
        assert_eq!(decoded.record, record);
        assert_eq!(decoded.record.children_count(), 2);
    }

    #[test]
    fn unknown_type_keeps_common_fields() {
        let mut block = fixture::encode_block(
            &leaf(9, ParentRef::ChildOf(SeqNumber(2)), vec![interval(1, 0, 1)]),
            128,
            4,
        )
        .unwrap();
        block[0] = 5;

        let decoded = decode_block(&block, 4).unwrap();
        assert_eq!(decoded.issue, Some(DecodeError::UnknownNodeType { tag: 5 }));
        let r = decoded.record;
        assert_eq!(r.kind, NodeKind::Unknown(5));
        assert_eq!(r.seq_number, SeqNumber(9));
        assert_eq!(r.parent, ParentRef::ChildOf(SeqNumber(2)));
        assert_eq!(r.interval_count, 1);
        assert_eq!(r.specific, SpecificHeader::Unknown);
        assert!(r.children.is_empty());
        assert!(r.intervals.is_empty());
    }

    #[test]
    fn truncated_intervals() {
        let record = leaf(1, ParentRef::Root, vec![interval(1, 0, 1); 3]);
        let block = fixture::encode_block(&record, 128, 4).unwrap();
        // Room for the header and two records, not three.
        let short = &block[..COMMON_HEADER_SIZE + 2 * INTERVAL_RECORD_SIZE + 10];
        assert_eq!(
            decode_block(short, 4),
            Err(DecodeError::TruncatedInput {
                field: "interval",
                needed: COMMON_HEADER_SIZE + 3 * INTERVAL_RECORD_SIZE,
                available: short.len()
            })
        );
    }

    #[test]
    fn small_core_block_without_intervals() {
        // 64 bytes holds the core header but not the arrays for 50 children.
        let mut block = vec![0u8; 64];
        block[0] = 1;
        block[17..21].copy_from_slice(&3u32.to_le_bytes());
        let decoded = decode_block(&block, 50).unwrap();
        assert_eq!(decoded.issue, None);
        assert_eq!(decoded.record.seq_number, SeqNumber(3));
        assert_eq!(decoded.record.children_count(), 0);
        assert!(decoded.record.intervals.is_empty());

        // A single declared interval is still past the end.
        block[25..29].copy_from_slice(&1u32.to_le_bytes());
        assert_eq!(
            decode_block(&block, 50),
            Err(DecodeError::TruncatedInput {
                field: "interval",
                needed: 42 + 12 * 50 + INTERVAL_RECORD_SIZE,
                available: 64
            })
        );
    }

    #[test]
    fn huge_interval_count() {
        let mut block = fixture::encode_block(&leaf(1, ParentRef::Root, vec![]), 64, 0).unwrap();
        block[25..29].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(
            decode_block(&block, 0),
            Err(DecodeError::TruncatedInput { .. })
        ));
    }

    #[test]
    fn truncated_common_header() {
        assert!(matches!(
            decode_block(&[1, 0, 0], 4),
            Err(DecodeError::TruncatedInput { field: "start", .. })
        ));
        assert!(matches!(
            decode_block(&[], 4),
            Err(DecodeError::TruncatedInput { field: "type", .. })
        ));
    }

    #[test]
    fn truncated_children() {
        let mut block = vec![0u8; 50];
        block[0] = 1;
        block[38..42].copy_from_slice(&3u32.to_le_bytes());
        // The third child seq number would end at 54.
        assert!(matches!(
            decode_block(&block, 4),
            Err(DecodeError::TruncatedInput { .. })
        ));
    }

    #[test]
    fn children_count_past_capacity() {
        let mut block = vec![0u8; 42 + 12 * 2];
        block[0] = 1;
        block[38..42].copy_from_slice(&7u32.to_le_bytes());
        block[42..46].copy_from_slice(&4u32.to_le_bytes());
        block[46..50].copy_from_slice(&5u32.to_le_bytes());
        let r = decode_block(&block, 2).unwrap().record;
        assert_eq!(r.children_count(), 7);
        let seqs: Vec<_> = r.children.iter().map(|c| c.seq_number).collect();
        assert_eq!(seqs, [SeqNumber(4), SeqNumber(5)]);
    }
}
