//! Synthetic history tree files for tests and benchmarks.
//!
//! The history tree writer is not part of this crate, so this is the reference encoder
//! used to check the decoder against known inputs.

use rand::Rng;

use crate::{
    error::Result,
    header::{TreeHeader, HF_MAGIC_NUMBER},
    interval::{IntervalRecord, ValueType},
    layout::{
        self, common, core_node, interval, Field, CHILDREN_BASE, COMMON_HEADER_SIZE,
        INTERVAL_RECORD_SIZE, TREE_HEADER_SIZE,
    },
    node::{ChildEntry, NodeKind, NodeRecord, ParentRef, SeqNumber, SpecificHeader},
};

pub fn encode_header(header: &TreeHeader) -> Vec<u8> {
    let mut data = Vec::with_capacity(TREE_HEADER_SIZE);
    for value in [
        header.magic,
        header.major,
        header.minor,
        header.block_size,
        header.max_children,
        header.node_count,
        header.root_seq.0,
    ] {
        data.extend_from_slice(&value.to_le_bytes());
    }
    data.resize(TREE_HEADER_SIZE, 0);
    data
}

/// Encodes `record` into a `block_size` block.
/// Fails if the record does not fit.
///
/// Panics if the record has more children than `max_children` slots.
pub fn encode_block(record: &NodeRecord, block_size: u32, max_children: u32) -> Result<Vec<u8>> {
    encode_block_with_strings(record, &[], block_size, max_children)
}

/// Like [encode_block], also storing strings in the variable data region at the end of the block.
/// Each `(index, text)` pair points interval `index`'s value at its string,
/// and `var_data_offset` at the lowest string.
pub fn encode_block_with_strings(
    record: &NodeRecord,
    strings: &[(usize, &str)],
    block_size: u32,
    max_children: u32,
) -> Result<Vec<u8>> {
    let mut block = vec![0u8; block_size as usize];
    let mut intervals = record.intervals.clone();
    let mut var_data_offset = record.var_data_offset;

    let mut cursor = block.len();
    for (index, text) in strings {
        let len = Field::<u32>::size() + text.len();
        cursor = layout::checked("string", cursor.checked_sub(len), &block)?;
        Field::<u32>::at_offset("string length", cursor).write(&mut block, text.len() as u32)?;
        block[cursor + Field::<u32>::size()..cursor + len].copy_from_slice(text.as_bytes());
        intervals[*index].value = cursor as u32;
        intervals[*index].value_type = ValueType::Str;
        var_data_offset = cursor as u32;
    }

    common::TYPE_TAG.write(&mut block, record.kind.tag())?;
    common::START.write(&mut block, record.start)?;
    common::END.write(&mut block, record.end)?;
    common::SEQ_NUMBER.write(&mut block, record.seq_number.0)?;
    common::PARENT_SEQ_NUMBER.write(&mut block, record.parent.to_raw())?;
    common::INTERVAL_COUNT.write(&mut block, record.interval_count)?;
    common::VAR_DATA_OFFSET.write(&mut block, var_data_offset)?;
    common::DONE.write(&mut block, record.done as u8)?;

    if let SpecificHeader::Core {
        extended,
        children_count,
    } = record.specific
    {
        assert!(
            record.children.len() <= max_children as usize,
            "{} children do not fit in {} slots",
            record.children.len(),
            max_children
        );
        core_node::EXTENDED.write(&mut block, extended as u32)?;
        core_node::CHILDREN_COUNT.write(&mut block, children_count)?;
        for (i, child) in record.children.iter().enumerate() {
            let i = i as u32;
            let seq_at = layout::checked("child seq number", layout::child_seq_offset(i), &block)?;
            let start_at = layout::checked(
                "child start",
                layout::child_start_offset(max_children, i),
                &block,
            )?;
            Field::<u32>::at_offset("child seq number", seq_at)
                .write(&mut block, child.seq_number.0)?;
            Field::<u32>::at_offset("child start", start_at).write(&mut block, child.start)?;
        }
    }

    if let Some(base) = layout::intervals_base(record.kind, max_children) {
        for (i, entry) in intervals.iter().enumerate() {
            let at = layout::checked(
                "interval",
                base.checked_add(i * INTERVAL_RECORD_SIZE),
                &block,
            )?;
            layout::region(&block, "interval", at, INTERVAL_RECORD_SIZE)?;
            let slot = &mut block[at..at + INTERVAL_RECORD_SIZE];
            interval::START.write(slot, entry.start)?;
            interval::END.write(slot, entry.end)?;
            interval::ATTRIBUTE.write(slot, entry.attribute)?;
            interval::VALUE_TYPE.write(slot, entry.value_type.tag())?;
            interval::VALUE.write(slot, entry.value)?;
        }
    }

    Ok(block)
}

/// Header followed by one block per record, in order.
pub fn encode_tree(header: &TreeHeader, records: &[NodeRecord]) -> Result<Vec<u8>> {
    let mut data = encode_header(header);
    for record in records {
        data.extend(encode_block(record, header.block_size, header.max_children)?);
    }
    Ok(data)
}

/// A core root (seq 0) with a single leaf child (seq 1).
pub fn two_node_tree() -> Vec<NodeRecord> {
    vec![
        NodeRecord {
            kind: NodeKind::Core,
            start: 0,
            end: 100,
            seq_number: SeqNumber(0),
            parent: ParentRef::Root,
            interval_count: 0,
            var_data_offset: 0,
            done: true,
            specific: SpecificHeader::Core {
                extended: false,
                children_count: 1,
            },
            children: vec![ChildEntry {
                seq_number: SeqNumber(1),
                start: 0,
            }],
            intervals: vec![],
        },
        NodeRecord {
            kind: NodeKind::Leaf,
            start: 0,
            end: 100,
            seq_number: SeqNumber(1),
            parent: ParentRef::ChildOf(SeqNumber(0)),
            interval_count: 0,
            var_data_offset: 0,
            done: true,
            specific: SpecificHeader::Leaf,
            children: vec![],
            intervals: vec![],
        },
    ]
}

/// Smallest block which holds a core node with `max_intervals` intervals.
pub fn block_size_for(max_children: u32, max_intervals: u32) -> u32 {
    (CHILDREN_BASE + 12 * max_children as usize + INTERVAL_RECORD_SIZE * max_intervals as usize)
        .max(COMMON_HEADER_SIZE) as u32
}

/// A well formed random tree of `node_count` nodes.
/// Seq numbers are block indexes and the root is block 0.
pub fn random_tree(
    rng: &mut impl Rng,
    node_count: u32,
    max_children: u32,
    max_intervals: u32,
) -> Vec<NodeRecord> {
    assert!(max_children > 0 || node_count <= 1);
    let mut records: Vec<NodeRecord> = Vec::with_capacity(node_count as usize);
    // Core nodes which still have a free child slot.
    let mut open: Vec<usize> = vec![];

    for i in 0..node_count {
        let parent = if i == 0 {
            None
        } else {
            Some(open[rng.gen_range(0..open.len())])
        };
        let start = match parent {
            Some(p) => rng.gen_range(records[p].start..=records[p].end),
            None => 0,
        };
        let end = start + rng.gen_range(0..1000);

        let last_open = parent.map_or(false, |p| {
            open.len() == 1 && records[p].children.len() + 1 == max_children as usize
        });
        let is_core = i == 0 || last_open || rng.gen_bool(0.5);

        let intervals: Vec<IntervalRecord> = (0..rng.gen_range(0..=max_intervals))
            .map(|_| {
                let s = rng.gen_range(start..=end);
                IntervalRecord {
                    start: s,
                    end: rng.gen_range(s..=end),
                    attribute: rng.gen_range(0..64),
                    value_type: ValueType::from_tag(rng.gen_range(0..5)),
                    value: rng.gen(),
                }
            })
            .collect();

        let seq_number = SeqNumber(i);
        if let Some(p) = parent {
            let parent = &mut records[p];
            parent.children.push(ChildEntry { seq_number, start });
            if let SpecificHeader::Core { children_count, .. } = &mut parent.specific {
                *children_count += 1;
            }
            if parent.children.len() == max_children as usize {
                open.retain(|o| *o != p);
            }
        }

        records.push(NodeRecord {
            kind: if is_core { NodeKind::Core } else { NodeKind::Leaf },
            start,
            end,
            seq_number,
            parent: parent.map_or(ParentRef::Root, |p| ParentRef::ChildOf(SeqNumber(p as u32))),
            interval_count: intervals.len() as u32,
            var_data_offset: 0,
            done: rng.gen_bool(0.9),
            specific: if is_core {
                SpecificHeader::Core {
                    extended: false,
                    children_count: 0,
                }
            } else {
                SpecificHeader::Leaf
            },
            children: vec![],
            intervals,
        });
        if is_core && max_children > 0 {
            open.push(i as usize);
        }
    }
    records
}

/// Encoded [random_tree] along with its header and records.
pub fn random_tree_file(
    rng: &mut impl Rng,
    node_count: u32,
    max_children: u32,
    max_intervals: u32,
) -> Result<(TreeHeader, Vec<NodeRecord>, Vec<u8>)> {
    let records = random_tree(rng, node_count, max_children, max_intervals);
    let header = TreeHeader {
        magic: HF_MAGIC_NUMBER,
        major: 1,
        minor: 0,
        block_size: block_size_for(max_children, max_intervals),
        max_children,
        node_count,
        root_seq: SeqNumber(0),
    };
    let data = encode_tree(&header, &records)?;
    Ok((header, records, data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{interval::Value, node::decode_block, walker::HistoryFile};

    #[test]
    fn random_trees_are_well_formed() {
        let mut rng = rand::thread_rng();
        for max_children in [1, 2, 5] {
            let records = random_tree(&mut rng, 50, max_children, 3);
            assert_eq!(records.len(), 50);
            assert_eq!(records.iter().filter(|r| r.is_root()).count(), 1);
            for r in &records {
                assert!(r.children.len() <= max_children as usize);
                assert_eq!(r.children_count() as usize, r.children.len());
                if let ParentRef::ChildOf(p) = r.parent {
                    let parent = &records[p.0 as usize];
                    assert_eq!(parent.kind, NodeKind::Core);
                    assert!(parent.children.iter().any(|c| c.seq_number == r.seq_number));
                }
            }
        }
    }

    #[test]
    fn round_trip() {
        let mut rng = rand::thread_rng();
        let (header, records, data) = random_tree_file(&mut rng, 40, 4, 3).unwrap();
        let file = HistoryFile::parse(&data).unwrap();
        assert_eq!(file.header(), &header);
        assert_eq!(file.decode_all().unwrap(), records);
    }

    #[test]
    fn strings_in_var_data() {
        let mut record = two_node_tree().remove(1);
        record.interval_count = 2;
        record.intervals = vec![
            IntervalRecord {
                start: 1,
                end: 2,
                attribute: 7,
                value_type: ValueType::Int32,
                value: 0,
            };
            2
        ];
        let block = encode_block_with_strings(&record, &[(0, "idle"), (1, "run")], 128, 4).unwrap();
        let decoded = decode_block(&block, 4).unwrap().record;
        assert_eq!(decoded.var_data_offset, 128 - 8 - 7);
        assert_eq!(decoded.intervals[0].value, 120);
        assert_eq!(
            decoded.intervals[0].interpret(&block),
            Value::Str("idle".to_string())
        );
        assert_eq!(
            decoded.intervals[1].interpret(&block),
            Value::Str("run".to_string())
        );
    }

    #[test]
    fn block_too_small() {
        let records = two_node_tree();
        assert!(encode_block(&records[0], 40, 4).is_err());
    }
}
