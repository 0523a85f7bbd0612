//! Human readable dump of a history tree file.

use std::fmt::{self, Write};

use crate::{
    error::Result,
    header::TreeHeader,
    node::{DecodedNode, NodeRecord, SpecificHeader},
    walker::HistoryFile,
};

fn yes_no(b: bool) -> &'static str {
    if b {
        "yes"
    } else {
        "no"
    }
}

pub fn write_header(out: &mut impl Write, header: &TreeHeader) -> fmt::Result {
    writeln!(out, "\tmagic number: {:08x}", header.magic)?;
    writeln!(out, "\tmajor: {}", header.major)?;
    writeln!(out, "\tminor: {}", header.minor)?;
    writeln!(out, "\tblock size: {}", header.block_size)?;
    writeln!(out, "\tmax. children: {}", header.max_children)?;
    writeln!(out, "\tnode count: {}", header.node_count)?;
    writeln!(out, "\troot seq. number: {}", header.root_seq)
}

/// Writes every field of `record`. `block` is the block it was decoded from, used to show string values.
pub fn write_node(out: &mut impl Write, record: &NodeRecord, block: &[u8]) -> fmt::Result {
    writeln!(out, "\ttype: {}", record.kind)?;
    writeln!(out, "\trange: [{}, {}]", record.start, record.end)?;
    writeln!(out, "\tseq. number: {}", record.seq_number)?;
    writeln!(out, "\tparent seq. number: {}", record.parent)?;
    writeln!(out, "\tinterval count: {}", record.interval_count)?;
    writeln!(out, "\tvar. data offset: {}", record.var_data_offset)?;
    writeln!(out, "\tdone?: {}", yes_no(record.done))?;

    if let SpecificHeader::Core {
        extended,
        children_count,
    } = record.specific
    {
        writeln!(out, "\textended?: {}", yes_no(extended))?;
        writeln!(out, "\tchildren count: {}", children_count)?;
    }
    for child in &record.children {
        writeln!(out, "\tchild: seq. number {}, start {}", child.seq_number, child.start)?;
    }
    for interval in &record.intervals {
        writeln!(
            out,
            "\tinterval: attribute {}, {}, [{}, {}]: {}",
            interval.attribute,
            interval.value_type,
            interval.start,
            interval.end,
            interval.interpret(block)
        )?;
    }
    Ok(())
}

fn write_decoded(out: &mut impl Write, index: usize, node: &DecodedNode, block: &[u8]) -> fmt::Result {
    writeln!(out, "node {}:", index)?;
    if let Some(issue) = &node.issue {
        writeln!(out, "\terror: {}", issue)?;
    }
    write_node(out, &node.record, block)
}

const STRING_WRITE: &str = "writing to a String cannot fail";

/// Text dump built one node at a time, in walk order.
pub struct TextDump {
    out: String,
}

impl TextDump {
    pub fn new(header: &TreeHeader) -> Self {
        let mut out = String::from("tree header:\n");
        write_header(&mut out, header).expect(STRING_WRITE);
        TextDump { out }
    }

    /// Appends node `index`. `block` is the block it was decoded from.
    pub fn add(&mut self, index: usize, node: &DecodedNode, block: &[u8]) {
        write_decoded(&mut self.out, index, node, block).expect(STRING_WRITE);
    }

    pub fn finish(self) -> String {
        self.out
    }
}

/// Dumps the header and all nodes of `file`. Stops at the first fatal decoding error.
pub fn render(file: &HistoryFile) -> Result<String> {
    let mut dump = TextDump::new(file.header());
    for (index, node) in file.nodes().enumerate() {
        let node = node?;
        dump.add(index, &node, file.block(index as u32)?);
    }
    Ok(dump.finish())
}
