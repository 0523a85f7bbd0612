//! Graphviz rendering of the tree shape.

use std::fmt::{self, Write};

use crate::node::{NodeRecord, ParentRef};

const PREAMBLE: &str = "digraph hf {\n\tsize=\"6,6\";\n\tnode [color=lightblue2, style=filled];\n";

/// Dot graph built one node at a time: the root as a lone node, every other node as an edge from its parent.
pub struct DotGraph {
    out: String,
}

impl Default for DotGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl DotGraph {
    pub fn new() -> Self {
        DotGraph {
            out: PREAMBLE.to_string(),
        }
    }

    pub fn add(&mut self, record: &NodeRecord) {
        write_record(&mut self.out, record).expect("writing to a String cannot fail");
    }

    pub fn finish(mut self) -> String {
        self.out.push_str("\n}\n");
        self.out
    }
}

fn write_record(out: &mut impl Write, record: &NodeRecord) -> fmt::Result {
    match record.parent {
        ParentRef::Root => write!(out, "\n\t\"{}\";", record.seq_number),
        ParentRef::ChildOf(parent) => {
            write!(out, "\n\t\"{}\" -> \"{}\";", parent, record.seq_number)
        }
    }
}

pub fn render<'a>(records: impl IntoIterator<Item = &'a NodeRecord>) -> String {
    let mut graph = DotGraph::new();
    for record in records {
        graph.add(record);
    }
    graph.finish()
}
