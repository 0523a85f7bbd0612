use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;

use htf::{
    dot::DotGraph,
    index::TreeIndex,
    text::{self, TextDump},
    DecodeError, HistoryFile,
};

mod args;

use args::Args;

/// Decodes a whole history tree file, writing progress and every node's fields to `progress`.
/// Returns the dot graph, or the text dump if `text_output` is set.
fn convert(data: &[u8], text_output: bool, progress: &mut impl Write) -> Result<String> {
    writeln!(progress, "> reading tree header...")?;
    let file = HistoryFile::parse(data).context("Failed to read tree header")?;
    let header = file.header();
    let mut header_text = String::new();
    text::write_header(&mut header_text, header)?;
    write!(progress, "{}", header_text)?;
    if !header.has_expected_magic() {
        log::warn!("unexpected magic number {:08x}", header.magic);
    }

    let mut graph = DotGraph::new();
    let mut dump = text_output.then(|| TextDump::new(header));
    let mut records = Vec::with_capacity(file.stored_blocks());
    for (index, node) in file.nodes().enumerate() {
        writeln!(progress, "> reading node {}...", index)?;
        let node = node.with_context(|| format!("Failed to read node {}", index))?;
        if let Some(DecodeError::UnknownNodeType { tag }) = node.issue {
            writeln!(progress, "error: unknown type {}", tag)?;
        }
        let block = file.block(index as u32)?;
        let mut fields = String::new();
        text::write_node(&mut fields, &node.record, block)?;
        write!(progress, "{}", fields)?;

        graph.add(&node.record);
        if let Some(dump) = &mut dump {
            dump.add(index, &node, block);
        }
        records.push(node.record);
    }
    TreeIndex::new(&records).report(header.root_seq);

    match dump {
        Some(dump) => {
            writeln!(progress, "> writing text output...")?;
            Ok(dump.finish())
        }
        None => {
            writeln!(progress, "> writing dot output...")?;
            Ok(graph.finish())
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    let data = std::fs::read(&args.htf)
        .with_context(|| format!("Failed to read {}", args.htf.display()))?;
    let output = convert(&data, args.text, &mut std::io::stdout().lock())?;
    std::fs::write(&args.dot, output)
        .with_context(|| format!("Failed to write {}", args.dot.display()))?;
    println!("> done.");
    Ok(())
}
