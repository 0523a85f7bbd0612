use clap::Parser;
use std::path::PathBuf;

/// Creates a Graphviz dot file from a history tree file.
/// Do not use this with a large history tree file: it is read into memory at once.
#[derive(Parser, Debug)]
#[command(version)]
pub struct Args {
    /// History tree file (input)
    pub htf: PathBuf,

    /// Dot file (output)
    pub dot: PathBuf,

    /// Write a textual dump of every node instead of a dot graph
    #[arg(long)]
    pub text: bool,
}
