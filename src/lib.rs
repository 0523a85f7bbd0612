/*!
Reader for history tree files.

A history tree file is a 4096 byte [header::TreeHeader] followed by `node_count` fixed size blocks,
each holding one node of the tree: either a core node (children plus intervals) or a leaf node (intervals only).
See [layout] for where every field lives.

Decoding is read only and done entirely from an in memory copy of the file:
[walker::HistoryFile] parses the header, and [walker::HistoryFile::nodes] decodes blocks in storage order.
Nothing beyond the node type tag is checked while decoding;
[index::TreeIndex] reports structural inconsistencies after the fact.

Not suited for large files: the whole file is held in memory.
*/

extern crate derive_more;
extern crate im_rc;
extern crate num_integer;

pub mod dot;
pub mod error;
pub mod fixture;
pub mod header;
pub mod index;
pub mod interval;
pub mod layout;
pub mod node;
pub mod text;
pub mod walker;

pub use error::{DecodeError, Result};
pub use header::TreeHeader;
pub use interval::{IntervalRecord, ValueType};
pub use node::{decode_block, ChildEntry, DecodedNode, NodeKind, NodeRecord, ParentRef, SeqNumber};
pub use walker::{HistoryFile, NodeWalker};
