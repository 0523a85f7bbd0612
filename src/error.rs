//! Error types for history tree decoding.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// A field region runs past the end of the buffer. Fatal for a walk.
    #[error("truncated input: {field} needs {needed} bytes but only {available} are available")]
    TruncatedInput {
        field: &'static str,
        needed: usize,
        available: usize,
    },

    /// Type tag outside {1, 2}. The common header is still decoded.
    #[error("unknown node type {tag}")]
    UnknownNodeType { tag: u8 },
}

impl DecodeError {
    /// Whether decoding of other nodes may continue after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DecodeError::UnknownNodeType { .. })
    }
}

pub type Result<T> = std::result::Result<T, DecodeError>;
