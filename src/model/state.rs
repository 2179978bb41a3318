//! Parser state snapshots used for monitoring and checkpointing.

use std::collections::BTreeMap;

/// Current state of the streaming parser.
///
/// The snapshot is a plain value: it owns all of its data and holds no
/// reference to the input stream, so it can be cloned into a checkpoint at
/// any event boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParserState {
    /// Byte offset of the next byte to be consumed
    pub byte_offset: u64,
    /// 1-based line number at `byte_offset`
    pub line: u64,
    /// 1-based column number at `byte_offset`
    pub column: u64,
    /// Qualified names of currently open elements, outermost first
    pub element_stack: Vec<String>,
    /// Flattened currently-effective namespace bindings (prefix to URI;
    /// the default namespace uses the empty prefix)
    pub namespace_bindings: BTreeMap<String, String>,
    /// Number of `StartElement` events emitted so far
    pub elements_seen: u64,
    /// Total bytes consumed so far
    pub bytes_processed: u64,
    /// Current element depth
    pub depth: usize,
}

impl ParserState {
    /// State at the very start of a document.
    #[must_use]
    pub fn new() -> Self {
        Self {
            byte_offset: 0,
            line: 1,
            column: 1,
            ..Self::default()
        }
    }
}
