//! Parser events and source positions.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Exact location of a syntactic construct in the input.
///
/// `line` and `column` are 1-based; `byte_offset` counts from the start of
/// the file. Positions always point at the first byte of the construct they
/// describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Byte offset from the start of the input
    pub byte_offset: u64,
    /// 1-based line number
    pub line: u64,
    /// 1-based column number (bytes, not characters)
    pub column: u64,
}

impl Position {
    /// Position of the first byte of a document.
    #[must_use]
    pub const fn start() -> Self {
        Self {
            byte_offset: 0,
            line: 1,
            column: 1,
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::start()
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Attribute map of a start element.
///
/// Insertion order is preserved: tests rely on it for deterministic
/// serialization of attribute lists.
pub type AttributeMap = IndexMap<String, String>;

/// One event produced by the streaming parser.
#[derive(Debug, Clone, PartialEq)]
pub enum ParserEvent {
    StartDocument,
    EndDocument,
    StartElement {
        qualified_name: String,
        local_name: String,
        namespace_uri: Option<String>,
        attributes: AttributeMap,
        position: Position,
    },
    EndElement {
        qualified_name: String,
        local_name: String,
        namespace_uri: Option<String>,
        position: Position,
    },
    /// Character data. May be split at implementation-defined boundaries;
    /// consumers must tolerate coalescing.
    Characters { text: String, position: Position },
    ProcessingInstruction {
        target: String,
        data: Option<String>,
        position: Position,
    },
    Comment { text: String, position: Position },
}

impl ParserEvent {
    /// Position of the event, if it carries one.
    #[must_use]
    pub fn position(&self) -> Option<Position> {
        match self {
            Self::StartDocument | Self::EndDocument => None,
            Self::StartElement { position, .. }
            | Self::EndElement { position, .. }
            | Self::Characters { position, .. }
            | Self::ProcessingInstruction { position, .. }
            | Self::Comment { position, .. } => Some(*position),
        }
    }

    /// Qualified element name for element events.
    #[must_use]
    pub fn element_name(&self) -> Option<&str> {
        match self {
            Self::StartElement { qualified_name, .. } | Self::EndElement { qualified_name, .. } => {
                Some(qualified_name)
            }
            _ => None,
        }
    }

    /// Whether this is a `StartElement` event.
    #[must_use]
    pub fn is_start(&self) -> bool {
        matches!(self, Self::StartElement { .. })
    }

    /// Whether this is an `EndElement` event.
    #[must_use]
    pub fn is_end(&self) -> bool {
        matches!(self, Self::EndElement { .. })
    }
}

impl std::fmt::Display for ParserEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StartDocument => write!(f, "start_document"),
            Self::EndDocument => write!(f, "end_document"),
            Self::StartElement {
                qualified_name,
                position,
                ..
            } => write!(f, "<{qualified_name} at {position}>"),
            Self::EndElement {
                qualified_name,
                position,
                ..
            } => write!(f, "</{qualified_name} at {position}>"),
            Self::Characters { text, position } => {
                let preview: String = text.chars().take(20).collect();
                write!(f, "chars({preview:?} at {position})")
            }
            Self::ProcessingInstruction {
                target, position, ..
            } => write!(f, "pi({target} at {position})"),
            Self::Comment { position, .. } => write!(f, "comment at {position}"),
        }
    }
}
