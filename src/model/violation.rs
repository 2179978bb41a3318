//! Validation error records and the stable rule-id vocabulary.

use crate::model::Position;
use serde::{Deserialize, Serialize};

/// Stable rule identifiers exposed in [`ValidationError::rule_id`].
///
/// These strings are part of the public contract; downstream consumers
/// filter on them.
pub mod rules {
    pub const XML_SYNTAX: &str = "xml-syntax";
    pub const STRUCTURE: &str = "structure";
    pub const CROSS_FILE_ID: &str = "cross-file-id";
    pub const CROSS_FILE_REFERENCE: &str = "cross-file-reference";
    pub const TEMPORAL_MONOTONICITY: &str = "temporal-monotonicity";
    pub const TEMPORAL: &str = "temporal";
    pub const PHASE_ORDER: &str = "phase-order";
    pub const RELAXNG: &str = "relaxng";
    pub const SCHEMATRON: &str = "schematron";
    pub const STREAMING: &str = "streaming";
    pub const IO: &str = "io";
    pub const CHECKPOINT_CORRUPT: &str = "checkpoint-corrupt";
    pub const INTERNAL: &str = "internal";
}

/// Severity of a validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single validation finding with optional position information.
///
/// This is a plain value: all fields are owned, so findings can be collected,
/// sorted, deduplicated and serialized freely. Optional fields keep a fixed
/// shape rather than splitting the type into variants, so consumers iterate
/// uniformly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// Path of the file the finding belongs to
    pub file: String,
    /// 1-based line number, if known
    pub line: Option<u64>,
    /// 1-based column number, if known
    pub column: Option<u64>,
    /// Human-readable message
    pub message: String,
    /// Error or warning
    pub severity: Severity,
    /// Stable rule identifier (see [`rules`])
    pub rule_id: Option<String>,
    /// Qualified name of the element the finding occurred in, if any
    pub element_name: Option<String>,
}

impl ValidationError {
    /// Create an error-severity finding.
    pub fn error(file: impl Into<String>, message: impl Into<String>, rule_id: &str) -> Self {
        Self {
            file: file.into(),
            line: None,
            column: None,
            message: message.into(),
            severity: Severity::Error,
            rule_id: Some(rule_id.to_string()),
            element_name: None,
        }
    }

    /// Create a warning-severity finding.
    pub fn warning(file: impl Into<String>, message: impl Into<String>, rule_id: &str) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(file, message, rule_id)
        }
    }

    /// Attach a source position.
    #[must_use]
    pub fn at(mut self, position: Position) -> Self {
        self.line = Some(position.line);
        self.column = Some(position.column);
        self
    }

    /// Attach the element the finding occurred in.
    #[must_use]
    pub fn in_element(mut self, name: impl Into<String>) -> Self {
        self.element_name = Some(name.into());
        self
    }

    /// Whether this finding has error severity.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Identity used for run-level deduplication: two findings with the same
    /// file, position, message and rule are the same finding.
    #[must_use]
    pub fn dedup_key(&self) -> (String, Option<u64>, Option<u64>, String, Option<String>) {
        (
            self.file.clone(),
            self.line,
            self.column,
            self.message.clone(),
            self.rule_id.clone(),
        )
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.line, self.column) {
            (Some(line), Some(column)) => write!(f, "{}:{line}:{column}: ", self.file)?,
            (Some(line), None) => write!(f, "{}:{line}: ", self.file)?,
            _ => write!(f, "{}: ", self.file)?,
        }
        if let Some(element) = &self.element_name {
            write!(f, "in <{element}>: ")?;
        }
        write!(f, "{}", self.message)?;
        if let Some(rule) = &self.rule_id {
            write!(f, " [{rule}]")?;
        }
        Ok(())
    }
}
