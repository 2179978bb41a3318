//! Run results, per-file fragments and the result aggregator.

use crate::model::{Position, Severity, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// An `id` attribute observed on a start element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdObservation {
    pub id: String,
    pub position: Position,
    /// Qualified name of the element carrying the id
    pub element_name: String,
}

/// A `ref`/`idref` attribute observed on a start element; resolved against
/// the run-wide id table at finalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefObservation {
    pub target_id: String,
    /// Attribute name the reference was carried in
    pub kind: String,
    pub position: Position,
}

/// Counters accumulated while validating one file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileStats {
    pub elements_validated: u64,
    pub bytes_processed: u64,
    pub max_depth: usize,
    pub checkpoints_written: u64,
}

/// The validator's contribution for a single file.
///
/// Fragments are produced per file (even on fatal errors) and folded into
/// one [`ValidationResult`] by the orchestrator. Identifier and reference
/// observations are replayed into the cross-file index strictly in file
/// order, which keeps duplicate attribution deterministic without sharing
/// the index during validation.
#[derive(Debug, Clone, Default)]
pub struct FileFragment {
    pub file: String,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationError>,
    pub checksum: Option<String>,
    pub observed_ids: Vec<IdObservation>,
    pub observed_refs: Vec<RefObservation>,
    pub stats: FileStats,
    pub used_streaming: bool,
    /// False when a fatal IO error prevented validation: the file is not
    /// listed among validated files and contributes only its error.
    pub completed: bool,
    /// True when a cooperative cancel interrupted this file; the fragment
    /// is discarded by the orchestrator.
    pub cancelled: bool,
}

impl FileFragment {
    pub(crate) fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            completed: true,
            ..Self::default()
        }
    }

    /// Whether the fragment carries no error-severity findings.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Human-readable per-file summary.
    #[must_use]
    pub fn format_summary(&self) -> String {
        let mut lines = Vec::new();
        let status = if self.is_valid() { "VALID" } else { "INVALID" };
        lines.push(format!("{status}: {}", self.file));
        lines.push(format!(
            "  elements: {}, bytes: {}, max depth: {}, checkpoints: {}",
            self.stats.elements_validated,
            self.stats.bytes_processed,
            self.stats.max_depth,
            self.stats.checkpoints_written,
        ));
        if !self.errors.is_empty() {
            lines.push(format!("  errors ({}):", self.errors.len()));
            for error in self.errors.iter().take(10) {
                lines.push(format!("    - {error}"));
            }
            if self.errors.len() > 10 {
                lines.push(format!("    ... and {} more", self.errors.len() - 10));
            }
        }
        if !self.warnings.is_empty() {
            lines.push(format!("  warnings ({}):", self.warnings.len()));
            for warning in self.warnings.iter().take(10) {
                lines.push(format!("    - {warning}"));
            }
            if self.warnings.len() > 10 {
                lines.push(format!("    ... and {} more", self.warnings.len() - 10));
            }
        }
        lines.join("\n")
    }
}

/// Result of a validation run over one or more files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Conjunction: no error-severity findings anywhere in the run
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationError>,
    /// Files that completed validation, in iteration order
    pub validated_files: Vec<String>,
    /// Hex SHA-256 of each validated file's byte content
    pub checksums: BTreeMap<String, String>,
    /// When the run completed
    pub timestamp: DateTime<Utc>,
    /// True if any file was processed in streaming mode
    pub used_streaming: bool,
}

impl ValidationResult {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            validated_files: Vec::new(),
            checksums: BTreeMap::new(),
            timestamp: Utc::now(),
            used_streaming: false,
        }
    }
}

/// Folds per-file fragments and cross-file findings into one result.
///
/// Findings are kept in the order produced; duplicates (same file, line,
/// column, message and rule) are dropped.
#[derive(Debug)]
pub struct ResultAggregator {
    result: ValidationResult,
    seen: HashSet<(String, Option<u64>, Option<u64>, String, Option<String>)>,
}

impl ResultAggregator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            result: ValidationResult::empty(),
            seen: HashSet::new(),
        }
    }

    fn push(&mut self, finding: ValidationError) {
        if self.seen.insert(finding.dedup_key()) {
            match finding.severity {
                Severity::Error => self.result.errors.push(finding),
                Severity::Warning => self.result.warnings.push(finding),
            }
        }
    }

    /// Fold one file's contribution into the run result.
    pub fn fold_fragment(&mut self, fragment: FileFragment) {
        debug_assert!(!fragment.cancelled, "cancelled fragments must be discarded");
        if fragment.completed {
            self.result.validated_files.push(fragment.file.clone());
            if let Some(checksum) = fragment.checksum {
                self.result.checksums.insert(fragment.file.clone(), checksum);
            }
        }
        self.result.used_streaming |= fragment.used_streaming;
        for error in fragment.errors {
            self.push(error);
        }
        for warning in fragment.warnings {
            self.push(warning);
        }
    }

    /// Append run-level findings (cross-file duplicates, dangling references).
    pub fn extend_findings(&mut self, findings: Vec<ValidationError>) {
        for finding in findings {
            self.push(finding);
        }
    }

    /// Freeze the run result.
    #[must_use]
    pub fn finish(mut self) -> ValidationResult {
        self.result.is_valid = self.result.errors.is_empty();
        self.result.timestamp = Utc::now();
        self.result
    }
}

impl Default for ResultAggregator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::rules;

    fn fragment_with_error(file: &str, message: &str) -> FileFragment {
        let mut fragment = FileFragment::new(file);
        fragment.errors.push(ValidationError::error(
            file,
            message,
            rules::STRUCTURE,
        ));
        fragment.checksum = Some("deadbeef".into());
        fragment
    }

    #[test]
    fn test_aggregator_conjunction() {
        let mut agg = ResultAggregator::new();
        agg.fold_fragment(FileFragment::new("ok.xml"));
        agg.fold_fragment(fragment_with_error("bad.xml", "boom"));
        let result = agg.finish();
        assert!(!result.is_valid);
        assert_eq!(result.validated_files, vec!["ok.xml", "bad.xml"]);
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn test_aggregator_dedup() {
        let mut agg = ResultAggregator::new();
        agg.fold_fragment(fragment_with_error("a.xml", "same"));
        agg.fold_fragment(fragment_with_error("a.xml", "same"));
        let result = agg.finish();
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn test_incomplete_fragment_not_listed() {
        let mut agg = ResultAggregator::new();
        let mut fragment = fragment_with_error("io.xml", "read error");
        fragment.completed = false;
        fragment.checksum = None;
        agg.fold_fragment(fragment);
        let result = agg.finish();
        assert!(result.validated_files.is_empty());
        assert!(result.checksums.is_empty());
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn test_used_streaming_propagates() {
        let mut agg = ResultAggregator::new();
        let mut fragment = FileFragment::new("big.xml");
        fragment.used_streaming = true;
        agg.fold_fragment(fragment);
        agg.fold_fragment(FileFragment::new("small.xml"));
        assert!(agg.finish().used_streaming);
    }

    #[test]
    fn test_format_summary_mentions_counts() {
        let fragment = fragment_with_error("x.xml", "oops");
        let summary = fragment.format_summary();
        assert!(summary.starts_with("INVALID: x.xml"));
        assert!(summary.contains("errors (1)"));
    }
}
