//! Result sinks.
//!
//! The core exposes one built-in sink: a line-delimited JSON stream with
//! one object per record. A run emits a `validation_result` object
//! followed by one `error`/`warning` object per finding. The signed XML
//! ledger named by the external interface is produced by a collaborator;
//! this module only supplies content in a form it can consume.

use crate::error::{Result, XmlGuardianError};
use crate::model::{ValidationError, ValidationResult};
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RunRecord<'a> {
    ValidationResult {
        is_valid: bool,
        error_count: usize,
        warning_count: usize,
        validated_files: &'a [String],
        checksums: &'a std::collections::BTreeMap<String, String>,
        timestamp: &'a chrono::DateTime<chrono::Utc>,
        used_streaming: bool,
    },
    Error {
        #[serde(flatten)]
        finding: &'a ValidationError,
    },
    Warning {
        #[serde(flatten)]
        finding: &'a ValidationError,
    },
}

/// Writes validation results as newline-delimited JSON.
pub struct NdjsonReporter<W: Write> {
    writer: W,
}

impl<W: Write> NdjsonReporter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Emit one run: the summary record first, then every finding in order.
    pub fn write_run(&mut self, result: &ValidationResult) -> Result<()> {
        self.write_record(&RunRecord::ValidationResult {
            is_valid: result.is_valid,
            error_count: result.errors.len(),
            warning_count: result.warnings.len(),
            validated_files: &result.validated_files,
            checksums: &result.checksums,
            timestamp: &result.timestamp,
            used_streaming: result.used_streaming,
        })?;
        for finding in &result.errors {
            self.write_record(&RunRecord::Error { finding })?;
        }
        for finding in &result.warnings {
            self.write_record(&RunRecord::Warning { finding })?;
        }
        self.writer.flush().map_err(XmlGuardianError::from)
    }

    fn write_record(&mut self, record: &RunRecord<'_>) -> Result<()> {
        let line = serde_json::to_string(record)
            .map_err(|e| XmlGuardianError::internal(format!("NDJSON serialization: {e}")))?;
        self.writer
            .write_all(line.as_bytes())
            .and_then(|()| self.writer.write_all(b"\n"))
            .map_err(XmlGuardianError::from)
    }

    /// Recover the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}
