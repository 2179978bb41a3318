//! **Streaming validation for very large XML documents.**
//!
//! `xml-guardian` validates XML files from tens of megabytes up to tens of
//! gigabytes against structural rules, optional Relax NG / Schematron
//! schemas, and cross-document semantic constraints, while holding memory
//! bounded and supporting resumable operation.
//!
//! ## Core subsystems
//!
//! - **[`parser`]**: an event-at-a-time XML reader over a
//!   position-tracking byte source ([`reader`]), with exact
//!   byte/line/column positions, explicit namespace resolution, and a
//!   plain-iterator interface. External entities and DTDs are never
//!   loaded.
//! - **[`validator`]**: consumes parser events, maintains the element
//!   stack and rule state, and emits [`model::ValidationError`] findings
//!   with precise positions. Per-document invariants cover tag balance,
//!   nesting depth, identifier uniqueness, lifecycle phase ordering and
//!   timestamp monotonicity.
//! - **[`checkpoint`]**: periodically serializes validator state into a
//!   durable, SHA-256 integrity-checked JSON record so validation can
//!   resume after interruption.
//! - **[`crossfile`]**: accumulates identifiers and references across all
//!   files of one run and surfaces duplicate-ID and dangling-reference
//!   findings at run granularity.
//!
//! Around those, [`runner`] orchestrates multi-file runs, [`schema`]
//! compiles and applies schemas over buffered documents, [`generator`]
//! produces synthetic inputs for tests and benchmarks, [`harness`]
//! compares streaming against in-memory tree validation, and [`reports`]
//! streams results as line-delimited JSON.
//!
//! ## Validating a set of files
//!
//! ```no_run
//! use std::path::PathBuf;
//! use xml_guardian::{RunConfig, Runner};
//!
//! fn main() -> xml_guardian::Result<()> {
//!     let runner = Runner::new(RunConfig::default())?;
//!     let result = runner.validate_paths(&[
//!         PathBuf::from("data/part-001.xml"),
//!         PathBuf::from("data/part-002.xml"),
//!     ])?;
//!
//!     if !result.is_valid {
//!         for error in &result.errors {
//!             eprintln!("{error}");
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Streaming a single large file with checkpoints
//!
//! ```no_run
//! use std::path::Path;
//! use xml_guardian::{CheckpointConfig, RunConfig, Runner};
//!
//! fn main() -> xml_guardian::Result<()> {
//!     let config = RunConfig::default()
//!         .with_force_streaming(true)
//!         .with_checkpoints(
//!             CheckpointConfig::default()
//!                 .with_dir(".checkpoints")
//!                 .with_interval_bytes(100 * 1024 * 1024)
//!                 .with_resume(true),
//!         );
//!     let runner = Runner::new(config)?;
//!     let result = runner.validate_paths(&[Path::new("huge.xml").to_path_buf()])?;
//!     println!("valid: {}", result.is_valid);
//!     Ok(())
//! }
//! ```

// Lint to discourage unwrap() in production code - prefer explicit error handling
#![warn(clippy::unwrap_used)]
#![allow(
    // Cast safety: u64↔f64 casts appear in throughput and memory math where
    // values are bounded in practice
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    // Doc completeness: # Errors / # Panics sections are aspirational
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    // Validator transition functions are long by nature
    clippy::too_many_lines
)]

pub mod checkpoint;
pub mod config;
pub mod crossfile;
pub mod error;
pub mod generator;
pub mod harness;
pub mod model;
pub mod parser;
pub mod reader;
pub mod reports;
pub mod runner;
pub mod schema;
pub mod tree;
pub mod utils;
pub mod validator;

// Re-export main types for convenience
pub use checkpoint::{
    CheckpointManager, CheckpointSummary, CheckpointWriter, ValidationCheckpoint,
    CHECKPOINT_FORMAT_VERSION,
};
pub use config::{
    CheckpointConfig, ConfigError, RunConfig, SchemaConfig, Validatable, ValidatorConfig,
};
pub use crossfile::CrossFileIndex;
pub use error::{ErrorContext, Result, XmlGuardianError};
pub use generator::{DocumentGenerator, DocumentShape, GeneratorConfig, RecordKind};
pub use harness::{BenchmarkReport, BenchmarkRunner, HarnessConfig, MethodOutcome, ValidationMethod};
pub use model::{
    rules, AttributeMap, FileFragment, FileStats, ParserEvent, ParserState, Position,
    ResultAggregator, Severity, ValidationError, ValidationResult,
};
pub use parser::{EventStream, FatalErrorKind, FatalParseError, ParserOptions};
pub use reader::PositionedReader;
pub use reports::NdjsonReporter;
pub use runner::Runner;
pub use schema::{RelaxNgSchema, SchemaSet, SchematronSchema};
pub use tree::{XmlDocument, XmlElement, XmlNode};
pub use validator::{
    CancelToken, EventSource, ReplaySource, StreamingValidator, ValidatorHooks, PHASE_ORDER,
};
