//! Configuration structures for the validation engine.
//!
//! All behavior is parameterized through these explicit structures; the
//! engine reads no environment variables and keeps no global mutable
//! configuration. Every config type implements [`Validatable`] and is
//! checked before a run starts.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default maximum element nesting depth.
pub const DEFAULT_MAX_DEPTH: usize = 1000;
/// Default checkpoint interval (bytes processed between snapshots).
pub const DEFAULT_CHECKPOINT_INTERVAL_BYTES: u64 = 100 * 1024 * 1024;
/// Default number of checkpoints retained per file (0 = unlimited).
pub const DEFAULT_MAX_CHECKPOINTS: usize = 10;
/// Default file-size threshold above which streaming mode is selected.
pub const DEFAULT_STREAMING_THRESHOLD_BYTES: u64 = 10 * 1024 * 1024;
/// Default size limit for buffering a document for schema validation.
pub const DEFAULT_SCHEMA_BUFFER_LIMIT_BYTES: u64 = 100 * 1024 * 1024;
/// Default per-method timeout for the performance harness.
pub const DEFAULT_HARNESS_TIMEOUT: Duration = Duration::from_secs(300);

/// Configuration validation error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

impl ConfigError {
    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Trait for configuration types that can validate themselves.
pub trait Validatable {
    /// Check the configuration for internally inconsistent values.
    fn validate(&self) -> Result<(), ConfigError>;
}

// ============================================================================
// Validator
// ============================================================================

/// Settings for the per-file validator state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Maximum allowed element nesting depth; exceeding it is a fatal
    /// structural error
    pub max_depth: usize,
    /// Resolve namespace prefixes against the binding stack
    pub namespace_aware: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            namespace_aware: true,
        }
    }
}

impl ValidatorConfig {
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    #[must_use]
    pub const fn with_namespaces(mut self, enabled: bool) -> Self {
        self.namespace_aware = enabled;
        self
    }
}

impl Validatable for ValidatorConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_depth == 0 {
            return Err(ConfigError::invalid("max_depth", "must be at least 1"));
        }
        Ok(())
    }
}

// ============================================================================
// Checkpoints
// ============================================================================

/// Settings for durable checkpointing of validator state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Directory holding checkpoint records
    pub dir: PathBuf,
    /// Bytes processed between snapshots (0 disables checkpointing)
    pub interval_bytes: u64,
    /// Checkpoints retained per file; oldest by sequence number are deleted
    /// beyond this count (0 = unlimited)
    pub max_checkpoints: usize,
    /// Resume from the latest intact checkpoint when one exists
    pub resume: bool,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".checkpoints"),
            interval_bytes: DEFAULT_CHECKPOINT_INTERVAL_BYTES,
            max_checkpoints: DEFAULT_MAX_CHECKPOINTS,
            resume: false,
        }
    }
}

impl CheckpointConfig {
    #[must_use]
    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = dir.into();
        self
    }

    #[must_use]
    pub const fn with_interval_bytes(mut self, interval: u64) -> Self {
        self.interval_bytes = interval;
        self
    }

    #[must_use]
    pub const fn with_max_checkpoints(mut self, max: usize) -> Self {
        self.max_checkpoints = max;
        self
    }

    #[must_use]
    pub const fn with_resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }
}

impl Validatable for CheckpointConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.dir.as_os_str().is_empty() {
            return Err(ConfigError::invalid("dir", "must not be empty"));
        }
        Ok(())
    }
}

// ============================================================================
// Schemas
// ============================================================================

/// Settings for optional schema validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Relax NG schema (XML syntax)
    pub relaxng: Option<PathBuf>,
    /// Schematron schema
    pub schematron: Option<PathBuf>,
    /// Documents larger than this are not buffered for the schema pass;
    /// the pass is skipped with a warning instead
    pub buffer_limit_bytes: u64,
}

impl SchemaConfig {
    #[must_use]
    pub fn with_relaxng(mut self, path: impl Into<PathBuf>) -> Self {
        self.relaxng = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_schematron(mut self, path: impl Into<PathBuf>) -> Self {
        self.schematron = Some(path.into());
        self
    }

    #[must_use]
    pub const fn with_buffer_limit_bytes(mut self, limit: u64) -> Self {
        self.buffer_limit_bytes = limit;
        self
    }

    /// Whether any schema is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.relaxng.is_none() && self.schematron.is_none()
    }

    /// Effective buffer limit, substituting the default for zero.
    #[must_use]
    pub fn effective_buffer_limit(&self) -> u64 {
        if self.buffer_limit_bytes == 0 {
            DEFAULT_SCHEMA_BUFFER_LIMIT_BYTES
        } else {
            self.buffer_limit_bytes
        }
    }
}

impl Validatable for SchemaConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        Ok(())
    }
}

// ============================================================================
// Run
// ============================================================================

/// Top-level settings for a validation run over one or more files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub validator: ValidatorConfig,
    /// Checkpointing; `None` disables snapshots entirely
    pub checkpoints: Option<CheckpointConfig>,
    /// Schema validation; `None` skips the schema pass
    pub schema: Option<SchemaConfig>,
    /// Files at or above this size are processed in streaming mode
    pub streaming_threshold_bytes: u64,
    /// Force streaming mode regardless of file size
    pub force_streaming: bool,
    /// Validate files on the rayon thread pool; fragments are still folded
    /// in lexicographic order, so results are identical to sequential runs
    pub parallel: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            validator: ValidatorConfig::default(),
            checkpoints: None,
            schema: None,
            streaming_threshold_bytes: DEFAULT_STREAMING_THRESHOLD_BYTES,
            force_streaming: false,
            parallel: false,
        }
    }
}

impl RunConfig {
    #[must_use]
    pub fn with_validator(mut self, validator: ValidatorConfig) -> Self {
        self.validator = validator;
        self
    }

    #[must_use]
    pub fn with_checkpoints(mut self, checkpoints: CheckpointConfig) -> Self {
        self.checkpoints = Some(checkpoints);
        self
    }

    #[must_use]
    pub fn with_schema(mut self, schema: SchemaConfig) -> Self {
        self.schema = Some(schema);
        self
    }

    #[must_use]
    pub const fn with_streaming_threshold_bytes(mut self, threshold: u64) -> Self {
        self.streaming_threshold_bytes = threshold;
        self
    }

    #[must_use]
    pub const fn with_force_streaming(mut self, force: bool) -> Self {
        self.force_streaming = force;
        self
    }

    #[must_use]
    pub const fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

impl Validatable for RunConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.validator.validate()?;
        if let Some(checkpoints) = &self.checkpoints {
            checkpoints.validate()?;
        }
        if let Some(schema) = &self.schema {
            schema.validate()?;
        }
        Ok(())
    }
}
