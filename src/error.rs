//! Unified error types for xml-guardian.
//!
//! Failures caused by the *content* of an input document never surface
//! through this module: they are contained as [`crate::model::ValidationError`]
//! records inside the per-file result, per the propagation policy of the
//! engine. `XmlGuardianError` is reserved for operations on non-input files
//! (the checkpoint store, schema documents, generator output), invalid
//! configuration, and genuine programmer errors.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for xml-guardian operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum XmlGuardianError {
    /// Errors touching the checkpoint store
    #[error("Checkpoint operation failed: {context}")]
    Checkpoint {
        context: String,
        #[source]
        source: CheckpointErrorKind,
    },

    /// Errors loading or compiling a schema document
    #[error("Schema load failed: {context}")]
    Schema {
        context: String,
        #[source]
        source: SchemaErrorKind,
    },

    /// IO errors with path context
    #[error("IO error at {path:?}: {message}")]
    Io {
        path: Option<PathBuf>,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Configuration errors
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Errors while writing synthetic documents
    #[error("Generator error: {0}")]
    Generate(String),

    /// Unexpected invariant violation inside the engine
    #[error("Internal invariant violated: {0}")]
    Internal(String),
}

/// Specific checkpoint error kinds.
///
/// Corruption (an integrity-hash mismatch) is deliberately distinct from an
/// unparsable record and from plain IO failures: callers refuse to resume on
/// the first two but may retry the last.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CheckpointErrorKind {
    #[error("integrity hash mismatch in {path}")]
    Corrupt { path: PathBuf },

    #[error("unparsable checkpoint record: {0}")]
    Unparsable(String),

    #[error("checkpoint not found: {0}")]
    NotFound(PathBuf),

    #[error("serialization failed: {0}")]
    Serialization(String),
}

/// Specific schema error kinds
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SchemaErrorKind {
    #[error("schema document is not well-formed: {0}")]
    InvalidXml(String),

    #[error("unsupported schema syntax: {0}")]
    UnsupportedSyntax(String),

    #[error("unsupported pattern <{0}>")]
    UnsupportedPattern(String),

    #[error("reference to undefined pattern '{0}'")]
    UndefinedReference(String),

    #[error("invalid path expression '{0}'")]
    InvalidPath(String),
}

// ============================================================================
// Result type alias
// ============================================================================

/// Convenient Result type for xml-guardian operations
pub type Result<T> = std::result::Result<T, XmlGuardianError>;

// ============================================================================
// Error construction helpers
// ============================================================================

impl XmlGuardianError {
    /// Create a checkpoint error with context
    pub fn checkpoint(context: impl Into<String>, source: CheckpointErrorKind) -> Self {
        Self::Checkpoint {
            context: context.into(),
            source,
        }
    }

    /// Create a schema error with context
    pub fn schema(context: impl Into<String>, source: SchemaErrorKind) -> Self {
        Self::Schema {
            context: context.into(),
            source,
        }
    }

    /// Create an IO error with path context
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        let message = format!("{source}");
        Self::Io {
            path: Some(path),
            message,
            source,
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl From<std::io::Error> for XmlGuardianError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            path: None,
            message: format!("{err}"),
            source: err,
        }
    }
}

// ============================================================================
// Error context extension trait
// ============================================================================

/// Extension trait for adding context to errors.
///
/// The context string is prepended to the error's existing context, creating
/// a chain that shows the path through the code.
pub trait ErrorContext<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context from a closure (lazy evaluation).
    fn with_context<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>;
}

impl<T, E: Into<XmlGuardianError>> ErrorContext<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        let ctx: String = context.into();
        self.map_err(|e| add_context_to_error(e.into(), &ctx))
    }

    fn with_context<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>,
    {
        self.map_err(|e| {
            let ctx: String = f().into();
            add_context_to_error(e.into(), &ctx)
        })
    }
}

/// Add context to an error, chaining with any existing context.
fn add_context_to_error(err: XmlGuardianError, new_ctx: &str) -> XmlGuardianError {
    match err {
        XmlGuardianError::Checkpoint {
            context: existing,
            source,
        } => XmlGuardianError::Checkpoint {
            context: chain_context(new_ctx, &existing),
            source,
        },
        XmlGuardianError::Schema {
            context: existing,
            source,
        } => XmlGuardianError::Schema {
            context: chain_context(new_ctx, &existing),
            source,
        },
        XmlGuardianError::Io {
            path,
            message,
            source,
        } => XmlGuardianError::Io {
            path,
            message: chain_context(new_ctx, &message),
            source,
        },
        XmlGuardianError::Config(msg) => XmlGuardianError::Config(chain_context(new_ctx, &msg)),
        XmlGuardianError::Generate(msg) => XmlGuardianError::Generate(chain_context(new_ctx, &msg)),
        XmlGuardianError::Internal(msg) => XmlGuardianError::Internal(chain_context(new_ctx, &msg)),
    }
}

/// Chain two context strings together.
fn chain_context(new: &str, existing: &str) -> String {
    if existing.is_empty() {
        new.to_string()
    } else {
        format!("{new}: {existing}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = XmlGuardianError::checkpoint(
            "loading latest",
            CheckpointErrorKind::Corrupt {
                path: PathBuf::from("/tmp/cp.json"),
            },
        );
        let display = err.to_string();
        assert!(display.contains("Checkpoint"), "unexpected: {display}");

        let err = XmlGuardianError::config("max_depth must be positive");
        assert!(err.to_string().contains("max_depth"));
    }

    #[test]
    fn test_io_error_keeps_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = XmlGuardianError::io("/data/big.xml", io_err);
        assert!(err.to_string().contains("/data/big.xml"));
    }

    #[test]
    fn test_context_chaining() {
        let initial: Result<()> = Err(XmlGuardianError::checkpoint(
            "initial context",
            CheckpointErrorKind::Unparsable("bad json".into()),
        ));

        let err = initial.context("outer context");
        match err {
            Err(XmlGuardianError::Checkpoint { context, .. }) => {
                assert!(context.contains("outer context"), "missing outer: {context}");
                assert!(
                    context.contains("initial context"),
                    "missing inner: {context}"
                );
            }
            _ => panic!("Expected Checkpoint error"),
        }
    }

    #[test]
    fn test_with_context_lazy_evaluation() {
        let mut called = false;

        let ok_result: Result<i32> = Ok(42);
        let _ = ok_result.with_context(|| {
            called = true;
            "should not be called"
        });
        assert!(!called, "closure should not run for Ok result");

        let err_result: Result<i32> = Err(XmlGuardianError::config("bad"));
        let _ = err_result.with_context(|| {
            called = true;
            "should be called"
        });
        assert!(called, "closure should run for Err result");
    }

    #[test]
    fn test_chain_context_helper() {
        assert_eq!(chain_context("new", ""), "new");
        assert_eq!(chain_context("new", "existing"), "new: existing");
    }
}
