//! Run orchestrator: drives validation over one or many files.
//!
//! Files are iterated in lexicographic path order so runs are
//! deterministic. Each file produces a [`FileFragment`]; fragments are
//! folded into one [`ValidationResult`] in iteration order, and identifier
//! and reference observations are replayed into the run-wide
//! [`CrossFileIndex`] in the same order, which keeps duplicate-ID
//! attribution on the second occurrence regardless of how the per-file
//! work was scheduled.
//!
//! With `RunConfig::parallel`, per-file validation fans out on the rayon
//! pool; folding stays sequential and ordered, so parallel and sequential
//! runs produce identical results.

use crate::checkpoint::{CheckpointManager, CheckpointWriter};
use crate::config::{RunConfig, Validatable};
use crate::crossfile::CrossFileIndex;
use crate::error::{Result, XmlGuardianError};
use crate::model::{
    rules, FileFragment, ParserEvent, ResultAggregator, ValidationError, ValidationResult,
};
use crate::parser::{EventStream, FatalParseError, ParserOptions};
use crate::schema::SchemaSet;
use crate::tree::XmlDocument;
use crate::utils::sha256_file;
use crate::validator::{CancelToken, ReplaySource, StreamingValidator, ValidatorHooks};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Orchestrates validation runs.
pub struct Runner {
    config: RunConfig,
    validator: StreamingValidator,
    schemas: SchemaSet,
    checkpoints: Option<CheckpointManager>,
}

impl Runner {
    /// Build a runner: validates the configuration, compiles schemas and
    /// prepares the checkpoint store.
    pub fn new(config: RunConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| XmlGuardianError::config(e.to_string()))?;

        let schemas = match &config.schema {
            Some(schema_config) => SchemaSet::load(schema_config)?,
            None => SchemaSet::default(),
        };
        let checkpoints = match &config.checkpoints {
            Some(checkpoint_config) => Some(CheckpointManager::new(
                checkpoint_config.dir.clone(),
                checkpoint_config.max_checkpoints,
            )?),
            None => None,
        };
        let validator = StreamingValidator::new(config.validator.clone());

        Ok(Self {
            config,
            validator,
            schemas,
            checkpoints,
        })
    }

    /// Validate a set of files. Paths are sorted lexicographically first.
    pub fn validate_paths(&self, paths: &[PathBuf]) -> Result<ValidationResult> {
        self.validate_paths_cancellable(paths, &CancelToken::new())
    }

    /// Validate a set of files with a cooperative cancel signal. On cancel
    /// the in-flight file's partial result is discarded; fragments already
    /// folded are kept.
    pub fn validate_paths_cancellable(
        &self,
        paths: &[PathBuf],
        cancel: &CancelToken,
    ) -> Result<ValidationResult> {
        let mut sorted: Vec<PathBuf> = paths.to_vec();
        sorted.sort();

        info!(files = sorted.len(), parallel = self.config.parallel, "validation run started");

        let fragments: Vec<FileFragment> = if self.config.parallel {
            sorted
                .par_iter()
                .map(|path| self.validate_one(path, cancel))
                .collect()
        } else {
            let mut collected = Vec::with_capacity(sorted.len());
            for path in &sorted {
                if cancel.is_cancelled() {
                    break;
                }
                collected.push(self.validate_one(path, cancel));
            }
            collected
        };

        let mut aggregator = ResultAggregator::new();
        let mut index = CrossFileIndex::new();
        for fragment in fragments {
            if fragment.cancelled {
                break;
            }
            let mut cross_errors = Vec::new();
            for observation in &fragment.observed_ids {
                if let Some(error) = index.observe_id(&fragment.file, observation) {
                    cross_errors.push(error);
                }
            }
            for observation in &fragment.observed_refs {
                index.observe_reference(&fragment.file, observation);
            }
            aggregator.fold_fragment(fragment);
            aggregator.extend_findings(cross_errors);
        }
        aggregator.extend_findings(index.finalize());

        let result = aggregator.finish();
        info!(
            files = result.validated_files.len(),
            errors = result.errors.len(),
            warnings = result.warnings.len(),
            is_valid = result.is_valid,
            "validation run finished"
        );
        Ok(result)
    }

    /// Validate every `.xml` file under a directory tree.
    pub fn validate_project(&self, root: &Path) -> Result<ValidationResult> {
        let mut files = Vec::new();
        collect_xml_files(root, &mut files)?;
        self.validate_paths(&files)
    }

    /// Validate one file into a fragment. Never fails: all input-caused
    /// problems are contained as findings.
    fn validate_one(&self, path: &Path, cancel: &CancelToken) -> FileFragment {
        let label = path.display().to_string();
        debug!(file = %label, "validating");

        let checksum = match sha256_file(path) {
            Ok(checksum) => checksum,
            Err(err) => {
                let mut fragment = FileFragment::new(&label);
                fragment
                    .errors
                    .push(ValidationError::error(&label, err.to_string(), rules::IO));
                fragment.completed = false;
                return fragment;
            }
        };
        let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);

        let schema_applies = !self.schemas.is_empty();
        let buffer_for_schema = schema_applies
            && self
                .config
                .schema
                .as_ref()
                .is_some_and(|s| size <= s.effective_buffer_limit());
        let wants_streaming =
            self.config.force_streaming || size >= self.config.streaming_threshold_bytes;

        let mut fragment = if wants_streaming && !buffer_for_schema {
            self.validate_streaming(path, cancel)
        } else {
            self.validate_buffered(path, cancel, buffer_for_schema)
        };
        if schema_applies && !buffer_for_schema && fragment.completed && !fragment.cancelled {
            fragment.warnings.push(ValidationError::warning(
                &label,
                format!("Schema validation skipped: file size {size} exceeds the buffer limit"),
                rules::STREAMING,
            ));
        }

        if fragment.completed {
            fragment.checksum = Some(checksum);
        }
        fragment
    }

    fn streaming_hooks<'a>(&'a self, path: &Path, cancel: &'a CancelToken) -> ValidatorHooks<'a> {
        let checkpoints = match (&self.checkpoints, &self.config.checkpoints) {
            (Some(manager), Some(config)) if config.interval_bytes > 0 => {
                Some(CheckpointWriter::new(manager, path, config.interval_bytes))
            }
            _ => None,
        };
        ValidatorHooks {
            checkpoints,
            cancel: Some(cancel),
        }
    }

    fn validate_streaming(&self, path: &Path, cancel: &CancelToken) -> FileFragment {
        // Resume from the latest intact checkpoint when configured; a
        // corrupt or unparsable record refuses resume and the file is
        // validated from its start with a warning.
        if let (Some(manager), Some(config)) = (&self.checkpoints, &self.config.checkpoints) {
            if config.resume {
                match manager.latest(path) {
                    Ok(Some(latest)) => match manager.load(&latest) {
                        Ok(checkpoint) => {
                            let mut hooks = self.streaming_hooks(path, cancel);
                            if let Some(writer) = hooks.checkpoints.take() {
                                hooks.checkpoints = Some(writer.resuming_after(&checkpoint));
                            }
                            return self.validator.resume_file(path, &checkpoint, hooks);
                        }
                        Err(err) => {
                            warn!(file = %path.display(), error = %err, "resume refused");
                            let label = path.display().to_string();
                            let mut fragment = self.validator.validate_file_with(
                                path,
                                self.streaming_hooks(path, cancel),
                            );
                            fragment.warnings.push(ValidationError::warning(
                                &label,
                                format!("Checkpoint resume refused, validated from start: {err}"),
                                rules::CHECKPOINT_CORRUPT,
                            ));
                            return fragment;
                        }
                    },
                    Ok(None) => {}
                    Err(err) => {
                        warn!(file = %path.display(), error = %err, "checkpoint listing failed");
                    }
                }
            }
        }
        self.validator
            .validate_file_with(path, self.streaming_hooks(path, cancel))
    }

    fn validate_buffered(
        &self,
        path: &Path,
        cancel: &CancelToken,
        run_schemas: bool,
    ) -> FileFragment {
        let label = path.display().to_string();
        let options = ParserOptions {
            namespace_aware: self.validator.config().namespace_aware,
            ..ParserOptions::default()
        };
        let stream = match EventStream::from_path_with(path, options) {
            Ok(stream) => stream,
            Err(err) => {
                let mut fragment = FileFragment::new(&label);
                fragment
                    .errors
                    .push(ValidationError::error(&label, err.to_string(), rules::IO));
                fragment.completed = false;
                return fragment;
            }
        };

        let collected: Vec<std::result::Result<ParserEvent, FatalParseError>> = stream.collect();
        let tree = if run_schemas {
            XmlDocument::from_results(&collected)
        } else {
            None
        };

        let mut source = ReplaySource::new(collected);
        let hooks = ValidatorHooks {
            checkpoints: None,
            cancel: Some(cancel),
        };
        let mut fragment = self
            .validator
            .validate_source(&label, &mut source, hooks, None);
        if fragment.cancelled || !fragment.completed {
            return fragment;
        }

        if run_schemas {
            match tree {
                Some(tree) => {
                    let (errors, warnings) = self.schemas.validate(&tree, &label);
                    let had_schema_findings = !errors.is_empty() || !warnings.is_empty();
                    fragment.errors.extend(errors);
                    fragment.warnings.extend(warnings);
                    if had_schema_findings {
                        sort_by_position(&mut fragment.errors);
                        sort_by_position(&mut fragment.warnings);
                    }
                }
                // A document without structural findings must have buffered
                // into a tree; anything else is an engine invariant breach,
                // surfaced without crashing the run.
                None => {
                    if fragment.is_valid() {
                        fragment.errors.push(ValidationError::error(
                            &label,
                            "well-nested document failed to buffer for schema validation",
                            rules::INTERNAL,
                        ));
                    }
                }
            }
        }
        fragment
    }
}

/// Stable position sort used to merge schema findings into document order.
fn sort_by_position(findings: &mut [ValidationError]) {
    findings.sort_by_key(|finding| {
        (
            finding.line.unwrap_or(u64::MAX),
            finding.column.unwrap_or(u64::MAX),
        )
    });
}

fn collect_xml_files(root: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries = std::fs::read_dir(root).map_err(|e| XmlGuardianError::io(root, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| XmlGuardianError::io(root, e))?;
        let path = entry.path();
        if path.is_dir() {
            collect_xml_files(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == "xml") {
            out.push(path);
        }
    }
    Ok(())
}
