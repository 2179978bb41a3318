//! Performance harness comparing streaming and in-memory tree validation.
//!
//! Both methods run over the same file, each on a fresh thread after the
//! peak-memory watermark is reset. The harness records duration, peak
//! resident memory, throughput and success per method; an out-of-memory or
//! timed-out method is a failure *record*, never a crash of the harness.

pub mod memory;

use crate::config::{RunConfig, DEFAULT_HARNESS_TIMEOUT};
use crate::error::Result;
use crate::model::{FileFragment, ParserEvent};
use crate::parser::{EventStream, FatalParseError, ParserOptions};
use crate::validator::{ReplaySource, StreamingValidator, ValidatorHooks};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};
use tracing::info;

/// The two comparable validation methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMethod {
    /// Event-at-a-time validation, bounded memory
    Streaming,
    /// Buffer all events, validate the materialized document
    Tree,
}

impl std::fmt::Display for ValidationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Streaming => write!(f, "streaming"),
            Self::Tree => write!(f, "tree"),
        }
    }
}

/// Measurements for one method over one file.
#[derive(Debug, Clone, Serialize)]
pub struct MethodOutcome {
    pub method: ValidationMethod,
    pub file_size_mb: f64,
    pub duration_seconds: f64,
    pub peak_memory_mb: f64,
    pub throughput_mbps: f64,
    pub success: bool,
    pub error: Option<String>,
    pub elements_processed: u64,
    pub is_valid: Option<bool>,
}

impl MethodOutcome {
    fn failure(method: ValidationMethod, file_size_mb: f64, error: String) -> Self {
        Self {
            method,
            file_size_mb,
            duration_seconds: 0.0,
            peak_memory_mb: 0.0,
            throughput_mbps: 0.0,
            success: false,
            error: Some(error),
            elements_processed: 0,
            is_valid: None,
        }
    }
}

/// Complete comparison over one file.
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkReport {
    pub file_path: String,
    pub file_size_mb: f64,
    pub streaming: Option<MethodOutcome>,
    pub tree: Option<MethodOutcome>,
    pub timestamp: DateTime<Utc>,
}

impl BenchmarkReport {
    /// Human-readable report.
    #[must_use]
    pub fn format_report(&self) -> String {
        let mut lines = Vec::new();
        lines.push("XML validation performance comparison".to_string());
        lines.push(format!("file: {} ({:.1} MB)", self.file_path, self.file_size_mb));
        lines.push(String::new());
        lines.push(format!(
            "{:<12} {:>10} {:>12} {:>12} {:>10}",
            "method", "time", "peak memory", "throughput", "status"
        ));
        for outcome in [self.streaming.as_ref(), self.tree.as_ref()]
            .into_iter()
            .flatten()
        {
            if outcome.success {
                lines.push(format!(
                    "{:<12} {:>9.2}s {:>9.1} MB {:>7.1} MB/s {:>10}",
                    outcome.method.to_string(),
                    outcome.duration_seconds,
                    outcome.peak_memory_mb,
                    outcome.throughput_mbps,
                    "ok"
                ));
            } else {
                lines.push(format!(
                    "{:<12} {:>10} {:>12} {:>12} {:>10}",
                    outcome.method.to_string(),
                    "-",
                    "-",
                    "-",
                    outcome.error.as_deref().unwrap_or("failed")
                ));
            }
        }
        if let (Some(streaming), Some(tree)) = (&self.streaming, &self.tree) {
            if streaming.success && tree.success && streaming.peak_memory_mb > 0.0 {
                lines.push(String::new());
                lines.push(format!(
                    "tree used {:.1}x the memory of streaming",
                    tree.peak_memory_mb / streaming.peak_memory_mb
                ));
            }
        }
        lines.join("\n")
    }

    /// JSON export of the report.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| crate::error::XmlGuardianError::internal(e.to_string()))
    }
}

/// Harness settings.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Wall-clock bound per method; exceeding it is a timeout failure
    pub timeout: Duration,
    pub run: RunConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_HARNESS_TIMEOUT,
            run: RunConfig::default(),
        }
    }
}

/// Runs both validation methods over a file and reports the comparison.
#[derive(Debug, Default)]
pub struct BenchmarkRunner {
    config: HarnessConfig,
}

impl BenchmarkRunner {
    #[must_use]
    pub fn new(config: HarnessConfig) -> Self {
        Self { config }
    }

    /// Compare streaming and tree validation over `path`.
    pub fn run(&self, path: &Path) -> Result<BenchmarkReport> {
        let size = std::fs::metadata(path)
            .map_err(|e| crate::error::XmlGuardianError::io(path, e))?
            .len();
        let file_size_mb = size as f64 / 1024.0 / 1024.0;

        info!(file = %path.display(), size_mb = file_size_mb, "benchmark started");
        let streaming = self.run_method(path, file_size_mb, ValidationMethod::Streaming);
        let tree = self.run_method(path, file_size_mb, ValidationMethod::Tree);

        Ok(BenchmarkReport {
            file_path: path.display().to_string(),
            file_size_mb,
            streaming: Some(streaming),
            tree: Some(tree),
            timestamp: Utc::now(),
        })
    }

    fn run_method(
        &self,
        path: &Path,
        file_size_mb: f64,
        method: ValidationMethod,
    ) -> MethodOutcome {
        memory::reset_peak_rss();
        let baseline_mb = memory::peak_rss_mb().unwrap_or(0.0);
        let started = Instant::now();

        let (sender, receiver) = mpsc::channel();
        let worker_path: PathBuf = path.to_path_buf();
        let validator_config = self.config.run.validator.clone();
        let builder = std::thread::Builder::new().name(format!("bench-{method}"));
        let spawned = builder.spawn(move || {
            let outcome = std::panic::catch_unwind(|| match method {
                ValidationMethod::Streaming => run_streaming(&worker_path, &validator_config),
                ValidationMethod::Tree => run_tree(&worker_path, &validator_config),
            });
            // The receiver may have timed out and gone away.
            let _ = sender.send(outcome);
        });
        let Ok(handle) = spawned else {
            return MethodOutcome::failure(method, file_size_mb, "failed to spawn worker".into());
        };

        let received = receiver.recv_timeout(self.config.timeout);
        let duration = started.elapsed();
        let peak_mb = memory::peak_rss_mb()
            .map(|peak| (peak - baseline_mb).max(0.0))
            .unwrap_or(0.0);

        match received {
            Ok(Ok(fragment)) => {
                let _ = handle.join();
                let duration_seconds = duration.as_secs_f64();
                let throughput = if duration_seconds > 0.0 {
                    file_size_mb / duration_seconds
                } else {
                    0.0
                };
                MethodOutcome {
                    method,
                    file_size_mb,
                    duration_seconds,
                    peak_memory_mb: peak_mb,
                    throughput_mbps: throughput,
                    success: true,
                    error: None,
                    elements_processed: fragment.stats.elements_validated,
                    is_valid: Some(fragment.is_valid()),
                }
            }
            // A panicking worker (allocation failure included) is a failure
            // record, not a harness crash.
            Ok(Err(_panic)) => MethodOutcome::failure(
                method,
                file_size_mb,
                "method aborted (out of memory or internal panic)".into(),
            ),
            Err(mpsc::RecvTimeoutError::Timeout) => MethodOutcome::failure(
                method,
                file_size_mb,
                format!("timed out after {}s", self.config.timeout.as_secs()),
            ),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                MethodOutcome::failure(method, file_size_mb, "worker disappeared".into())
            }
        }
    }
}

fn run_streaming(path: &Path, config: &crate::config::ValidatorConfig) -> FileFragment {
    StreamingValidator::new(config.clone()).validate_file(path)
}

fn run_tree(path: &Path, config: &crate::config::ValidatorConfig) -> FileFragment {
    let label = path.display().to_string();
    let options = ParserOptions {
        namespace_aware: config.namespace_aware,
        ..ParserOptions::default()
    };
    let collected: Vec<std::result::Result<ParserEvent, FatalParseError>> =
        match EventStream::from_path_with(path, options) {
            Ok(stream) => stream.collect(),
            Err(err) => {
                let mut fragment = FileFragment::new(&label);
                fragment.errors.push(crate::model::ValidationError::error(
                    &label,
                    err.to_string(),
                    crate::model::rules::IO,
                ));
                fragment.completed = false;
                return fragment;
            }
        };
    let mut source = ReplaySource::new(collected);
    StreamingValidator::new(config.clone()).validate_source(
        &label,
        &mut source,
        ValidatorHooks::none(),
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{DocumentGenerator, DocumentShape};

    #[test]
    fn test_both_methods_agree_on_validity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bench.xml");
        DocumentGenerator::new()
            .generate(&path, 50_000, DocumentShape::Complex, 5)
            .unwrap();

        let report = BenchmarkRunner::new(HarnessConfig::default())
            .run(&path)
            .unwrap();
        let streaming = report.streaming.unwrap();
        let tree = report.tree.unwrap();
        assert!(streaming.success);
        assert!(tree.success);
        assert_eq!(streaming.is_valid, tree.is_valid);
        assert_eq!(streaming.elements_processed, tree.elements_processed);
    }

    #[test]
    fn test_timeout_is_failure_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slow.xml");
        DocumentGenerator::new()
            .generate(&path, 3_000_000, DocumentShape::Simple, 6)
            .unwrap();

        let config = HarnessConfig {
            timeout: Duration::from_nanos(1),
            run: RunConfig::default(),
        };
        let report = BenchmarkRunner::new(config).run(&path).unwrap();
        let streaming = report.streaming.unwrap();
        assert!(!streaming.success);
        assert!(streaming.error.unwrap().contains("timed out"));
    }

    #[test]
    fn test_report_formats() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.xml");
        DocumentGenerator::new()
            .generate(&path, 10_000, DocumentShape::Simple, 8)
            .unwrap();
        let report = BenchmarkRunner::new(HarnessConfig::default())
            .run(&path)
            .unwrap();
        let text = report.format_report();
        assert!(text.contains("streaming"));
        assert!(text.contains("tree"));
        let json = report.to_json().unwrap();
        assert!(json.contains("\"file_size_mb\""));
    }

    #[test]
    fn test_missing_file_is_error() {
        let result = BenchmarkRunner::new(HarnessConfig::default())
            .run(Path::new("/nonexistent/bench.xml"));
        assert!(result.is_err());
    }
}
