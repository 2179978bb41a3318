//! End-to-end scenarios over the public API.

use std::path::{Path, PathBuf};
use xml_guardian::{
    CheckpointConfig, CheckpointManager, DocumentGenerator, DocumentShape, RunConfig, Runner,
    StreamingValidator, ValidatorConfig, ValidatorHooks,
};

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn run_default(paths: &[PathBuf]) -> xml_guardian::ValidationResult {
    Runner::new(RunConfig::default())
        .unwrap()
        .validate_paths(paths)
        .unwrap()
}

#[test]
fn duplicate_id_in_one_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        dir.path(),
        "dup.xml",
        r#"<?xml version="1.0"?><r><a id="x"/><a id="x"/></r>"#,
    );
    let result = run_default(&[path]);

    assert!(!result.is_valid);
    assert_eq!(result.errors.len(), 1);
    let error = &result.errors[0];
    assert_eq!(error.rule_id.as_deref(), Some("cross-file-id"));
    assert_eq!(error.line, Some(1));
    assert!(error.message.contains("Duplicate ID 'x'"), "{}", error.message);
    // Attributed to the second <a>, which starts at column 36.
    assert_eq!(error.column, Some(36));
}

#[test]
fn mismatched_tags_yield_single_structure_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        dir.path(),
        "mismatch.xml",
        r#"<?xml version="1.0"?><r><a></b></r>"#,
    );
    let result = run_default(&[path]);

    assert!(!result.is_valid);
    assert_eq!(result.errors.len(), 1);
    let error = &result.errors[0];
    assert_eq!(error.rule_id.as_deref(), Some("structure"));
    assert_eq!(error.message, "Mismatched tags: expected </a>, got </b>");
}

#[test]
fn cross_file_duplicate_attributed_to_lexicographically_second_file() {
    let dir = tempfile::tempdir().unwrap();
    let f1 = write(dir.path(), "f1.xml", r#"<r><x id="k"/></r>"#);
    let f2 = write(dir.path(), "f2.xml", r#"<r><y id="k"/></r>"#);
    let result = run_default(&[f1.clone(), f2.clone()]);

    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].file, f2.display().to_string());
    assert_eq!(result.errors[0].rule_id.as_deref(), Some("cross-file-id"));
    assert!(result.warnings.is_empty());
    assert_eq!(result.validated_files.len(), 2);
    assert_eq!(result.checksums.len(), 2);
}

#[test]
fn phase_out_of_order_flagged_at_offending_phase() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        dir.path(),
        "phases.xml",
        "<document>\n\
         <phases>\n\
         <phase name=\"begin\"/>\n\
         <phase name=\"start\"/>\n\
         <phase name=\"end\"/>\n\
         <phase name=\"iteration\"/>\n\
         </phases>\n\
         </document>\n",
    );
    let result = run_default(&[path]);

    assert!(!result.is_valid);
    assert_eq!(result.errors.len(), 1);
    let error = &result.errors[0];
    assert_eq!(error.rule_id.as_deref(), Some("phase-order"));
    assert!(error.message.contains("'iteration'"));
    assert_eq!(error.line, Some(6));
}

#[test]
fn decreasing_timestamps_flagged_at_second_phase() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        dir.path(),
        "times.xml",
        "<document>\n\
         <phases>\n\
         <phase name=\"begin\" timestamp=\"2025-01-01T10:00:00Z\"/>\n\
         <phase name=\"start\" timestamp=\"2025-01-01T09:00:00Z\"/>\n\
         </phases>\n\
         </document>\n",
    );
    let result = run_default(&[path]);

    assert!(!result.is_valid);
    assert_eq!(result.errors.len(), 1);
    let error = &result.errors[0];
    assert_eq!(error.rule_id.as_deref(), Some("temporal-monotonicity"));
    assert_eq!(error.line, Some(4));
}

#[test]
fn malformed_timestamp_is_temporal_warning_not_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        dir.path(),
        "badtime.xml",
        r#"<document><phases><phase name="begin" timestamp="yesterday"/></phases></document>"#,
    );
    let result = run_default(&[path]);

    assert!(result.is_valid);
    assert_eq!(result.warnings.len(), 1);
    assert_eq!(result.warnings[0].rule_id.as_deref(), Some("temporal"));
}

#[test]
fn errors_within_a_file_follow_document_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        dir.path(),
        "ordered.xml",
        "<r>\n\
         <a id=\"one\"/>\n\
         <b id=\"one\"/>\n\
         <c id=\"two\"/>\n\
         <d id=\"two\"/>\n\
         </r>\n",
    );
    let result = run_default(&[path]);

    assert_eq!(result.errors.len(), 2);
    assert_eq!(result.errors[0].line, Some(3));
    assert_eq!(result.errors[1].line, Some(5));
}

#[test]
fn streamed_large_file_checkpoints_and_resumes_to_same_result() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("large.xml");
    let cp_dir = dir.path().join("cps");
    DocumentGenerator::new()
        .generate(&input, 2_000_000, DocumentShape::Nested, 17)
        .unwrap();

    // Full streaming run with periodic checkpoints.
    let config = RunConfig::default()
        .with_force_streaming(true)
        .with_checkpoints(
            CheckpointConfig::default()
                .with_dir(&cp_dir)
                .with_interval_bytes(256 * 1024)
                .with_max_checkpoints(0),
        );
    let result = Runner::new(config).unwrap().validate_paths(&[input.clone()]).unwrap();
    assert!(result.is_valid, "errors: {:?}", result.errors);
    assert!(result.used_streaming);

    let manager = CheckpointManager::new(&cp_dir, 0).unwrap();
    let checkpoints = manager.list_for(&input).unwrap();
    assert!(checkpoints.len() >= 2, "expected several checkpoints");

    // Count elements of the full run.
    let full = StreamingValidator::new(ValidatorConfig::default()).validate_file(&input);
    assert!(full.is_valid());

    // Resume from a mid-file checkpoint; prior counts are trusted, so the
    // final element count must equal the full run's.
    let midpoint = manager.load(&checkpoints[checkpoints.len() / 2]).unwrap();
    let resumed = StreamingValidator::new(ValidatorConfig::default()).resume_file(
        &input,
        &midpoint,
        ValidatorHooks::none(),
    );
    assert!(resumed.is_valid(), "errors: {:?}", resumed.errors);
    assert_eq!(
        resumed.stats.elements_validated,
        full.stats.elements_validated
    );
}

#[test]
fn run_survives_mixed_good_and_broken_files() {
    let dir = tempfile::tempdir().unwrap();
    let good = write(dir.path(), "a_good.xml", "<r><x id=\"a\"/></r>");
    let broken = write(dir.path(), "b_broken.xml", "<r><unclosed></r>");
    let missing = dir.path().join("c_missing.xml");

    let result = run_default(&[good.clone(), broken, missing]);
    assert!(!result.is_valid);
    // The good file is still fully validated and checksummed.
    assert!(result
        .validated_files
        .contains(&good.display().to_string()));
    assert!(result.checksums.contains_key(&good.display().to_string()));
    // One structure error, one io error.
    let rules: Vec<_> = result
        .errors
        .iter()
        .filter_map(|e| e.rule_id.clone())
        .collect();
    assert!(rules.contains(&"structure".to_string()));
    assert!(rules.contains(&"io".to_string()));
}
