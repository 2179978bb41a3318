//! Streaming vs tree-mode equivalence (and memory behavior sanity).
//!
//! For any document that fits in memory, streaming validation and
//! validation over the fully materialized event buffer must agree on
//! validity, findings and checksums.

use std::path::{Path, PathBuf};
use xml_guardian::{
    DocumentGenerator, DocumentShape, RunConfig, Runner, ValidationError, ValidationResult,
};

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn finding_keys(findings: &[ValidationError]) -> Vec<(String, Option<u64>, Option<String>, String)> {
    let mut keys: Vec<_> = findings
        .iter()
        .map(|f| (f.file.clone(), f.line, f.rule_id.clone(), f.message.clone()))
        .collect();
    keys.sort();
    keys
}

fn assert_equivalent(streamed: &ValidationResult, buffered: &ValidationResult) {
    assert_eq!(streamed.is_valid, buffered.is_valid);
    assert_eq!(finding_keys(&streamed.errors), finding_keys(&buffered.errors));
    assert_eq!(
        finding_keys(&streamed.warnings),
        finding_keys(&buffered.warnings)
    );
    assert_eq!(streamed.checksums, buffered.checksums);
    assert_eq!(streamed.validated_files, buffered.validated_files);
    assert!(streamed.used_streaming);
    assert!(!buffered.used_streaming);
}

fn both_modes(paths: &[PathBuf]) -> (ValidationResult, ValidationResult) {
    let streamed = Runner::new(RunConfig::default().with_force_streaming(true))
        .unwrap()
        .validate_paths(paths)
        .unwrap();
    let buffered = Runner::new(RunConfig::default())
        .unwrap()
        .validate_paths(paths)
        .unwrap();
    (streamed, buffered)
}

#[test]
fn equivalent_on_generated_documents() {
    let dir = tempfile::tempdir().unwrap();
    let mut paths = Vec::new();
    for (i, shape) in [
        DocumentShape::Simple,
        DocumentShape::Complex,
        DocumentShape::Nested,
        DocumentShape::Realistic,
    ]
    .into_iter()
    .enumerate()
    {
        let path = dir.path().join(format!("doc{i}.xml"));
        DocumentGenerator::new()
            .generate(&path, 30_000, shape, i as u64 + 100)
            .unwrap();
        paths.push(path);
    }

    let (streamed, buffered) = both_modes(&paths);
    assert_equivalent(&streamed, &buffered);
}

#[test]
fn equivalent_on_structural_errors() {
    let dir = tempfile::tempdir().unwrap();
    let paths = vec![
        write(dir.path(), "mismatch.xml", "<r><a></b></r>"),
        write(dir.path(), "unclosed.xml", "<r><a>"),
        write(dir.path(), "stray.xml", "<r></r></r>"),
    ];
    let (streamed, buffered) = both_modes(&paths);
    assert_equivalent(&streamed, &buffered);
    assert!(!streamed.is_valid);
}

#[test]
fn equivalent_on_rule_findings() {
    let dir = tempfile::tempdir().unwrap();
    let paths = vec![
        write(
            dir.path(),
            "ids.xml",
            r#"<r><a id="x"/><b id="x"/><c ref="nowhere"/></r>"#,
        ),
        write(
            dir.path(),
            "phases.xml",
            r#"<document><phases><phase name="end" timestamp="2025-01-01T10:00:00Z"/><phase name="begin" timestamp="2025-01-01T09:00:00Z"/></phases></document>"#,
        ),
    ];
    let (streamed, buffered) = both_modes(&paths);
    assert_equivalent(&streamed, &buffered);
    assert!(!streamed.is_valid);
}

#[test]
fn equivalent_on_syntax_errors() {
    let dir = tempfile::tempdir().unwrap();
    let paths = vec![
        write(dir.path(), "entity.xml", "<r>&undefined;</r>"),
        write(dir.path(), "dupattr.xml", r#"<r a="1" a="2"/>"#),
    ];
    let (streamed, buffered) = both_modes(&paths);
    assert_equivalent(&streamed, &buffered);
    assert!(!streamed.is_valid);
}

#[test]
fn streaming_state_stays_small_on_flat_documents() {
    // A proxy for the memory bound: the parser state snapshot scales with
    // depth, not with document size.
    let dir = tempfile::tempdir().unwrap();
    let small = dir.path().join("small.xml");
    let large = dir.path().join("large.xml");
    DocumentGenerator::new()
        .generate(&small, 5_000, DocumentShape::Simple, 1)
        .unwrap();
    DocumentGenerator::new()
        .generate(&large, 500_000, DocumentShape::Simple, 1)
        .unwrap();

    let depth_of = |path: &Path| {
        let mut stream = xml_guardian::EventStream::from_path(path).unwrap();
        let mut max_stack = 0;
        while let Some(event) = stream.next() {
            event.unwrap();
            max_stack = max_stack.max(stream.state_after_last_event().element_stack.len());
        }
        max_stack
    };

    let small_depth = depth_of(&small);
    let large_depth = depth_of(&large);
    // Same shape and seed: the 100x larger file must not have a deeper
    // parser stack.
    assert!(large_depth <= small_depth.max(6));
}
