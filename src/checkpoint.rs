//! Durable, integrity-checked snapshots of validator state.
//!
//! Checkpoints are JSON records written atomically (temp file + rename)
//! into a checkpoint directory. The `integrity_hash` field is the SHA-256
//! of the record's canonical serialization: keys sorted ascending, compact
//! separators, UTF-8, with the hash field itself excluded. A record whose
//! recomputed hash disagrees with the stored one is refused with a
//! corruption error distinct from plain IO failures, and resume is
//! disabled for it.

use crate::error::{CheckpointErrorKind, Result, XmlGuardianError};
use crate::model::ParserState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Current checkpoint format version.
pub const CHECKPOINT_FORMAT_VERSION: &str = "2.0";

/// Snapshot of validator state sufficient to resume from `byte_offset`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationCheckpoint {
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub file_path: String,
    pub byte_offset: u64,
    pub element_stack: Vec<String>,
    pub namespace_bindings: BTreeMap<String, String>,
    pub errors_count: u64,
    pub warnings_count: u64,
    pub elements_validated: u64,
    pub bytes_processed: u64,
    pub sequence_number: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrity_hash: Option<String>,
}

impl ValidationCheckpoint {
    /// Build a checkpoint from a parser-state snapshot and running counts.
    #[must_use]
    pub fn from_state(
        file_path: &Path,
        state: &ParserState,
        errors_count: u64,
        warnings_count: u64,
        elements_validated: u64,
        sequence_number: u64,
    ) -> Self {
        Self {
            version: CHECKPOINT_FORMAT_VERSION.to_string(),
            timestamp: Utc::now(),
            file_path: file_path.display().to_string(),
            byte_offset: state.byte_offset,
            element_stack: state.element_stack.clone(),
            namespace_bindings: state.namespace_bindings.clone(),
            errors_count,
            warnings_count,
            elements_validated,
            bytes_processed: state.bytes_processed,
            sequence_number,
            integrity_hash: None,
        }
    }

    /// Parser-state seed for resuming: stack, bindings and counters; line
    /// and column are rebuilt by the reader on open.
    #[must_use]
    pub fn to_parser_state(&self) -> ParserState {
        ParserState {
            byte_offset: self.byte_offset,
            line: 1,
            column: 1,
            element_stack: self.element_stack.clone(),
            namespace_bindings: self.namespace_bindings.clone(),
            elements_seen: self.elements_validated,
            bytes_processed: self.bytes_processed,
            depth: self.element_stack.len(),
        }
    }

    /// Canonical serialization used for hashing: sorted keys, compact
    /// separators, the `integrity_hash` field excluded.
    fn canonical_json(&self) -> Result<String> {
        let value = serde_json::to_value(self).map_err(|e| {
            XmlGuardianError::checkpoint(
                "canonicalizing record",
                CheckpointErrorKind::Serialization(e.to_string()),
            )
        })?;
        let serde_json::Value::Object(map) = value else {
            return Err(XmlGuardianError::internal(
                "checkpoint serialized to a non-object value",
            ));
        };
        let sorted: BTreeMap<String, serde_json::Value> = map
            .into_iter()
            .filter(|(key, _)| key != "integrity_hash")
            .collect();
        serde_json::to_string(&sorted).map_err(|e| {
            XmlGuardianError::checkpoint(
                "canonicalizing record",
                CheckpointErrorKind::Serialization(e.to_string()),
            )
        })
    }

    /// Compute the hex SHA-256 integrity hash over the canonical form.
    pub fn compute_integrity_hash(&self) -> Result<String> {
        let canonical = self.canonical_json()?;
        let digest = Sha256::digest(canonical.as_bytes());
        Ok(format!("{digest:x}"))
    }

    /// Whether the stored hash matches the recomputed one.
    pub fn verify_integrity(&self) -> Result<bool> {
        match &self.integrity_hash {
            Some(stored) => Ok(*stored == self.compute_integrity_hash()?),
            None => Ok(false),
        }
    }
}

/// Manages the checkpoint files of a validation run.
#[derive(Debug)]
pub struct CheckpointManager {
    dir: PathBuf,
    max_checkpoints: usize,
}

impl CheckpointManager {
    /// Create a manager over `dir`, creating the directory if needed.
    /// `max_checkpoints` bounds retained checkpoints per file (0 = unlimited).
    pub fn new(dir: impl Into<PathBuf>, max_checkpoints: usize) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| XmlGuardianError::io(dir.clone(), e))?;
        Ok(Self {
            dir,
            max_checkpoints,
        })
    }

    /// Directory holding checkpoint records.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn checkpoint_path(&self, for_file: &Path, sequence_number: u64) -> PathBuf {
        let safe_name = sanitize_file_name(for_file);
        self.dir
            .join(format!("{safe_name}_checkpoint_{sequence_number}.json"))
    }

    /// Write a checkpoint durably: stamp the integrity hash, write to a
    /// sibling temporary path, rename into place, then enforce retention.
    pub fn save(&self, checkpoint: &mut ValidationCheckpoint, for_file: &Path) -> Result<PathBuf> {
        checkpoint.integrity_hash = Some(checkpoint.compute_integrity_hash()?);

        let final_path = self.checkpoint_path(for_file, checkpoint.sequence_number);
        let temp_path = final_path.with_extension("json.tmp");

        let payload = serde_json::to_string_pretty(checkpoint).map_err(|e| {
            XmlGuardianError::checkpoint(
                "serializing record",
                CheckpointErrorKind::Serialization(e.to_string()),
            )
        })?;

        if let Err(e) = std::fs::write(&temp_path, payload) {
            return Err(XmlGuardianError::io(temp_path, e));
        }
        if let Err(e) = std::fs::rename(&temp_path, &final_path) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(XmlGuardianError::io(final_path, e));
        }

        debug!(
            path = %final_path.display(),
            sequence = checkpoint.sequence_number,
            byte_offset = checkpoint.byte_offset,
            "checkpoint written"
        );

        self.enforce_retention(for_file)?;
        Ok(final_path)
    }

    /// Load a checkpoint, refusing records that fail the integrity check.
    pub fn load(&self, path: &Path) -> Result<ValidationCheckpoint> {
        if !path.exists() {
            return Err(XmlGuardianError::checkpoint(
                "loading record",
                CheckpointErrorKind::NotFound(path.to_path_buf()),
            ));
        }
        let payload =
            std::fs::read_to_string(path).map_err(|e| XmlGuardianError::io(path, e))?;
        let checkpoint: ValidationCheckpoint = serde_json::from_str(&payload).map_err(|e| {
            XmlGuardianError::checkpoint(
                format!("loading {}", path.display()),
                CheckpointErrorKind::Unparsable(e.to_string()),
            )
        })?;

        if !checkpoint.verify_integrity()? {
            warn!(path = %path.display(), "checkpoint failed integrity check");
            return Err(XmlGuardianError::checkpoint(
                "loading record",
                CheckpointErrorKind::Corrupt {
                    path: path.to_path_buf(),
                },
            ));
        }
        Ok(checkpoint)
    }

    /// Checkpoints recorded for `for_file`, ordered by sequence number.
    pub fn list_for(&self, for_file: &Path) -> Result<Vec<PathBuf>> {
        let prefix = format!("{}_checkpoint_", sanitize_file_name(for_file));
        let mut found: Vec<(u64, PathBuf)> = Vec::new();

        let entries =
            std::fs::read_dir(&self.dir).map_err(|e| XmlGuardianError::io(self.dir.clone(), e))?;
        for entry in entries {
            let entry = entry.map_err(|e| XmlGuardianError::io(self.dir.clone(), e))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(rest) = name.strip_prefix(&prefix) else {
                continue;
            };
            let Some(sequence) = rest.strip_suffix(".json") else {
                continue;
            };
            if let Ok(sequence) = sequence.parse::<u64>() {
                found.push((sequence, entry.path()));
            }
        }

        found.sort_by_key(|(sequence, _)| *sequence);
        Ok(found.into_iter().map(|(_, path)| path).collect())
    }

    /// Path of the highest-sequence checkpoint for `for_file`, if any.
    pub fn latest(&self, for_file: &Path) -> Result<Option<PathBuf>> {
        Ok(self.list_for(for_file)?.pop())
    }

    /// Remove all checkpoints for `for_file`, returning how many were
    /// deleted.
    pub fn delete_for(&self, for_file: &Path) -> Result<usize> {
        let mut deleted = 0;
        for path in self.list_for(for_file)? {
            if std::fs::remove_file(&path).is_ok() {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    /// Read checkpoint metadata without verifying integrity. Intended for
    /// listings; never use the result to resume.
    pub fn peek(&self, path: &Path) -> Result<CheckpointSummary> {
        let payload =
            std::fs::read_to_string(path).map_err(|e| XmlGuardianError::io(path, e))?;
        let checkpoint: ValidationCheckpoint = serde_json::from_str(&payload).map_err(|e| {
            XmlGuardianError::checkpoint(
                format!("peeking {}", path.display()),
                CheckpointErrorKind::Unparsable(e.to_string()),
            )
        })?;
        Ok(CheckpointSummary {
            file_path: checkpoint.file_path,
            byte_offset: checkpoint.byte_offset,
            elements_validated: checkpoint.elements_validated,
            bytes_processed: checkpoint.bytes_processed,
            errors_count: checkpoint.errors_count,
            warnings_count: checkpoint.warnings_count,
            sequence_number: checkpoint.sequence_number,
            timestamp: checkpoint.timestamp,
        })
    }

    fn enforce_retention(&self, for_file: &Path) -> Result<()> {
        if self.max_checkpoints == 0 {
            return Ok(());
        }
        let checkpoints = self.list_for(for_file)?;
        if checkpoints.len() <= self.max_checkpoints {
            return Ok(());
        }
        let excess = checkpoints.len() - self.max_checkpoints;
        for path in &checkpoints[..excess] {
            if let Err(e) = std::fs::remove_file(path) {
                warn!(path = %path.display(), error = %e, "failed to delete old checkpoint");
            }
        }
        Ok(())
    }
}

/// Metadata of a checkpoint record, as returned by [`CheckpointManager::peek`].
#[derive(Debug, Clone, Serialize)]
pub struct CheckpointSummary {
    pub file_path: String,
    pub byte_offset: u64,
    pub elements_validated: u64,
    pub bytes_processed: u64,
    pub errors_count: u64,
    pub warnings_count: u64,
    pub sequence_number: u64,
    pub timestamp: DateTime<Utc>,
}

/// Periodic checkpoint hook handed to the validator.
///
/// Tracks the byte interval and the per-file sequence counter; sequence
/// numbers are strictly increasing per file, continuing after a resume.
#[derive(Debug)]
pub struct CheckpointWriter<'a> {
    manager: &'a CheckpointManager,
    for_file: PathBuf,
    interval_bytes: u64,
    next_sequence: u64,
    last_checkpoint_bytes: u64,
    written: u64,
}

impl<'a> CheckpointWriter<'a> {
    #[must_use]
    pub fn new(manager: &'a CheckpointManager, for_file: impl Into<PathBuf>, interval_bytes: u64) -> Self {
        Self {
            manager,
            for_file: for_file.into(),
            interval_bytes,
            next_sequence: 0,
            last_checkpoint_bytes: 0,
            written: 0,
        }
    }

    /// Continue sequence numbering and interval tracking after a resume.
    #[must_use]
    pub fn resuming_after(mut self, checkpoint: &ValidationCheckpoint) -> Self {
        self.next_sequence = checkpoint.sequence_number + 1;
        self.last_checkpoint_bytes = checkpoint.bytes_processed;
        self
    }

    /// Number of checkpoints written through this writer.
    #[must_use]
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Whether the configured byte interval has elapsed. Cheap; callers use
    /// this to avoid taking a state snapshot when nothing is due.
    #[must_use]
    pub fn due(&self, bytes_processed: u64) -> bool {
        self.interval_bytes > 0
            && bytes_processed.saturating_sub(self.last_checkpoint_bytes) >= self.interval_bytes
    }

    /// Snapshot the state if the configured byte interval has elapsed.
    ///
    /// Write failures on the checkpoint store do not abort validation of
    /// the input file; they are logged and the interval resets so the next
    /// interval retries.
    pub fn maybe_save(
        &mut self,
        state: &ParserState,
        errors_count: u64,
        warnings_count: u64,
        elements_validated: u64,
    ) {
        if self.interval_bytes == 0 {
            return;
        }
        if state.bytes_processed.saturating_sub(self.last_checkpoint_bytes) < self.interval_bytes {
            return;
        }

        let mut checkpoint = ValidationCheckpoint::from_state(
            &self.for_file,
            state,
            errors_count,
            warnings_count,
            elements_validated,
            self.next_sequence,
        );
        match self.manager.save(&mut checkpoint, &self.for_file) {
            Ok(_) => {
                self.next_sequence += 1;
                self.written += 1;
            }
            Err(e) => {
                warn!(file = %self.for_file.display(), error = %e, "checkpoint write failed");
            }
        }
        self.last_checkpoint_bytes = state.bytes_processed;
    }
}

/// Derive a deterministic, path-safe checkpoint stem from a file name.
fn sanitize_file_name(path: &Path) -> String {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unnamed");
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_state() -> ParserState {
        let mut state = ParserState::new();
        state.byte_offset = 52_428_800;
        state.bytes_processed = 52_428_800;
        state.line = 12_001;
        state.column = 7;
        state.element_stack = vec!["root".into(), "record".into()];
        state
            .namespace_bindings
            .insert(String::new(), "urn:records".into());
        state.elements_seen = 150_000;
        state.depth = 2;
        state
    }

    fn sample_checkpoint() -> ValidationCheckpoint {
        ValidationCheckpoint::from_state(Path::new("/data/big.xml"), &sample_state(), 2, 5, 150_000, 3)
    }

    #[test]
    fn test_integrity_hash_round_trip() {
        let mut checkpoint = sample_checkpoint();
        checkpoint.integrity_hash = Some(checkpoint.compute_integrity_hash().unwrap());
        assert!(checkpoint.verify_integrity().unwrap());
    }

    #[test]
    fn test_hash_ignores_stored_hash_field() {
        let mut checkpoint = sample_checkpoint();
        let before = checkpoint.compute_integrity_hash().unwrap();
        checkpoint.integrity_hash = Some("0".repeat(64));
        assert_eq!(checkpoint.compute_integrity_hash().unwrap(), before);
    }

    #[test]
    fn test_hash_sensitive_to_every_field() {
        let base = sample_checkpoint();
        let base_hash = base.compute_integrity_hash().unwrap();

        let mut tweaked = base.clone();
        tweaked.byte_offset += 1;
        assert_ne!(tweaked.compute_integrity_hash().unwrap(), base_hash);

        let mut tweaked = base.clone();
        tweaked.element_stack.push("extra".into());
        assert_ne!(tweaked.compute_integrity_hash().unwrap(), base_hash);

        let mut tweaked = base;
        tweaked.sequence_number += 1;
        assert_ne!(tweaked.compute_integrity_hash().unwrap(), base_hash);
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path(), 10).unwrap();
        let mut checkpoint = sample_checkpoint();

        let path = manager.save(&mut checkpoint, Path::new("/data/big.xml")).unwrap();
        let loaded = manager.load(&path).unwrap();
        assert_eq!(loaded, checkpoint);
        assert!(loaded.verify_integrity().unwrap());
    }

    #[test]
    fn test_tampered_record_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path(), 10).unwrap();
        let mut checkpoint = sample_checkpoint();
        let path = manager.save(&mut checkpoint, Path::new("/data/big.xml")).unwrap();

        let tampered = std::fs::read_to_string(&path)
            .unwrap()
            .replace("52428800", "52428801");
        std::fs::write(&path, tampered).unwrap();

        let err = manager.load(&path).unwrap_err();
        assert!(matches!(
            err,
            XmlGuardianError::Checkpoint {
                source: CheckpointErrorKind::Corrupt { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_unparsable_record_is_distinct_from_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path(), 10).unwrap();
        let path = dir.path().join("big_xml_checkpoint_0.json");
        std::fs::write(&path, "not json at all").unwrap();

        let err = manager.load(&path).unwrap_err();
        assert!(matches!(
            err,
            XmlGuardianError::Checkpoint {
                source: CheckpointErrorKind::Unparsable(_),
                ..
            }
        ));
    }

    #[test]
    fn test_list_and_latest_order_by_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path(), 0).unwrap();
        let file = Path::new("/data/big.xml");

        for sequence in [2u64, 0, 11, 1] {
            let mut checkpoint = sample_checkpoint();
            checkpoint.sequence_number = sequence;
            manager.save(&mut checkpoint, file).unwrap();
        }

        let listed = manager.list_for(file).unwrap();
        assert_eq!(listed.len(), 4);
        let latest = manager.latest(file).unwrap().unwrap();
        assert!(latest.to_string_lossy().contains("_checkpoint_11.json"));
        // Lexicographic ordering would put 11 before 2; sequence ordering
        // must not.
        assert_eq!(listed.last().unwrap(), &latest);
    }

    #[test]
    fn test_retention_deletes_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path(), 3).unwrap();
        let file = Path::new("/data/big.xml");

        for sequence in 0..5u64 {
            let mut checkpoint = sample_checkpoint();
            checkpoint.sequence_number = sequence;
            manager.save(&mut checkpoint, file).unwrap();
        }

        let listed = manager.list_for(file).unwrap();
        assert_eq!(listed.len(), 3);
        assert!(listed[0].to_string_lossy().contains("_checkpoint_2.json"));
    }

    #[test]
    fn test_delete_for_removes_all() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path(), 0).unwrap();
        let file = Path::new("/data/big.xml");
        for sequence in 0..3u64 {
            let mut checkpoint = sample_checkpoint();
            checkpoint.sequence_number = sequence;
            manager.save(&mut checkpoint, file).unwrap();
        }
        assert_eq!(manager.delete_for(file).unwrap(), 3);
        assert!(manager.list_for(file).unwrap().is_empty());
    }

    #[test]
    fn test_writer_respects_interval() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path(), 0).unwrap();
        let mut writer = CheckpointWriter::new(&manager, "/data/big.xml", 1000);

        let mut state = ParserState::new();
        state.bytes_processed = 500;
        writer.maybe_save(&state, 0, 0, 10);
        assert_eq!(writer.written(), 0);

        state.bytes_processed = 1500;
        writer.maybe_save(&state, 0, 0, 20);
        assert_eq!(writer.written(), 1);

        // Interval restarts from the last snapshot.
        state.bytes_processed = 2000;
        writer.maybe_save(&state, 0, 0, 30);
        assert_eq!(writer.written(), 1);

        state.bytes_processed = 2600;
        writer.maybe_save(&state, 0, 0, 40);
        assert_eq!(writer.written(), 2);
    }

    #[test]
    fn test_parser_state_seed() {
        let checkpoint = sample_checkpoint();
        let seed = checkpoint.to_parser_state();
        assert_eq!(seed.byte_offset, checkpoint.byte_offset);
        assert_eq!(seed.element_stack, checkpoint.element_stack);
        assert_eq!(seed.depth, 2);
        assert_eq!(seed.elements_seen, checkpoint.elements_validated);
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name(Path::new("/a/b/data.xml")), "data_xml");
        assert_eq!(sanitize_file_name(Path::new("weird name?.xml")), "weird_name__xml");
    }
}
