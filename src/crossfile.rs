//! Run-wide identifier and reference tracking.
//!
//! One index spans a validation run over many files. The orchestrator
//! replays each file's observations into the index strictly in file
//! iteration order (lexicographic path order), so duplicate attribution is
//! deterministic: the error always lands on the second occurrence.

use crate::model::{rules, IdObservation, RefObservation, ValidationError};
use std::collections::HashMap;

/// A reference waiting for its target id, checked at run end.
#[derive(Debug, Clone)]
struct PendingReference {
    source_file: String,
    observation: RefObservation,
}

/// Identifier and reference index for one validation run.
#[derive(Debug, Default)]
pub struct CrossFileIndex {
    /// id value mapped to the file where it was first seen
    seen_ids: HashMap<String, String>,
    pending_references: Vec<PendingReference>,
}

impl CrossFileIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an id occurrence. Returns a duplicate error attributed to
    /// this (second) occurrence when the id was seen before, in this file
    /// or any earlier one.
    pub fn observe_id(&mut self, file: &str, observation: &IdObservation) -> Option<ValidationError> {
        match self.seen_ids.get(&observation.id) {
            Some(first_file) => Some(
                ValidationError::error(
                    file,
                    format!(
                        "Duplicate ID '{}' already defined in {first_file}",
                        observation.id
                    ),
                    rules::CROSS_FILE_ID,
                )
                .at(observation.position)
                .in_element(observation.element_name.clone()),
            ),
            None => {
                self.seen_ids
                    .insert(observation.id.clone(), file.to_string());
                None
            }
        }
    }

    /// Enqueue an outgoing reference; resolution happens at [`Self::finalize`].
    pub fn observe_reference(&mut self, file: &str, observation: &RefObservation) {
        self.pending_references.push(PendingReference {
            source_file: file.to_string(),
            observation: observation.clone(),
        });
    }

    /// Number of distinct ids observed so far.
    #[must_use]
    pub fn distinct_ids(&self) -> usize {
        self.seen_ids.len()
    }

    /// Resolve all pending references against the id table. Every reference
    /// whose target is absent yields a dangling-reference error attributed
    /// to its source, in observation order.
    #[must_use]
    pub fn finalize(self) -> Vec<ValidationError> {
        let seen_ids = self.seen_ids;
        self.pending_references
            .into_iter()
            .filter(|pending| !seen_ids.contains_key(&pending.observation.target_id))
            .map(|pending| {
                ValidationError::error(
                    pending.source_file,
                    format!(
                        "Dangling {} reference to unknown ID '{}'",
                        pending.observation.kind, pending.observation.target_id
                    ),
                    rules::CROSS_FILE_REFERENCE,
                )
                .at(pending.observation.position)
            })
            .collect()
    }
}
