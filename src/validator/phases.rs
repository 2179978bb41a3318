//! Lifecycle phase rules for `document` roots.
//!
//! Documents whose root element is `document` carry a `phases` child whose
//! `phase` children must appear in the canonical order and whose timestamps
//! must be non-decreasing. Both rules fire per offending element while
//! streaming, without buffering the document.

use crate::model::{rules, AttributeMap, Position, ValidationError};
use chrono::{DateTime, FixedOffset};

/// Canonical lifecycle phase order.
pub const PHASE_ORDER: [&str; 5] = ["begin", "start", "iteration", "end", "continuum"];

const DOCUMENT_ROOT: &str = "document";
const PHASES_ELEMENT: &str = "phases";
const PHASE_ELEMENT: &str = "phase";

/// Streaming tracker for phase ordering and timestamp monotonicity.
#[derive(Debug, Default)]
pub struct PhaseTracker {
    /// Highest canonical index observed so far, with the phase name that
    /// reached it
    furthest: Option<(usize, String)>,
    /// Timestamp of the previous phase element that carried a parseable one
    previous_timestamp: Option<(String, DateTime<FixedOffset>)>,
}

impl PhaseTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect a start element. `stack` is the open-element stack including
    /// the element itself.
    pub fn on_start_element(
        &mut self,
        file: &str,
        stack: &[String],
        local_name: &str,
        attributes: &AttributeMap,
        position: Position,
        errors: &mut Vec<ValidationError>,
        warnings: &mut Vec<ValidationError>,
    ) {
        if !is_phase_element(stack, local_name) {
            return;
        }

        let phase_name = attributes.get("name").map(String::as_str).unwrap_or("");
        self.check_order(file, phase_name, position, errors);
        self.check_timestamp(file, phase_name, attributes, position, errors, warnings);
    }

    fn check_order(
        &mut self,
        file: &str,
        phase_name: &str,
        position: Position,
        errors: &mut Vec<ValidationError>,
    ) {
        // Phases outside the canonical vocabulary do not participate in
        // ordering.
        let Some(index) = PHASE_ORDER.iter().position(|p| *p == phase_name) else {
            return;
        };

        match &self.furthest {
            Some((furthest_index, furthest_name)) if index < *furthest_index => {
                errors.push(
                    ValidationError::error(
                        file,
                        format!(
                            "Phase '{phase_name}' out of order: must not follow \
                             '{furthest_name}' (expected order: {})",
                            PHASE_ORDER.join(", ")
                        ),
                        rules::PHASE_ORDER,
                    )
                    .at(position)
                    .in_element(PHASE_ELEMENT),
                );
            }
            _ => {
                self.furthest = Some((index, phase_name.to_string()));
            }
        }
    }

    fn check_timestamp(
        &mut self,
        file: &str,
        phase_name: &str,
        attributes: &AttributeMap,
        position: Position,
        errors: &mut Vec<ValidationError>,
        warnings: &mut Vec<ValidationError>,
    ) {
        let Some(raw) = attributes.get("timestamp") else {
            return;
        };

        match DateTime::parse_from_rfc3339(raw) {
            Ok(timestamp) => {
                if let Some((previous_name, previous)) = &self.previous_timestamp {
                    if timestamp < *previous {
                        errors.push(
                            ValidationError::error(
                                file,
                                format!(
                                    "Timestamp for phase '{phase_name}' ({}) precedes \
                                     '{previous_name}' ({})",
                                    timestamp.to_rfc3339(),
                                    previous.to_rfc3339()
                                ),
                                rules::TEMPORAL_MONOTONICITY,
                            )
                            .at(position)
                            .in_element(PHASE_ELEMENT),
                        );
                    }
                }
                self.previous_timestamp = Some((phase_name.to_string(), timestamp));
            }
            Err(_) => {
                warnings.push(
                    ValidationError::warning(
                        file,
                        format!("Invalid timestamp format in phase '{phase_name}': {raw}"),
                        rules::TEMPORAL,
                    )
                    .at(position)
                    .in_element(PHASE_ELEMENT),
                );
            }
        }
    }
}

/// Whether the element at the top of `stack` is a `phase` directly inside
/// `document/phases`. Comparison is on local names.
fn is_phase_element(stack: &[String], local_name: &str) -> bool {
    if local_name != PHASE_ELEMENT || stack.len() != 3 {
        return false;
    }
    local_of(&stack[0]) == DOCUMENT_ROOT && local_of(&stack[1]) == PHASES_ELEMENT
}

fn local_of(qualified: &str) -> &str {
    crate::parser::split_qname(qualified).1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> AttributeMap {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn phase_stack() -> Vec<String> {
        vec!["document".into(), "phases".into(), "phase".into()]
    }

    fn run_phases(phases: &[AttributeMap]) -> (Vec<ValidationError>, Vec<ValidationError>) {
        let mut tracker = PhaseTracker::new();
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        for (i, attributes) in phases.iter().enumerate() {
            tracker.on_start_element(
                "doc.xml",
                &phase_stack(),
                "phase",
                attributes,
                Position {
                    byte_offset: i as u64,
                    line: 1,
                    column: 1 + i as u64,
                },
                &mut errors,
                &mut warnings,
            );
        }
        (errors, warnings)
    }

    #[test]
    fn test_canonical_order_is_clean() {
        let phases: Vec<_> = PHASE_ORDER.iter().map(|n| attrs(&[("name", n)])).collect();
        let (errors, warnings) = run_phases(&phases);
        assert!(errors.is_empty());
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_out_of_order_flags_offender() {
        // begin, start, end, iteration: iteration is the offender.
        let phases = vec![
            attrs(&[("name", "begin")]),
            attrs(&[("name", "start")]),
            attrs(&[("name", "end")]),
            attrs(&[("name", "iteration")]),
        ];
        let (errors, _) = run_phases(&phases);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("'iteration'"));
        assert_eq!(errors[0].rule_id.as_deref(), Some("phase-order"));
        assert_eq!(errors[0].column, Some(4));
    }

    #[test]
    fn test_skipping_phases_is_allowed() {
        let phases = vec![attrs(&[("name", "begin")]), attrs(&[("name", "end")])];
        let (errors, _) = run_phases(&phases);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_unknown_phase_names_ignored() {
        let phases = vec![attrs(&[("name", "warmup")]), attrs(&[("name", "begin")])];
        let (errors, _) = run_phases(&phases);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_timestamp_decrease_is_error() {
        let phases = vec![
            attrs(&[("name", "begin"), ("timestamp", "2025-01-01T10:00:00Z")]),
            attrs(&[("name", "start"), ("timestamp", "2025-01-01T09:00:00Z")]),
        ];
        let (errors, warnings) = run_phases(&phases);
        assert!(warnings.is_empty());
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].rule_id.as_deref(),
            Some("temporal-monotonicity")
        );
        assert!(errors[0].message.contains("'start'"));
    }

    #[test]
    fn test_equal_timestamps_are_fine() {
        let phases = vec![
            attrs(&[("name", "begin"), ("timestamp", "2025-01-01T10:00:00Z")]),
            attrs(&[("name", "start"), ("timestamp", "2025-01-01T10:00:00Z")]),
        ];
        let (errors, _) = run_phases(&phases);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_unparsable_timestamp_is_warning() {
        let phases = vec![attrs(&[("name", "begin"), ("timestamp", "not-a-time")])];
        let (errors, warnings) = run_phases(&phases);
        assert!(errors.is_empty());
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].rule_id.as_deref(), Some("temporal"));
    }

    #[test]
    fn test_comparison_is_against_predecessor() {
        // 10:00, 09:00, 09:30: only the 09:00 element decreases.
        let phases = vec![
            attrs(&[("name", "begin"), ("timestamp", "2025-01-01T10:00:00Z")]),
            attrs(&[("name", "start"), ("timestamp", "2025-01-01T09:00:00Z")]),
            attrs(&[("name", "iteration"), ("timestamp", "2025-01-01T09:30:00Z")]),
        ];
        let (errors, _) = run_phases(&phases);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_only_document_phases_participate() {
        let mut tracker = PhaseTracker::new();
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let stack = vec!["other".to_string(), "phases".to_string(), "phase".to_string()];
        tracker.on_start_element(
            "doc.xml",
            &stack,
            "phase",
            &attrs(&[("name", "end")]),
            Position::start(),
            &mut errors,
            &mut warnings,
        );
        tracker.on_start_element(
            "doc.xml",
            &stack,
            "phase",
            &attrs(&[("name", "begin")]),
            Position::start(),
            &mut errors,
            &mut warnings,
        );
        assert!(errors.is_empty());
    }
}
