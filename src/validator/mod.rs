//! Incremental validator state machine.
//!
//! Consumes parser events one at a time, maintains its own element stack
//! and rule state, and emits [`ValidationError`] findings with exact
//! positions. Structural violations (mismatched tags, unexpected or missing
//! closes, excess depth) are fatal to the current file after being
//! recorded; rule findings (identifier observations, phase ordering,
//! timestamp monotonicity, name hygiene) never stop the stream.
//!
//! The validator is per-file: each run produces one [`FileFragment`] that
//! the orchestrator folds into the run result. Identifier and reference
//! observations are collected on the fragment and replayed into the
//! cross-file index in file order.

mod phases;

pub use phases::{PhaseTracker, PHASE_ORDER};

use crate::checkpoint::{CheckpointWriter, ValidationCheckpoint};
use crate::config::ValidatorConfig;
use crate::model::{
    rules, FileFragment, IdObservation, ParserEvent, ParserState, Position, RefObservation,
    ValidationError,
};
use crate::parser::{split_qname, EventStream, FatalErrorKind, FatalParseError, ParserOptions};
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Attribute names treated as identifier declarations and references.
const ID_ATTRIBUTE: &str = "id";
const REFERENCE_ATTRIBUTES: [&str; 2] = ["ref", "idref"];

/// Cooperative cancellation signal checked between events.
///
/// On cancel the current file's partial result is discarded and no
/// checkpoint is written for the cancelling interval.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<AtomicBool>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.load(Ordering::Relaxed)
    }
}

/// Anything that can feed events to the validator: the live streaming
/// parser, or a replay over buffered events for tree-mode validation.
pub trait EventSource {
    fn next_event(&mut self) -> Option<Result<ParserEvent, FatalParseError>>;

    /// Cheap running byte count, used to decide when a checkpoint is due.
    fn bytes_processed(&self) -> u64;

    /// Deep state snapshot for checkpointing.
    fn state_snapshot(&self) -> ParserState;
}

impl<R: Read> EventSource for EventStream<R> {
    fn next_event(&mut self) -> Option<Result<ParserEvent, FatalParseError>> {
        self.next()
    }

    fn bytes_processed(&self) -> u64 {
        self.position().byte_offset
    }

    fn state_snapshot(&self) -> ParserState {
        self.state_after_last_event()
    }
}

/// Replay of buffered events, used by tree-mode validation and tests.
///
/// Maintains just enough state for snapshots; checkpointing is not used on
/// replays.
pub struct ReplaySource {
    events: std::vec::IntoIter<Result<ParserEvent, FatalParseError>>,
    state: ParserState,
}

impl ReplaySource {
    #[must_use]
    pub fn new(events: Vec<Result<ParserEvent, FatalParseError>>) -> Self {
        Self {
            events: events.into_iter(),
            state: ParserState::new(),
        }
    }

    #[must_use]
    pub fn from_events(events: Vec<ParserEvent>) -> Self {
        Self::new(events.into_iter().map(Ok).collect())
    }

    fn track(&mut self, event: &ParserEvent) {
        if let Some(position) = event.position() {
            self.state.byte_offset = position.byte_offset;
            self.state.line = position.line;
            self.state.column = position.column;
            self.state.bytes_processed = position.byte_offset;
        }
        match event {
            ParserEvent::StartElement { qualified_name, .. } => {
                self.state.element_stack.push(qualified_name.clone());
                self.state.elements_seen += 1;
            }
            ParserEvent::EndElement { qualified_name, .. } => {
                if self.state.element_stack.last() == Some(qualified_name) {
                    self.state.element_stack.pop();
                }
            }
            _ => {}
        }
        self.state.depth = self.state.element_stack.len();
    }
}

impl EventSource for ReplaySource {
    fn next_event(&mut self) -> Option<Result<ParserEvent, FatalParseError>> {
        let item = self.events.next()?;
        if let Ok(event) = &item {
            self.track(event);
        }
        Some(item)
    }

    fn bytes_processed(&self) -> u64 {
        self.state.bytes_processed
    }

    fn state_snapshot(&self) -> ParserState {
        self.state.clone()
    }
}

/// Optional side channels for a validation pass.
#[derive(Default)]
pub struct ValidatorHooks<'a> {
    /// Periodic checkpointing of validator state
    pub checkpoints: Option<CheckpointWriter<'a>>,
    /// Cooperative cancellation, checked between events
    pub cancel: Option<&'a CancelToken>,
}

impl ValidatorHooks<'_> {
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }
}

/// Per-file streaming validator.
#[derive(Debug, Clone)]
pub struct StreamingValidator {
    config: ValidatorConfig,
}

struct Cursor {
    fragment: FileFragment,
    stack: Vec<String>,
    last_position: Position,
    phases: PhaseTracker,
    /// The document's root element has been closed; any further element
    /// would be a second root
    root_closed: bool,
    /// Error/warning totals carried over from a resumed checkpoint
    prior_errors: u64,
    prior_warnings: u64,
}

enum Flow {
    Continue,
    /// Recorded a fatal violation; stop consuming events
    Fatal,
}

impl StreamingValidator {
    #[must_use]
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    fn parser_options(&self) -> ParserOptions {
        ParserOptions {
            namespace_aware: self.config.namespace_aware,
            ..ParserOptions::default()
        }
    }

    /// Validate a file in streaming mode.
    #[must_use]
    pub fn validate_file(&self, path: &Path) -> FileFragment {
        self.validate_file_with(path, ValidatorHooks::none())
    }

    /// Validate a file in streaming mode with checkpoint/cancel hooks.
    #[must_use]
    pub fn validate_file_with(&self, path: &Path, hooks: ValidatorHooks<'_>) -> FileFragment {
        let label = path.display().to_string();
        match EventStream::from_path_with(path, self.parser_options()) {
            Ok(mut stream) => {
                let mut fragment = self.validate_source(&label, &mut stream, hooks, None);
                fragment.used_streaming = true;
                fragment
            }
            Err(err) => io_failure_fragment(&label, err.to_string()),
        }
    }

    /// Resume validation of a file from an intact checkpoint.
    ///
    /// The reader seeks to the checkpointed offset; the element stack,
    /// namespace bindings and counters are trusted from the record. Events
    /// earlier than the offset are not re-emitted.
    #[must_use]
    pub fn resume_file(
        &self,
        path: &Path,
        checkpoint: &ValidationCheckpoint,
        hooks: ValidatorHooks<'_>,
    ) -> FileFragment {
        let label = path.display().to_string();
        debug!(
            file = %label,
            byte_offset = checkpoint.byte_offset,
            sequence = checkpoint.sequence_number,
            "resuming from checkpoint"
        );
        let seed = checkpoint.to_parser_state();
        match EventStream::from_path_resumed(path, &seed, self.parser_options()) {
            Ok(mut stream) => {
                let mut fragment =
                    self.validate_source(&label, &mut stream, hooks, Some(checkpoint));
                fragment.used_streaming = true;
                fragment
            }
            Err(err) => io_failure_fragment(&label, err.to_string()),
        }
    }

    /// Drive the state machine over an event source. This is the core used
    /// by both streaming and tree-mode validation.
    #[must_use]
    pub fn validate_source<S: EventSource>(
        &self,
        file: &str,
        source: &mut S,
        mut hooks: ValidatorHooks<'_>,
        resumed_from: Option<&ValidationCheckpoint>,
    ) -> FileFragment {
        let mut cursor = Cursor {
            fragment: FileFragment::new(file),
            stack: Vec::new(),
            last_position: Position::start(),
            phases: PhaseTracker::new(),
            root_closed: false,
            prior_errors: 0,
            prior_warnings: 0,
        };
        if let Some(checkpoint) = resumed_from {
            cursor.stack = checkpoint.element_stack.clone();
            cursor.fragment.stats.elements_validated = checkpoint.elements_validated;
            cursor.fragment.stats.max_depth = checkpoint.element_stack.len();
            cursor.prior_errors = checkpoint.errors_count;
            cursor.prior_warnings = checkpoint.warnings_count;
        }

        loop {
            if let Some(cancel) = hooks.cancel {
                if cancel.is_cancelled() {
                    cursor.fragment.cancelled = true;
                    return cursor.fragment;
                }
            }

            match source.next_event() {
                None => break,
                Some(Err(fatal)) => {
                    self.record_fatal_parse(file, &mut cursor, &fatal);
                    break;
                }
                Some(Ok(event)) => {
                    if let Some(position) = event.position() {
                        cursor.last_position = position;
                    }
                    match self.process_event(file, &mut cursor, &event) {
                        Flow::Continue => {}
                        Flow::Fatal => break,
                    }
                    if let Some(writer) = hooks.checkpoints.as_mut() {
                        if writer.due(source.bytes_processed()) {
                            writer.maybe_save(
                                &source.state_snapshot(),
                                cursor.prior_errors + cursor.fragment.errors.len() as u64,
                                cursor.prior_warnings + cursor.fragment.warnings.len() as u64,
                                cursor.fragment.stats.elements_validated,
                            );
                        }
                    }
                }
            }
        }

        cursor.fragment.stats.bytes_processed = source.bytes_processed();
        if let Some(writer) = hooks.checkpoints.as_ref() {
            cursor.fragment.stats.checkpoints_written = writer.written();
        }
        cursor.fragment
    }

    fn process_event(&self, file: &str, cursor: &mut Cursor, event: &ParserEvent) -> Flow {
        match event {
            ParserEvent::StartElement {
                qualified_name,
                local_name,
                attributes,
                position,
                ..
            } => {
                if cursor.stack.is_empty() && cursor.root_closed {
                    cursor.fragment.errors.push(
                        ValidationError::error(
                            file,
                            format!("Multiple root elements: <{qualified_name}>"),
                            rules::XML_SYNTAX,
                        )
                        .at(*position)
                        .in_element(qualified_name.clone()),
                    );
                    return Flow::Fatal;
                }

                let depth = cursor.stack.len() + 1;
                if depth > self.config.max_depth {
                    cursor.fragment.errors.push(
                        ValidationError::error(
                            file,
                            format!("Element nesting too deep: {depth} levels"),
                            rules::STRUCTURE,
                        )
                        .at(*position)
                        .in_element(qualified_name.clone()),
                    );
                    return Flow::Fatal;
                }

                cursor.stack.push(qualified_name.clone());
                cursor.fragment.stats.elements_validated += 1;
                cursor.fragment.stats.max_depth = cursor.fragment.stats.max_depth.max(depth);

                self.check_element_name(file, cursor, qualified_name, local_name, *position);

                if let Some(id) = attributes.get(ID_ATTRIBUTE) {
                    cursor.fragment.observed_ids.push(IdObservation {
                        id: id.clone(),
                        position: *position,
                        element_name: qualified_name.clone(),
                    });
                }
                for kind in REFERENCE_ATTRIBUTES {
                    if let Some(target) = attributes.get(kind) {
                        cursor.fragment.observed_refs.push(RefObservation {
                            target_id: target.clone(),
                            kind: kind.to_string(),
                            position: *position,
                        });
                    }
                }

                cursor.phases.on_start_element(
                    file,
                    &cursor.stack,
                    local_name,
                    attributes,
                    *position,
                    &mut cursor.fragment.errors,
                    &mut cursor.fragment.warnings,
                );
                Flow::Continue
            }

            ParserEvent::EndElement {
                qualified_name,
                position,
                ..
            } => match cursor.stack.last() {
                None => {
                    cursor.fragment.errors.push(
                        ValidationError::error(
                            file,
                            format!("Unexpected closing tag: </{qualified_name}>"),
                            rules::STRUCTURE,
                        )
                        .at(*position)
                        .in_element(qualified_name.clone()),
                    );
                    Flow::Fatal
                }
                Some(expected) if expected != qualified_name => {
                    cursor.fragment.errors.push(
                        ValidationError::error(
                            file,
                            format!(
                                "Mismatched tags: expected </{expected}>, got </{qualified_name}>"
                            ),
                            rules::STRUCTURE,
                        )
                        .at(*position)
                        .in_element(qualified_name.clone()),
                    );
                    Flow::Fatal
                }
                Some(_) => {
                    cursor.stack.pop();
                    if cursor.stack.is_empty() {
                        cursor.root_closed = true;
                    }
                    Flow::Continue
                }
            },

            ParserEvent::Characters { text, position } => {
                if cursor.stack.is_empty() && !text.trim().is_empty() {
                    cursor.fragment.warnings.push(
                        ValidationError::warning(
                            file,
                            "Content found outside of elements",
                            rules::STREAMING,
                        )
                        .at(*position),
                    );
                }
                Flow::Continue
            }

            ParserEvent::EndDocument => {
                if !cursor.stack.is_empty() {
                    let unclosed = cursor.stack.join(", ");
                    cursor.fragment.errors.push(
                        ValidationError::error(
                            file,
                            format!("Unclosed elements at end of document: {unclosed}"),
                            rules::STRUCTURE,
                        )
                        .at(cursor.last_position),
                    );
                }
                Flow::Continue
            }

            ParserEvent::StartDocument
            | ParserEvent::ProcessingInstruction { .. }
            | ParserEvent::Comment { .. } => Flow::Continue,
        }
    }

    /// Element names are expected to stay within a conservative ASCII
    /// vocabulary unless they carry a namespace prefix.
    fn check_element_name(
        &self,
        file: &str,
        cursor: &mut Cursor,
        qualified_name: &str,
        local_name: &str,
        position: Position,
    ) {
        let (prefix, _) = split_qname(qualified_name);
        if prefix.is_some() {
            return;
        }
        let unusual = local_name
            .chars()
            .any(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')));
        if unusual {
            cursor.fragment.warnings.push(
                ValidationError::warning(
                    file,
                    format!("Element name contains unusual characters: {qualified_name}"),
                    rules::STREAMING,
                )
                .at(position)
                .in_element(qualified_name.to_string()),
            );
        }
    }

    fn record_fatal_parse(&self, file: &str, cursor: &mut Cursor, fatal: &FatalParseError) {
        match fatal.kind {
            FatalErrorKind::Syntax => {
                cursor.fragment.errors.push(
                    ValidationError::error(file, fatal.message.clone(), rules::XML_SYNTAX)
                        .at(fatal.position),
                );
            }
            FatalErrorKind::Io => {
                // A read failure yields a single finding and no partial
                // result for the file.
                cursor.fragment.errors.clear();
                cursor.fragment.warnings.clear();
                cursor.fragment.observed_ids.clear();
                cursor.fragment.observed_refs.clear();
                cursor.fragment.errors.push(
                    ValidationError::error(file, fatal.message.clone(), rules::IO)
                        .at(fatal.position),
                );
                cursor.fragment.completed = false;
            }
        }
    }
}

fn io_failure_fragment(file: &str, message: String) -> FileFragment {
    let mut fragment = FileFragment::new(file);
    fragment
        .errors
        .push(ValidationError::error(file, message, rules::IO));
    fragment.completed = false;
    fragment
}
