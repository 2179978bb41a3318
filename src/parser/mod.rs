//! Event-driven streaming XML parser with exact position tracking.
//!
//! The parser is a lazy iterator over [`ParserEvent`]s: `StartDocument`
//! first, `EndDocument` last, with element, character, comment and
//! processing-instruction events in between. Tokenization is delegated to
//! `quick-xml` reading through a [`PositionedReader`], so every event
//! carries the byte/line/column of the first byte of its construct.
//!
//! Tag-balance checking is deliberately disabled at this layer
//! (`check_end_names` off, unmatched ends allowed): mismatched tags are a
//! *validation* concern and must reach the validator as events so it can
//! report them under its own rules.
//!
//! Security defaults are non-negotiable: DTDs are never loaded, external
//! entities are never resolved, and entity expansion is limited to the five
//! predefined XML entities plus character references.

mod namespace;

pub use namespace::{split_qname, NamespaceStack};

use crate::error::Result;
use crate::model::{AttributeMap, ParserEvent, ParserState, Position};
use crate::reader::PositionedReader;
use quick_xml::events::{BytesEnd, BytesPI, BytesStart, BytesText, Event};
use quick_xml::Reader as QxReader;
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Classification of a fatal parser failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalErrorKind {
    /// Ill-formed XML; maps to rule `xml-syntax`
    Syntax,
    /// Read failure on the input; maps to rule `io`
    Io,
}

/// A failure that halts event production for the current document.
///
/// No recovery is attempted: after the error is returned the stream yields
/// nothing further.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FatalParseError {
    pub message: String,
    pub position: Position,
    pub kind: FatalErrorKind,
}

impl std::fmt::Display for FatalParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}", self.message, self.position)
    }
}

impl std::error::Error for FatalParseError {}

/// Parser settings.
#[derive(Debug, Clone)]
pub struct ParserOptions {
    /// Resolve namespace prefixes against the binding stack
    pub namespace_aware: bool,
    /// Read buffer capacity in bytes
    pub buffer_capacity: usize,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            namespace_aware: true,
            buffer_capacity: 64 * 1024,
        }
    }
}

/// Lazy, restartable-from-checkpoint sequence of parser events.
///
/// Owns its reader exclusively; [`EventStream::state_after_last_event`]
/// yields a deep snapshot usable by checkpointing.
pub struct EventStream<R: Read> {
    reader: QxReader<PositionedReader<R>>,
    buf: Vec<u8>,
    state: ParserState,
    namespaces: NamespaceStack,
    namespace_aware: bool,
    started: bool,
    finished: bool,
    failed: bool,
    /// End event synthesized for a self-closing element, emitted on the
    /// next pull so both halves carry the same position
    pending_end: Option<PendingEnd>,
}

struct PendingEnd {
    qualified_name: String,
    local_name: String,
    namespace_uri: Option<String>,
    position: Position,
}

impl EventStream<File> {
    /// Open a file and stream events from its first byte.
    pub fn from_path(path: &Path) -> Result<Self> {
        Self::from_path_with(path, ParserOptions::default())
    }

    /// Open a file with explicit parser options.
    pub fn from_path_with(path: &Path, options: ParserOptions) -> Result<Self> {
        let reader = PositionedReader::open(path)?;
        Ok(Self::from_positioned(reader, options))
    }

    /// Reopen a file at a checkpointed offset.
    ///
    /// The seed supplies the element stack, flattened namespace bindings
    /// and counters recorded by the checkpoint; line and column are rebuilt
    /// by rescanning the skipped prefix. Events earlier than the offset are
    /// not re-emitted, so no `StartDocument` is produced.
    pub fn from_path_resumed(path: &Path, seed: &ParserState, options: ParserOptions) -> Result<Self> {
        let reader = PositionedReader::resume(path, seed.byte_offset)?;
        let mut stream = Self::from_positioned(reader, options);
        stream.state.element_stack = seed.element_stack.clone();
        stream.state.elements_seen = seed.elements_seen;
        stream.state.depth = seed.element_stack.len();
        stream.namespaces = NamespaceStack::from_flattened(&seed.namespace_bindings);
        stream.sync_state();
        stream.started = true;
        Ok(stream)
    }
}

impl<R: Read> EventStream<R> {
    /// Stream events from any byte source.
    pub fn from_reader(source: R, options: ParserOptions) -> Self {
        Self::from_positioned(
            PositionedReader::with_capacity(options.buffer_capacity, source),
            options,
        )
    }

    fn from_positioned(positioned: PositionedReader<R>, options: ParserOptions) -> Self {
        let mut reader = QxReader::from_reader(positioned);
        let config = reader.config_mut();
        // Mismatched and stray end tags must surface as events for the
        // validator's structure rules, not die inside the tokenizer.
        config.check_end_names = false;
        config.allow_unmatched_ends = true;

        Self {
            reader,
            buf: Vec::new(),
            state: ParserState::new(),
            namespaces: NamespaceStack::new(),
            namespace_aware: options.namespace_aware,
            started: false,
            finished: false,
            failed: false,
            pending_end: None,
        }
    }

    /// Snapshot of the parser state after the most recently emitted event.
    #[must_use]
    pub fn state_after_last_event(&self) -> ParserState {
        let mut state = self.state.clone();
        state.namespace_bindings = self.namespaces.flatten();
        state
    }

    /// Position of the next unconsumed byte.
    #[must_use]
    pub fn position(&self) -> Position {
        self.reader.get_ref().position()
    }

    fn sync_state(&mut self) {
        let pos = self.reader.get_ref().position();
        self.state.byte_offset = pos.byte_offset;
        self.state.line = pos.line;
        self.state.column = pos.column;
        self.state.bytes_processed = pos.byte_offset;
        self.state.depth = self.state.element_stack.len();
    }

    fn syntax(&self, message: impl Into<String>, position: Position) -> FatalParseError {
        FatalParseError {
            message: message.into(),
            position,
            kind: FatalErrorKind::Syntax,
        }
    }

    fn fatal_from(&self, err: quick_xml::Error, position: Position) -> FatalParseError {
        let kind = match &err {
            quick_xml::Error::Io(_) => FatalErrorKind::Io,
            _ => FatalErrorKind::Syntax,
        };
        FatalParseError {
            message: err.to_string(),
            position,
            kind,
        }
    }

    fn resolve_namespace(
        &self,
        qualified: &str,
        position: Position,
    ) -> std::result::Result<Option<String>, FatalParseError> {
        if !self.namespace_aware {
            return Ok(None);
        }
        let (prefix, _) = split_qname(qualified);
        match prefix {
            Some(p) => match self.namespaces.resolve(p) {
                Some(uri) => Ok(Some(uri.to_string())),
                None => Err(self.syntax(
                    format!("unbound namespace prefix '{p}' in <{qualified}>"),
                    position,
                )),
            },
            None => Ok(self.namespaces.resolve("").map(ToString::to_string)),
        }
    }

    fn handle_start(
        &mut self,
        e: &BytesStart<'_>,
        position: Position,
        is_empty: bool,
    ) -> std::result::Result<ParserEvent, FatalParseError> {
        let decoder = self.reader.decoder();
        let qualified = decoder
            .decode(e.name().as_ref())
            .map_err(|err| self.syntax(format!("encoding error in element name: {err}"), position))?
            .into_owned();

        let mut attributes = AttributeMap::new();
        let mut declarations = Vec::new();
        for attr in e.attributes() {
            let attr = attr.map_err(|err| {
                self.syntax(format!("invalid attribute in <{qualified}>: {err}"), position)
            })?;
            let key = decoder
                .decode(attr.key.as_ref())
                .map_err(|err| {
                    self.syntax(format!("encoding error in attribute name: {err}"), position)
                })?
                .into_owned();
            let value = attr
                .decode_and_unescape_value(decoder)
                .map_err(|err| {
                    self.syntax(
                        format!("invalid value for attribute '{key}' in <{qualified}>: {err}"),
                        position,
                    )
                })?
                .into_owned();

            if key == "xmlns" {
                declarations.push((String::new(), value.clone()));
            } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                declarations.push((prefix.to_string(), value.clone()));
            }
            if attributes.insert(key.clone(), value).is_some() {
                return Err(self.syntax(
                    format!("duplicate attribute '{key}' in <{qualified}>"),
                    position,
                ));
            }
        }

        // Declarations on this element are in scope for the element itself.
        self.namespaces.push_frame(declarations);
        let namespace_uri = self.resolve_namespace(&qualified, position)?;
        let local_name = split_qname(&qualified).1.to_string();

        self.state.element_stack.push(qualified.clone());
        self.state.elements_seen += 1;
        self.sync_state();

        if is_empty {
            self.pending_end = Some(PendingEnd {
                qualified_name: qualified.clone(),
                local_name: local_name.clone(),
                namespace_uri: namespace_uri.clone(),
                position,
            });
        }

        Ok(ParserEvent::StartElement {
            qualified_name: qualified,
            local_name,
            namespace_uri,
            attributes,
            position,
        })
    }

    fn handle_end(
        &mut self,
        e: &BytesEnd<'_>,
        position: Position,
    ) -> std::result::Result<ParserEvent, FatalParseError> {
        let decoder = self.reader.decoder();
        let qualified = decoder
            .decode(e.name().as_ref())
            .map_err(|err| self.syntax(format!("encoding error in element name: {err}"), position))?
            .into_owned();

        // Resolve against the stack that still includes the element's own
        // frame; resolution failures on a stray end tag are not fatal here,
        // the validator reports the mismatch.
        let namespace_uri = self.resolve_namespace(&qualified, position).unwrap_or(None);
        let local_name = split_qname(&qualified).1.to_string();

        self.pop_if_matches(&qualified);
        self.sync_state();

        Ok(ParserEvent::EndElement {
            qualified_name: qualified,
            local_name,
            namespace_uri,
            position,
        })
    }

    fn pop_if_matches(&mut self, qualified: &str) {
        if self.state.element_stack.last().map(String::as_str) == Some(qualified) {
            self.state.element_stack.pop();
            self.namespaces.pop_frame();
        }
    }

    fn emit_pending_end(&mut self, pending: PendingEnd) -> ParserEvent {
        self.pop_if_matches(&pending.qualified_name);
        self.sync_state();
        ParserEvent::EndElement {
            qualified_name: pending.qualified_name,
            local_name: pending.local_name,
            namespace_uri: pending.namespace_uri,
            position: pending.position,
        }
    }

    fn handle_text(
        &mut self,
        e: &BytesText<'_>,
        position: Position,
    ) -> Option<std::result::Result<ParserEvent, FatalParseError>> {
        let decoder = self.reader.decoder();
        let decoded = match decoder.decode(e.as_ref()) {
            Ok(text) => text.into_owned(),
            Err(err) => {
                return Some(Err(
                    self.syntax(format!("encoding error in character data: {err}"), position)
                ))
            }
        };
        let text = match quick_xml::escape::unescape(&decoded) {
            Ok(text) => text.into_owned(),
            Err(err) => {
                return Some(Err(
                    self.syntax(format!("invalid entity reference: {err}"), position)
                ))
            }
        };

        // Whitespace-only character data between top-level constructs is
        // not an event.
        if self.state.element_stack.is_empty() && text.trim().is_empty() {
            self.sync_state();
            return None;
        }
        self.sync_state();
        Some(Ok(ParserEvent::Characters { text, position }))
    }

    fn handle_cdata(
        &mut self,
        raw: &[u8],
        position: Position,
    ) -> std::result::Result<ParserEvent, FatalParseError> {
        let decoder = self.reader.decoder();
        let text = decoder
            .decode(raw)
            .map_err(|err| self.syntax(format!("encoding error in CDATA: {err}"), position))?
            .into_owned();
        self.sync_state();
        Ok(ParserEvent::Characters { text, position })
    }

    fn handle_comment(
        &mut self,
        e: &BytesText<'_>,
        position: Position,
    ) -> std::result::Result<ParserEvent, FatalParseError> {
        let decoder = self.reader.decoder();
        let text = decoder
            .decode(e.as_ref())
            .map_err(|err| self.syntax(format!("encoding error in comment: {err}"), position))?
            .into_owned();
        self.sync_state();
        Ok(ParserEvent::Comment { text, position })
    }

    fn handle_pi(
        &mut self,
        e: &BytesPI<'_>,
        position: Position,
    ) -> std::result::Result<ParserEvent, FatalParseError> {
        let decoder = self.reader.decoder();
        let target = decoder
            .decode(e.target())
            .map_err(|err| self.syntax(format!("encoding error in PI target: {err}"), position))?
            .into_owned();
        let content = decoder
            .decode(e.content())
            .map_err(|err| self.syntax(format!("encoding error in PI content: {err}"), position))?
            .into_owned();
        let data = {
            let trimmed = content.trim_start();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        };
        self.sync_state();
        Ok(ParserEvent::ProcessingInstruction {
            target,
            data,
            position,
        })
    }

    fn handle_general_ref(
        &mut self,
        raw: &[u8],
        position: Position,
    ) -> std::result::Result<ParserEvent, FatalParseError> {
        let decoder = self.reader.decoder();
        let name = decoder
            .decode(raw)
            .map_err(|err| self.syntax(format!("encoding error in entity name: {err}"), position))?
            .into_owned();
        let text = match name.as_str() {
            "amp" => "&".to_string(),
            "lt" => "<".to_string(),
            "gt" => ">".to_string(),
            "apos" => "'".to_string(),
            "quot" => "\"".to_string(),
            other => match resolve_char_reference(other) {
                Some(ch) => ch.to_string(),
                // External and custom entities are never resolved.
                None => {
                    return Err(
                        self.syntax(format!("undefined entity reference '&{other};'"), position)
                    )
                }
            },
        };
        self.sync_state();
        Ok(ParserEvent::Characters { text, position })
    }

    fn advance(&mut self) -> Option<std::result::Result<ParserEvent, FatalParseError>> {
        if self.failed || self.finished {
            return None;
        }
        if !self.started {
            self.started = true;
            return Some(Ok(ParserEvent::StartDocument));
        }
        if let Some(pending) = self.pending_end.take() {
            return Some(Ok(self.emit_pending_end(pending)));
        }

        let mut buf = std::mem::take(&mut self.buf);
        let outcome = loop {
            buf.clear();
            let position = self.reader.get_ref().position();
            match self.reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => break self.handle_start(e, position, false),
                Ok(Event::Empty(ref e)) => break self.handle_start(e, position, true),
                Ok(Event::End(ref e)) => break self.handle_end(e, position),
                Ok(Event::Text(ref e)) => match self.handle_text(e, position) {
                    Some(result) => break result,
                    None => continue,
                },
                Ok(Event::CData(ref e)) => break self.handle_cdata(e.as_ref(), position),
                Ok(Event::Comment(ref e)) => break self.handle_comment(e, position),
                Ok(Event::PI(ref e)) => break self.handle_pi(e, position),
                Ok(Event::GeneralRef(ref e)) => break self.handle_general_ref(e.as_ref(), position),
                // The XML declaration is consumed for its encoding, the
                // DOCTYPE is skipped without loading anything.
                Ok(Event::Decl(_) | Event::DocType(_)) => {
                    self.sync_state();
                    continue;
                }
                Ok(Event::Eof) => {
                    self.finished = true;
                    self.sync_state();
                    break Ok(ParserEvent::EndDocument);
                }
                Err(err) => break Err(self.fatal_from(err, position)),
            }
        };
        self.buf = buf;

        match outcome {
            Ok(event) => Some(Ok(event)),
            Err(fatal) => {
                self.failed = true;
                Some(Err(fatal))
            }
        }
    }
}

impl<R: Read> Iterator for EventStream<R> {
    type Item = std::result::Result<ParserEvent, FatalParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.advance()
    }
}

/// Resolve a character reference body (`#38` or `#x26`) to its character.
fn resolve_char_reference(body: &str) -> Option<char> {
    let digits = body.strip_prefix('#')?;
    let code = if let Some(hex) = digits.strip_prefix('x').or_else(|| digits.strip_prefix('X')) {
        u32::from_str_radix(hex, 16).ok()?
    } else {
        digits.parse::<u32>().ok()?
    };
    char::from_u32(code)
}

/// Count the elements of a document using one streaming pass.
pub fn count_elements(path: &Path) -> std::result::Result<u64, FatalParseError> {
    let mut count = 0;
    for event in open_stream(path)? {
        if event?.is_start() {
            count += 1;
        }
    }
    Ok(count)
}

/// Collect the distinct qualified element names of a document.
pub fn element_names(path: &Path) -> std::result::Result<HashSet<String>, FatalParseError> {
    let mut names = HashSet::new();
    for event in open_stream(path)? {
        if let ParserEvent::StartElement { qualified_name, .. } = event? {
            names.insert(qualified_name);
        }
    }
    Ok(names)
}

fn open_stream(path: &Path) -> std::result::Result<EventStream<File>, FatalParseError> {
    EventStream::from_path(path).map_err(|err| FatalParseError {
        message: err.to_string(),
        position: Position::start(),
        kind: FatalErrorKind::Io,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn events_of(xml: &str) -> Vec<ParserEvent> {
        EventStream::from_reader(Cursor::new(xml.as_bytes().to_vec()), ParserOptions::default())
            .collect::<std::result::Result<Vec<_>, _>>()
            .expect("well-formed input")
    }

    fn stream_of(xml: &str) -> EventStream<Cursor<Vec<u8>>> {
        EventStream::from_reader(Cursor::new(xml.as_bytes().to_vec()), ParserOptions::default())
    }

    #[test]
    fn test_document_brackets() {
        let events = events_of("<r/>");
        assert_eq!(events.first(), Some(&ParserEvent::StartDocument));
        assert_eq!(events.last(), Some(&ParserEvent::EndDocument));
    }

    #[test]
    fn test_start_end_balance() {
        let events = events_of("<r><a><b/></a><a/></r>");
        let starts = events.iter().filter(|e| e.is_start()).count();
        let ends = events.iter().filter(|e| e.is_end()).count();
        assert_eq!(starts, 4);
        assert_eq!(starts, ends);
    }

    #[test]
    fn test_empty_element_shares_position() {
        let events = events_of("<r>\n  <a/>\n</r>");
        let start_pos = events
            .iter()
            .find(|e| e.element_name() == Some("a") && e.is_start())
            .and_then(ParserEvent::position)
            .unwrap();
        let end_pos = events
            .iter()
            .find(|e| e.element_name() == Some("a") && e.is_end())
            .and_then(ParserEvent::position)
            .unwrap();
        assert_eq!(start_pos, end_pos);
        assert_eq!(start_pos.line, 2);
        assert_eq!(start_pos.column, 3);
    }

    #[test]
    fn test_positions_point_at_construct_start() {
        let xml = "<?xml version=\"1.0\"?>\n<root>\n  <child attr=\"v\"/>\n</root>";
        let events = events_of(xml);
        let root = events
            .iter()
            .find(|e| e.element_name() == Some("root") && e.is_start())
            .and_then(ParserEvent::position)
            .unwrap();
        assert_eq!((root.line, root.column), (2, 1));
        let child = events
            .iter()
            .find(|e| e.element_name() == Some("child") && e.is_start())
            .and_then(ParserEvent::position)
            .unwrap();
        assert_eq!((child.line, child.column), (3, 3));
        assert_eq!(child.byte_offset, xml.find("<child").unwrap() as u64);
    }

    #[test]
    fn test_attribute_order_preserved() {
        let events = events_of(r#"<r zeta="1" alpha="2" mid="3"/>"#);
        let attrs = events
            .iter()
            .find_map(|e| match e {
                ParserEvent::StartElement { attributes, .. } => Some(attributes.clone()),
                _ => None,
            })
            .unwrap();
        let keys: Vec<_> = attrs.keys().cloned().collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_duplicate_attribute_is_fatal() {
        let result: std::result::Result<Vec<_>, _> = stream_of(r#"<r a="1" a="2"/>"#).collect();
        let err = result.unwrap_err();
        assert_eq!(err.kind, FatalErrorKind::Syntax);
    }

    #[test]
    fn test_namespace_resolution() {
        let events = events_of(r#"<r xmlns="urn:d" xmlns:p="urn:p"><p:a/><b/></r>"#);
        let ns_of = |name: &str| {
            events.iter().find_map(|e| match e {
                ParserEvent::StartElement {
                    qualified_name,
                    namespace_uri,
                    ..
                } if qualified_name == name => Some(namespace_uri.clone()),
                _ => None,
            })
        };
        assert_eq!(ns_of("r"), Some(Some("urn:d".to_string())));
        assert_eq!(ns_of("p:a"), Some(Some("urn:p".to_string())));
        assert_eq!(ns_of("b"), Some(Some("urn:d".to_string())));
    }

    #[test]
    fn test_unbound_prefix_is_fatal() {
        let result: std::result::Result<Vec<_>, _> = stream_of("<p:r/>").collect();
        assert_eq!(result.unwrap_err().kind, FatalErrorKind::Syntax);
    }

    #[test]
    fn test_local_name_split() {
        let events = events_of(r#"<r xmlns:p="urn:p"><p:item/></r>"#);
        let local = events.iter().find_map(|e| match e {
            ParserEvent::StartElement {
                qualified_name,
                local_name,
                ..
            } if qualified_name == "p:item" => Some(local_name.clone()),
            _ => None,
        });
        assert_eq!(local.as_deref(), Some("item"));
    }

    #[test]
    fn test_predefined_entities_expand() {
        let events = events_of("<r>a &amp; b &lt;ok&gt;</r>");
        let text: String = events
            .iter()
            .filter_map(|e| match e {
                ParserEvent::Characters { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(text, "a & b <ok>");
    }

    #[test]
    fn test_char_references_expand() {
        let events = events_of("<r>&#65;&#x42;</r>");
        let text: String = events
            .iter()
            .filter_map(|e| match e {
                ParserEvent::Characters { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(text, "AB");
    }

    #[test]
    fn test_custom_entity_is_fatal() {
        let result: std::result::Result<Vec<_>, _> = stream_of("<r>&custom;</r>").collect();
        assert_eq!(result.unwrap_err().kind, FatalErrorKind::Syntax);
    }

    #[test]
    fn test_top_level_whitespace_suppressed() {
        let events = events_of("\n\n<r>inner</r>\n\n");
        let texts: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                ParserEvent::Characters { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["inner"]);
    }

    #[test]
    fn test_mismatched_end_still_streams() {
        // Mismatches are the validator's business; the parser reports them
        // as ordinary events.
        let mut stream = stream_of("<r><a></b></r>");
        let mut saw_end_b = false;
        for event in &mut stream {
            if let Ok(ParserEvent::EndElement { qualified_name, .. }) = event {
                if qualified_name == "b" {
                    saw_end_b = true;
                }
            }
        }
        assert!(saw_end_b);
    }

    #[test]
    fn test_comment_and_pi_events() {
        let events = events_of("<r><!-- note --><?target data?></r>");
        assert!(events.iter().any(|e| matches!(
            e,
            ParserEvent::Comment { text, .. } if text.contains("note")
        )));
        assert!(events.iter().any(|e| matches!(
            e,
            ParserEvent::ProcessingInstruction { target, data, .. }
                if target == "target" && data.as_deref() == Some("data")
        )));
    }

    #[test]
    fn test_state_tracks_elements_and_depth() {
        let mut stream = stream_of("<r><a><b/></a></r>");
        let mut max_depth = 0;
        while let Some(event) = stream.next() {
            event.unwrap();
            max_depth = max_depth.max(stream.state_after_last_event().depth);
        }
        let state = stream.state_after_last_event();
        assert_eq!(state.elements_seen, 3);
        assert_eq!(max_depth, 3);
        assert!(state.element_stack.is_empty());
    }

    #[test]
    fn test_state_positions_monotone() {
        let mut stream = stream_of("<r><a>text</a><b/></r>");
        let mut last = 0;
        while let Some(event) = stream.next() {
            event.unwrap();
            let state = stream.state_after_last_event();
            assert!(state.byte_offset >= last);
            assert_eq!(state.bytes_processed, state.byte_offset);
            last = state.byte_offset;
        }
    }

    #[test]
    fn test_cdata_becomes_characters() {
        let events = events_of("<r><![CDATA[a < b & c]]></r>");
        let text: String = events
            .iter()
            .filter_map(|e| match e {
                ParserEvent::Characters { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(text, "a < b & c");
    }

    #[test]
    fn test_count_and_names_helpers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.xml");
        std::fs::write(&path, "<r><a/><a/><b/></r>").unwrap();
        assert_eq!(count_elements(&path).unwrap(), 4);
        let names = element_names(&path).unwrap();
        assert_eq!(names.len(), 3);
        assert!(names.contains("b"));
    }

    #[test]
    fn test_nothing_after_fatal_error() {
        let mut stream = stream_of("<r><a b=</r>");
        let mut saw_error = false;
        while let Some(event) = stream.next() {
            if event.is_err() {
                saw_error = true;
                break;
            }
        }
        assert!(saw_error);
        assert!(stream.next().is_none());
    }
}
