//! In-memory document tree for tree-mode validation and the schema pass.
//!
//! Streaming validation never materializes this tree. It is built only for
//! the in-memory comparison method of the performance harness and for
//! documents below the schema buffer limit, where Relax NG and Schematron
//! need random access to children and attributes.

use crate::model::{AttributeMap, ParserEvent, Position};
use crate::parser::FatalParseError;

/// An element node with its attributes, position and children.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement {
    pub qualified_name: String,
    pub local_name: String,
    pub namespace_uri: Option<String>,
    pub attributes: AttributeMap,
    pub position: Position,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    /// Child elements, skipping text nodes.
    pub fn child_elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(element) => Some(element),
            XmlNode::Text { .. } => None,
        })
    }

    /// First child element with the given local name.
    #[must_use]
    pub fn find_child(&self, local_name: &str) -> Option<&XmlElement> {
        self.child_elements()
            .find(|child| child.local_name == local_name)
    }

    /// Concatenated direct text content.
    #[must_use]
    pub fn text_content(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                XmlNode::Text { text, .. } => Some(text.as_str()),
                XmlNode::Element(_) => None,
            })
            .collect()
    }

    /// Whether the element has no child elements and no non-whitespace text.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.child_elements().next().is_none() && self.text_content().trim().is_empty()
    }
}

/// A node in the buffered tree.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    Text { text: String, position: Position },
}

/// A fully buffered document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlDocument {
    pub root: Option<XmlElement>,
}

impl XmlDocument {
    /// Build a tree from a buffered event sequence.
    ///
    /// Returns `None` when the events do not form a well-nested document
    /// (mismatched or unclosed tags, multiple roots): the validator has
    /// already reported those, and a schema pass over a broken tree would
    /// only produce noise.
    #[must_use]
    pub fn from_events(events: &[ParserEvent]) -> Option<Self> {
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        for event in events {
            match event {
                ParserEvent::StartElement {
                    qualified_name,
                    local_name,
                    namespace_uri,
                    attributes,
                    position,
                } => {
                    stack.push(XmlElement {
                        qualified_name: qualified_name.clone(),
                        local_name: local_name.clone(),
                        namespace_uri: namespace_uri.clone(),
                        attributes: attributes.clone(),
                        position: *position,
                        children: Vec::new(),
                    });
                }
                ParserEvent::EndElement { qualified_name, .. } => {
                    let element = stack.pop()?;
                    if element.qualified_name != *qualified_name {
                        return None;
                    }
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(XmlNode::Element(element)),
                        None => {
                            if root.is_some() {
                                return None;
                            }
                            root = Some(element);
                        }
                    }
                }
                ParserEvent::Characters { text, position } => {
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(XmlNode::Text {
                            text: text.clone(),
                            position: *position,
                        });
                    }
                }
                ParserEvent::StartDocument
                | ParserEvent::EndDocument
                | ParserEvent::ProcessingInstruction { .. }
                | ParserEvent::Comment { .. } => {}
            }
        }

        if !stack.is_empty() {
            return None;
        }
        Some(Self { root })
    }

    /// Build a tree from collected parser results, using the event prefix
    /// up to the first fatal error.
    #[must_use]
    pub fn from_results(results: &[Result<ParserEvent, FatalParseError>]) -> Option<Self> {
        let events: Vec<ParserEvent> = results
            .iter()
            .map_while(|result| result.as_ref().ok().cloned())
            .collect();
        Self::from_events(&events)
    }

    /// Total number of elements in the tree.
    #[must_use]
    pub fn element_count(&self) -> usize {
        fn count(element: &XmlElement) -> usize {
            1 + element.child_elements().map(count).sum::<usize>()
        }
        self.root.as_ref().map_or(0, count)
    }
}
