//! Explicit namespace binding stack.
//!
//! One frame is pushed per start element (possibly empty) and popped at the
//! matching end element, so bindings are keyed to element depth. The
//! flattened currently-effective map is what checkpoints persist.

use std::collections::BTreeMap;

/// Reserved prefix bound by the XML specification itself.
const XML_PREFIX: &str = "xml";
const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Stack of `(prefix, URI)` binding frames. The default namespace uses the
/// empty prefix.
#[derive(Debug, Clone, Default)]
pub struct NamespaceStack {
    frames: Vec<Vec<(String, String)>>,
}

impl NamespaceStack {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the stack from a flattened binding map (checkpoint resume).
    /// The seeded bindings form a base frame below all document frames.
    #[must_use]
    pub fn from_flattened(bindings: &BTreeMap<String, String>) -> Self {
        let base: Vec<(String, String)> = bindings
            .iter()
            .map(|(prefix, uri)| (prefix.clone(), uri.clone()))
            .collect();
        Self { frames: vec![base] }
    }

    /// Push the declarations of one start element.
    pub fn push_frame(&mut self, declarations: Vec<(String, String)>) {
        self.frames.push(declarations);
    }

    /// Pop the innermost frame. A pop on an empty stack is ignored: it can
    /// only happen on input with unmatched end tags, which the validator
    /// reports through its own rules.
    pub fn pop_frame(&mut self) {
        self.frames.pop();
    }

    /// Resolve a prefix against the innermost binding.
    #[must_use]
    pub fn resolve(&self, prefix: &str) -> Option<&str> {
        if prefix == XML_PREFIX {
            return Some(XML_NAMESPACE);
        }
        for frame in self.frames.iter().rev() {
            for (bound, uri) in frame.iter().rev() {
                if bound == prefix {
                    // An empty URI un-declares the binding.
                    return if uri.is_empty() { None } else { Some(uri) };
                }
            }
        }
        None
    }

    /// Flatten the currently-effective bindings into a map.
    #[must_use]
    pub fn flatten(&self) -> BTreeMap<String, String> {
        let mut bindings = BTreeMap::new();
        for frame in &self.frames {
            for (prefix, uri) in frame {
                if uri.is_empty() {
                    bindings.remove(prefix);
                } else {
                    bindings.insert(prefix.clone(), uri.clone());
                }
            }
        }
        bindings
    }
}

/// Split a qualified name into `(prefix, local_name)`.
#[must_use]
pub fn split_qname(qualified: &str) -> (Option<&str>, &str) {
    match qualified.split_once(':') {
        Some((prefix, local)) if !prefix.is_empty() && !local.is_empty() => (Some(prefix), local),
        _ => (None, qualified),
    }
}
