//! Relax NG validation (XML syntax) via pattern derivatives.
//!
//! The schema document is compiled into a pattern tree; validation walks
//! the buffered document computing derivatives of that pattern, James
//! Clark style. The supported pattern vocabulary is `element`,
//! `attribute`, `group`, `choice`, `interleave`, `oneOrMore`,
//! `zeroOrMore`, `optional`, `mixed`, `text`, `empty`, `notAllowed`,
//! `value`, `ref`/`define`/`start`, with name classes `name`, `anyName`,
//! `nsName` and `choice`. `data` and `list` accept any text: datatype
//! libraries are out of scope. Diagnostics carry the position of the first
//! offending node and rule id `relaxng`.

use crate::error::{Result, SchemaErrorKind, XmlGuardianError};
use crate::model::{rules, ValidationError};
use crate::tree::{XmlDocument, XmlElement, XmlNode};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

const RNG_NS: &str = "http://relaxng.org/ns/structure/1.0";

type Pat = Arc<Pattern>;

#[derive(Debug, PartialEq)]
enum Pattern {
    Empty,
    NotAllowed,
    Text,
    Choice(Pat, Pat),
    Group(Pat, Pat),
    Interleave(Pat, Pat),
    OneOrMore(Pat),
    Element(NameClass, Pat),
    Attribute(NameClass, Pat),
    Value(String),
    After(Pat, Pat),
    Ref(usize),
}

#[derive(Debug, Clone, PartialEq)]
enum NameClass {
    AnyName,
    Name { ns: String, local: String },
    NsName { ns: String },
    Choice(Box<NameClass>, Box<NameClass>),
}

impl NameClass {
    fn contains(&self, ns: &str, local: &str) -> bool {
        match self {
            Self::AnyName => true,
            Self::Name {
                ns: class_ns,
                local: class_local,
            } => class_ns == ns && class_local == local,
            Self::NsName { ns: class_ns } => class_ns == ns,
            Self::Choice(a, b) => a.contains(ns, local) || b.contains(ns, local),
        }
    }
}

// ============================================================================
// Smart constructors with the usual simplifications
// ============================================================================

fn empty() -> Pat {
    Arc::new(Pattern::Empty)
}

fn not_allowed() -> Pat {
    Arc::new(Pattern::NotAllowed)
}

fn text() -> Pat {
    Arc::new(Pattern::Text)
}

fn choice(a: Pat, b: Pat) -> Pat {
    match (&*a, &*b) {
        (Pattern::NotAllowed, _) => b,
        (_, Pattern::NotAllowed) => a,
        _ if a == b => a,
        _ => Arc::new(Pattern::Choice(a, b)),
    }
}

fn group(a: Pat, b: Pat) -> Pat {
    match (&*a, &*b) {
        (Pattern::NotAllowed, _) | (_, Pattern::NotAllowed) => not_allowed(),
        (Pattern::Empty, _) => b,
        (_, Pattern::Empty) => a,
        _ => Arc::new(Pattern::Group(a, b)),
    }
}

fn interleave(a: Pat, b: Pat) -> Pat {
    match (&*a, &*b) {
        (Pattern::NotAllowed, _) | (_, Pattern::NotAllowed) => not_allowed(),
        (Pattern::Empty, _) => b,
        (_, Pattern::Empty) => a,
        _ => Arc::new(Pattern::Interleave(a, b)),
    }
}

fn after(a: Pat, b: Pat) -> Pat {
    match (&*a, &*b) {
        (Pattern::NotAllowed, _) | (_, Pattern::NotAllowed) => not_allowed(),
        _ => Arc::new(Pattern::After(a, b)),
    }
}

fn one_or_more(p: Pat) -> Pat {
    match &*p {
        Pattern::NotAllowed => not_allowed(),
        Pattern::Empty => empty(),
        _ => Arc::new(Pattern::OneOrMore(p)),
    }
}

fn is_not_allowed(p: &Pat) -> bool {
    matches!(&**p, Pattern::NotAllowed)
}

/// Whitespace-collapsed token comparison used for `value` patterns.
fn tokens_equal(a: &str, b: &str) -> bool {
    a.split_whitespace().eq(b.split_whitespace())
}

// ============================================================================
// Compiled schema + derivative evaluation
// ============================================================================

/// A compiled Relax NG schema.
#[derive(Debug)]
pub struct RelaxNgSchema {
    start: Pat,
    env: Vec<Pat>,
}

impl RelaxNgSchema {
    /// Compile a schema from its parsed XML document.
    pub fn from_document(doc: &XmlDocument) -> Result<Self> {
        Compiler::compile(doc)
    }

    fn deref<'a>(&'a self, mut p: &'a Pat) -> &'a Pat {
        // Reference chains are acyclic by the compile-time check.
        while let Pattern::Ref(index) = &**p {
            p = &self.env[*index];
        }
        p
    }

    fn nullable(&self, p: &Pat) -> bool {
        match &**self.deref(p) {
            Pattern::Empty | Pattern::Text => true,
            Pattern::NotAllowed
            | Pattern::Element(..)
            | Pattern::Attribute(..)
            | Pattern::Value(_)
            | Pattern::After(..) => false,
            Pattern::Choice(a, b) => self.nullable(a) || self.nullable(b),
            Pattern::Group(a, b) | Pattern::Interleave(a, b) => {
                self.nullable(a) && self.nullable(b)
            }
            Pattern::OneOrMore(inner) => self.nullable(inner),
            Pattern::Ref(_) => unreachable!("deref resolves references"),
        }
    }

    fn apply_after(&self, f: &dyn Fn(Pat) -> Pat, p: Pat) -> Pat {
        match &*p {
            Pattern::After(a, b) => after(a.clone(), f(b.clone())),
            Pattern::Choice(a, b) => choice(
                self.apply_after(f, a.clone()),
                self.apply_after(f, b.clone()),
            ),
            Pattern::NotAllowed => not_allowed(),
            Pattern::Ref(_) => {
                let resolved = self.deref(&p).clone();
                self.apply_after(f, resolved)
            }
            _ => not_allowed(),
        }
    }

    fn start_tag_open_deriv(&self, p: &Pat, ns: &str, local: &str) -> Pat {
        match &**self.deref(p) {
            Pattern::Choice(a, b) => choice(
                self.start_tag_open_deriv(a, ns, local),
                self.start_tag_open_deriv(b, ns, local),
            ),
            Pattern::Element(nc, content) => {
                if nc.contains(ns, local) {
                    after(content.clone(), empty())
                } else {
                    not_allowed()
                }
            }
            Pattern::Interleave(a, b) => {
                let b2 = b.clone();
                let left = self.apply_after(
                    &move |d| interleave(d, b2.clone()),
                    self.start_tag_open_deriv(a, ns, local),
                );
                let a2 = a.clone();
                let right = self.apply_after(
                    &move |d| interleave(a2.clone(), d),
                    self.start_tag_open_deriv(b, ns, local),
                );
                choice(left, right)
            }
            Pattern::OneOrMore(inner) => {
                let whole = choice(one_or_more(inner.clone()), empty());
                self.apply_after(
                    &move |d| group(d, whole.clone()),
                    self.start_tag_open_deriv(inner, ns, local),
                )
            }
            Pattern::Group(a, b) => {
                let b2 = b.clone();
                let x = self.apply_after(
                    &move |d| group(d, b2.clone()),
                    self.start_tag_open_deriv(a, ns, local),
                );
                if self.nullable(a) {
                    choice(x, self.start_tag_open_deriv(b, ns, local))
                } else {
                    x
                }
            }
            Pattern::After(a, b) => {
                let b2 = b.clone();
                self.apply_after(
                    &move |d| after(d, b2.clone()),
                    self.start_tag_open_deriv(a, ns, local),
                )
            }
            _ => not_allowed(),
        }
    }

    fn text_deriv(&self, p: &Pat, s: &str) -> Pat {
        match &**self.deref(p) {
            Pattern::Choice(a, b) => choice(self.text_deriv(a, s), self.text_deriv(b, s)),
            Pattern::Interleave(a, b) => choice(
                interleave(self.text_deriv(a, s), b.clone()),
                interleave(a.clone(), self.text_deriv(b, s)),
            ),
            Pattern::Group(a, b) => {
                let whole = group(self.text_deriv(a, s), b.clone());
                if self.nullable(a) {
                    choice(whole, self.text_deriv(b, s))
                } else {
                    whole
                }
            }
            Pattern::After(a, b) => after(self.text_deriv(a, s), b.clone()),
            Pattern::OneOrMore(inner) => group(
                self.text_deriv(inner, s),
                choice(one_or_more(inner.clone()), empty()),
            ),
            Pattern::Text => text(),
            Pattern::Value(expected) => {
                if tokens_equal(expected, s) {
                    empty()
                } else {
                    not_allowed()
                }
            }
            _ => not_allowed(),
        }
    }

    fn att_deriv(&self, p: &Pat, ns: &str, local: &str, value: &str) -> Pat {
        match &**self.deref(p) {
            Pattern::After(a, b) => after(self.att_deriv(a, ns, local, value), b.clone()),
            Pattern::Choice(a, b) => choice(
                self.att_deriv(a, ns, local, value),
                self.att_deriv(b, ns, local, value),
            ),
            Pattern::Group(a, b) => choice(
                group(self.att_deriv(a, ns, local, value), b.clone()),
                group(a.clone(), self.att_deriv(b, ns, local, value)),
            ),
            Pattern::Interleave(a, b) => choice(
                interleave(self.att_deriv(a, ns, local, value), b.clone()),
                interleave(a.clone(), self.att_deriv(b, ns, local, value)),
            ),
            Pattern::OneOrMore(inner) => group(
                self.att_deriv(inner, ns, local, value),
                choice(one_or_more(inner.clone()), empty()),
            ),
            Pattern::Attribute(nc, content) => {
                if nc.contains(ns, local) && self.value_match(content, value) {
                    empty()
                } else {
                    not_allowed()
                }
            }
            _ => not_allowed(),
        }
    }

    fn value_match(&self, p: &Pat, value: &str) -> bool {
        (self.nullable(p) && value.trim().is_empty()) || self.nullable(&self.text_deriv(p, value))
    }

    fn start_tag_close_deriv(&self, p: &Pat) -> Pat {
        match &**self.deref(p) {
            Pattern::After(a, b) => after(self.start_tag_close_deriv(a), b.clone()),
            Pattern::Choice(a, b) => {
                choice(self.start_tag_close_deriv(a), self.start_tag_close_deriv(b))
            }
            Pattern::Group(a, b) => {
                group(self.start_tag_close_deriv(a), self.start_tag_close_deriv(b))
            }
            Pattern::Interleave(a, b) => {
                interleave(self.start_tag_close_deriv(a), self.start_tag_close_deriv(b))
            }
            Pattern::OneOrMore(inner) => one_or_more(self.start_tag_close_deriv(inner)),
            Pattern::Attribute(..) => not_allowed(),
            _ => self.deref(p).clone(),
        }
    }

    fn end_tag_deriv(&self, p: &Pat) -> Pat {
        match &**self.deref(p) {
            Pattern::Choice(a, b) => choice(self.end_tag_deriv(a), self.end_tag_deriv(b)),
            Pattern::After(a, b) => {
                if self.nullable(a) {
                    b.clone()
                } else {
                    not_allowed()
                }
            }
            _ => not_allowed(),
        }
    }

    /// Derivative of `p` with respect to a whole element subtree, reporting
    /// the first failure into `diag`.
    fn child_deriv(&self, p: Pat, element: &XmlElement, diag: &mut Diagnostics) -> Pat {
        let ns = element.namespace_uri.as_deref().unwrap_or("");
        let name = &element.qualified_name;

        let mut current = self.start_tag_open_deriv(&p, ns, &element.local_name);
        if is_not_allowed(&current) {
            diag.record(element, format!("element '{name}' not allowed here"));
            return current;
        }

        for (attr_name, attr_value) in &element.attributes {
            if attr_name == "xmlns" || attr_name.starts_with("xmlns:") {
                continue;
            }
            // Attribute names without a prefix are in no namespace.
            let (attr_ns, attr_local) = match attr_name.split_once(':') {
                Some((_, local)) => ("", local),
                None => ("", attr_name.as_str()),
            };
            current = self.att_deriv(&current, attr_ns, attr_local, attr_value);
            if is_not_allowed(&current) {
                diag.record(
                    element,
                    format!("attribute '{attr_name}' not allowed on element '{name}'"),
                );
                return current;
            }
        }

        current = self.start_tag_close_deriv(&current);
        if is_not_allowed(&current) {
            diag.record(
                element,
                format!("element '{name}' is missing required attributes"),
            );
            return current;
        }

        current = self.children_deriv(current, element, diag);
        if is_not_allowed(&current) {
            diag.record(element, format!("invalid content in element '{name}'"));
            return current;
        }

        current = self.end_tag_deriv(&current);
        if is_not_allowed(&current) {
            diag.record(element, format!("element '{name}' has incomplete content"));
        }
        current
    }

    fn children_deriv(&self, p: Pat, element: &XmlElement, diag: &mut Diagnostics) -> Pat {
        // Text-only content participates in value matching; whitespace-only
        // content may also match as if absent.
        let has_child_elements = element.child_elements().next().is_some();
        if !has_child_elements {
            let content = element.text_content();
            let derived = self.text_deriv(&p, &content);
            return if content.trim().is_empty() {
                choice(p, derived)
            } else {
                derived
            };
        }

        let mut current = p;
        for node in &element.children {
            match node {
                XmlNode::Text { text: content, .. } => {
                    if content.trim().is_empty() {
                        continue;
                    }
                    current = self.text_deriv(&current, content);
                    if is_not_allowed(&current) {
                        diag.record(
                            element,
                            format!(
                                "text not allowed in element '{}'",
                                element.qualified_name
                            ),
                        );
                        return current;
                    }
                }
                XmlNode::Element(child) => {
                    current = self.child_deriv(current, child, diag);
                    if is_not_allowed(&current) {
                        return current;
                    }
                }
            }
        }
        current
    }

    /// Validate a document, producing at most one diagnostic: the first
    /// point where the derivative collapsed.
    #[must_use]
    pub fn validate(&self, doc: &XmlDocument, file: &str) -> Vec<ValidationError> {
        let Some(root) = &doc.root else {
            return vec![ValidationError::error(
                file,
                "document has no root element",
                rules::RELAXNG,
            )];
        };

        let mut diag = Diagnostics::default();
        let final_pattern = self.child_deriv(self.start.clone(), root, &mut diag);
        let valid = !is_not_allowed(&final_pattern) && self.nullable(&final_pattern);
        if valid {
            return Vec::new();
        }

        let (message, position) = diag.first.unwrap_or_else(|| {
            (
                "document does not match the Relax NG schema".to_string(),
                root.position,
            )
        });
        vec![ValidationError::error(file, message, rules::RELAXNG).at(position)]
    }
}

#[derive(Default)]
struct Diagnostics {
    first: Option<(String, crate::model::Position)>,
}

impl Diagnostics {
    fn record(&mut self, element: &XmlElement, message: String) {
        if self.first.is_none() {
            self.first = Some((message, element.position));
        }
    }
}

// ============================================================================
// Schema compiler
// ============================================================================

struct Compiler {
    defines: HashMap<String, usize>,
    bodies: Vec<Pat>,
}

impl Compiler {
    fn compile(doc: &XmlDocument) -> Result<RelaxNgSchema> {
        let root = doc.root.as_ref().ok_or_else(|| {
            XmlGuardianError::schema(
                "compiling Relax NG",
                SchemaErrorKind::InvalidXml("schema document is empty".into()),
            )
        })?;
        if let Some(ns) = &root.namespace_uri {
            if ns != RNG_NS {
                return Err(XmlGuardianError::schema(
                    "compiling Relax NG",
                    SchemaErrorKind::UnsupportedSyntax(format!(
                        "unexpected root namespace '{ns}'"
                    )),
                ));
            }
        }

        let mut compiler = Self {
            defines: HashMap::new(),
            bodies: Vec::new(),
        };

        let inherited_ns = root
            .attributes
            .get("ns")
            .cloned()
            .unwrap_or_default();

        let start = if root.local_name == "grammar" {
            // First pass: allocate indices so forward references resolve.
            for child in root.child_elements() {
                if child.local_name == "define" {
                    let name = required_attr(child, "name")?;
                    compiler.defines.insert(name, compiler.bodies.len());
                    compiler.bodies.push(not_allowed());
                }
            }
            for child in root.child_elements() {
                if child.local_name == "define" {
                    let name = required_attr(child, "name")?;
                    let ns = child
                        .attributes
                        .get("ns")
                        .cloned()
                        .unwrap_or_else(|| inherited_ns.clone());
                    let body = compiler.compile_children(child, &ns)?;
                    let index = compiler.defines[&name];
                    compiler.bodies[index] = body;
                }
            }
            let start_element = root.find_child("start").ok_or_else(|| {
                XmlGuardianError::schema(
                    "compiling Relax NG",
                    SchemaErrorKind::UnsupportedSyntax("grammar has no <start>".into()),
                )
            })?;
            compiler.compile_children(start_element, &inherited_ns)?
        } else {
            compiler.compile_pattern(root, &inherited_ns)?
        };

        compiler.check_reference_cycles(&start)?;
        Ok(RelaxNgSchema {
            start,
            env: compiler.bodies,
        })
    }

    /// Compile the pattern children of `parent` into a group.
    fn compile_children(&mut self, parent: &XmlElement, ns: &str) -> Result<Pat> {
        let mut patterns = Vec::new();
        for child in parent.child_elements() {
            patterns.push(self.compile_pattern(child, ns)?);
        }
        Ok(match patterns.len() {
            0 => empty(),
            _ => patterns
                .into_iter()
                .reduce(group)
                .unwrap_or_else(empty),
        })
    }

    fn compile_pattern(&mut self, el: &XmlElement, inherited_ns: &str) -> Result<Pat> {
        let ns_owned;
        let ns = match el.attributes.get("ns") {
            Some(explicit) => {
                ns_owned = explicit.clone();
                ns_owned.as_str()
            }
            None => inherited_ns,
        };

        match el.local_name.as_str() {
            "element" => {
                let (name_class, content_children) = self.name_class_of(el, ns, true)?;
                let content = self.compile_element_content(&content_children, ns)?;
                Ok(Arc::new(Pattern::Element(name_class, content)))
            }
            "attribute" => {
                // Unprefixed attributes are in no namespace unless `ns` is
                // explicit on the attribute pattern itself.
                let attr_ns = el.attributes.get("ns").map(String::as_str).unwrap_or("");
                let (name_class, content_children) = self.name_class_of(el, attr_ns, false)?;
                let content = if content_children.is_empty() {
                    text()
                } else {
                    self.compile_element_content(&content_children, ns)?
                };
                Ok(Arc::new(Pattern::Attribute(name_class, content)))
            }
            "group" => self.compile_children(el, ns),
            "choice" => {
                let mut patterns = Vec::new();
                for child in el.child_elements() {
                    patterns.push(self.compile_pattern(child, ns)?);
                }
                Ok(patterns.into_iter().reduce(choice).unwrap_or_else(empty))
            }
            "interleave" => {
                let mut patterns = Vec::new();
                for child in el.child_elements() {
                    patterns.push(self.compile_pattern(child, ns)?);
                }
                Ok(patterns
                    .into_iter()
                    .reduce(interleave)
                    .unwrap_or_else(empty))
            }
            "oneOrMore" => Ok(one_or_more(self.compile_children(el, ns)?)),
            "zeroOrMore" => Ok(choice(one_or_more(self.compile_children(el, ns)?), empty())),
            "optional" => Ok(choice(self.compile_children(el, ns)?, empty())),
            "mixed" => Ok(interleave(self.compile_children(el, ns)?, text())),
            "text" => Ok(text()),
            "empty" => Ok(empty()),
            "notAllowed" => Ok(not_allowed()),
            "value" => Ok(Arc::new(Pattern::Value(el.text_content()))),
            // Datatype libraries are out of scope; data and list accept any
            // text.
            "data" | "list" => Ok(text()),
            "ref" => {
                let name = required_attr(el, "name")?;
                let index = self.defines.get(&name).copied().ok_or_else(|| {
                    XmlGuardianError::schema(
                        "compiling Relax NG",
                        SchemaErrorKind::UndefinedReference(name.clone()),
                    )
                })?;
                Ok(Arc::new(Pattern::Ref(index)))
            }
            other => Err(XmlGuardianError::schema(
                "compiling Relax NG",
                SchemaErrorKind::UnsupportedPattern(other.to_string()),
            )),
        }
    }

    fn compile_element_content(&mut self, children: &[&XmlElement], ns: &str) -> Result<Pat> {
        let mut patterns = Vec::new();
        for child in children {
            patterns.push(self.compile_pattern(child, ns)?);
        }
        Ok(patterns.into_iter().reduce(group).unwrap_or_else(empty))
    }

    /// Resolve the name class of an element/attribute pattern, returning it
    /// together with the remaining content children.
    fn name_class_of<'e>(
        &mut self,
        el: &'e XmlElement,
        ns: &str,
        _is_element: bool,
    ) -> Result<(NameClass, Vec<&'e XmlElement>)> {
        if let Some(name) = el.attributes.get("name") {
            // A prefixed name in the `name` attribute keeps only its local
            // part; the namespace comes from the `ns` attribute chain.
            let local = name.split(':').next_back().unwrap_or(name).to_string();
            return Ok((
                NameClass::Name {
                    ns: ns.to_string(),
                    local,
                },
                el.child_elements().collect(),
            ));
        }

        let mut children = el.child_elements();
        let first = children.next().ok_or_else(|| {
            XmlGuardianError::schema(
                "compiling Relax NG",
                SchemaErrorKind::UnsupportedSyntax(format!(
                    "<{}> pattern without a name class",
                    el.local_name
                )),
            )
        })?;
        let name_class = self.compile_name_class(first, ns)?;
        Ok((name_class, children.collect()))
    }

    fn compile_name_class(&mut self, el: &XmlElement, ns: &str) -> Result<NameClass> {
        let ns_owned;
        let ns = match el.attributes.get("ns") {
            Some(explicit) => {
                ns_owned = explicit.clone();
                ns_owned.as_str()
            }
            None => ns,
        };
        match el.local_name.as_str() {
            "name" => {
                let value = el.text_content();
                let trimmed = value.trim();
                let local = trimmed.split(':').next_back().unwrap_or(trimmed);
                Ok(NameClass::Name {
                    ns: ns.to_string(),
                    local: local.to_string(),
                })
            }
            "anyName" => Ok(NameClass::AnyName),
            "nsName" => Ok(NameClass::NsName { ns: ns.to_string() }),
            "choice" => {
                let mut classes = Vec::new();
                for child in el.child_elements() {
                    classes.push(self.compile_name_class(child, ns)?);
                }
                classes
                    .into_iter()
                    .reduce(|a, b| NameClass::Choice(Box::new(a), Box::new(b)))
                    .ok_or_else(|| {
                        XmlGuardianError::schema(
                            "compiling Relax NG",
                            SchemaErrorKind::UnsupportedSyntax(
                                "empty name-class choice".into(),
                            ),
                        )
                    })
            }
            other => Err(XmlGuardianError::schema(
                "compiling Relax NG",
                SchemaErrorKind::UnsupportedPattern(other.to_string()),
            )),
        }
    }

    /// Reject reference cycles that do not cross an element boundary; they
    /// would make derivative evaluation diverge.
    fn check_reference_cycles(&self, start: &Pat) -> Result<()> {
        fn direct_refs(p: &Pat, out: &mut Vec<usize>) {
            match &**p {
                Pattern::Ref(index) => out.push(*index),
                Pattern::Choice(a, b)
                | Pattern::Group(a, b)
                | Pattern::Interleave(a, b)
                | Pattern::After(a, b) => {
                    direct_refs(a, out);
                    direct_refs(b, out);
                }
                Pattern::OneOrMore(inner) | Pattern::Attribute(_, inner) => {
                    direct_refs(inner, out);
                }
                // Element content is lazy; cycles through elements are fine.
                Pattern::Element(..) => {}
                _ => {}
            }
        }

        let mut adjacency: Vec<Vec<usize>> = Vec::with_capacity(self.bodies.len());
        for body in &self.bodies {
            let mut refs = Vec::new();
            direct_refs(body, &mut refs);
            adjacency.push(refs);
        }

        let mut entry_refs = Vec::new();
        direct_refs(start, &mut entry_refs);

        // DFS with an explicit in-progress set.
        fn visit(
            node: usize,
            adjacency: &[Vec<usize>],
            visiting: &mut HashSet<usize>,
            done: &mut HashSet<usize>,
        ) -> bool {
            if done.contains(&node) {
                return true;
            }
            if !visiting.insert(node) {
                return false;
            }
            for &next in &adjacency[node] {
                if !visit(next, adjacency, visiting, done) {
                    return false;
                }
            }
            visiting.remove(&node);
            done.insert(node);
            true
        }

        let mut visiting = HashSet::new();
        let mut done = HashSet::new();
        for index in entry_refs
            .into_iter()
            .chain(0..self.bodies.len())
        {
            if !visit(index, &adjacency, &mut visiting, &mut done) {
                return Err(XmlGuardianError::schema(
                    "compiling Relax NG",
                    SchemaErrorKind::UnsupportedSyntax(
                        "reference cycle without an intervening element".into(),
                    ),
                ));
            }
        }
        Ok(())
    }
}

fn required_attr(el: &XmlElement, name: &str) -> Result<String> {
    el.attributes.get(name).cloned().ok_or_else(|| {
        XmlGuardianError::schema(
            "compiling Relax NG",
            SchemaErrorKind::UnsupportedSyntax(format!(
                "<{}> missing required attribute '{name}'",
                el.local_name
            )),
        )
    })
}
