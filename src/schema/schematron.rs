//! Schematron validation over the buffered tree.
//!
//! Supports `pattern`/`rule`/`assert`/`report` with a pragmatic path
//! subset: rule contexts are location paths over element names (`a/b`,
//! `/a/b`, `//a`, `*`), tests are attribute existence and comparison
//! (`@a`, `@a='v'`, `@a!='v'`), child-path existence (`a/b`, `a/@b`,
//! `a/@b='v'`) and `not(...)` around any of those. Within one pattern the
//! first rule whose context matches an element claims it, as in ISO
//! Schematron. Rules carrying `role="warning"` (or `warn`/`info`) produce
//! warnings; everything else is an error. Rule id: `schematron`.

use crate::error::{Result, SchemaErrorKind, XmlGuardianError};
use crate::model::{rules, ValidationError};
use crate::tree::{XmlDocument, XmlElement};

/// A compiled Schematron schema.
#[derive(Debug)]
pub struct SchematronSchema {
    patterns: Vec<Pattern>,
}

#[derive(Debug)]
struct Pattern {
    rules: Vec<Rule>,
}

#[derive(Debug)]
struct Rule {
    context: ContextPath,
    warning: bool,
    asserts: Vec<Assertion>,
    reports: Vec<Assertion>,
}

#[derive(Debug)]
struct Assertion {
    test: TestExpr,
    message: String,
    warning: Option<bool>,
}

/// A location path matched against an element's ancestor chain.
#[derive(Debug)]
struct ContextPath {
    anchored: bool,
    steps: Vec<String>,
}

impl ContextPath {
    fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(invalid_path(raw));
        }
        let (anchored, body) = if let Some(rest) = trimmed.strip_prefix("//") {
            (false, rest)
        } else if let Some(rest) = trimmed.strip_prefix('/') {
            (true, rest)
        } else {
            (false, trimmed)
        };
        let steps: Vec<String> = body.split('/').map(str::trim).map(String::from).collect();
        if steps.iter().any(String::is_empty) {
            return Err(invalid_path(raw));
        }
        Ok(Self { anchored, steps })
    }

    /// `chain` is the element's ancestor chain of local names, root first,
    /// ending with the element itself.
    fn matches(&self, chain: &[&str]) -> bool {
        if self.steps.len() > chain.len() {
            return false;
        }
        if self.anchored && self.steps.len() != chain.len() {
            return false;
        }
        let offset = chain.len() - self.steps.len();
        self.steps
            .iter()
            .zip(&chain[offset..])
            .all(|(step, name)| step == "*" || step == name)
    }
}

/// Test expression subset.
#[derive(Debug)]
enum TestExpr {
    AttrExists(String),
    AttrEquals(String, String),
    /// Child path existence, optionally ending in an attribute test
    PathExists {
        steps: Vec<String>,
        attribute: Option<(String, Option<String>)>,
    },
    Not(Box<TestExpr>),
}

impl TestExpr {
    fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(invalid_path(raw));
        }

        if let Some(inner) = trimmed
            .strip_prefix("not(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            return Ok(Self::Not(Box::new(Self::parse(inner)?)));
        }

        if let Some(attr) = trimmed.strip_prefix('@') {
            return Self::parse_attribute_test(attr, raw);
        }

        // Path, possibly ending in /@attr or /@attr='v'.
        match trimmed.split_once("/@") {
            Some((path, attr)) => {
                let steps = parse_steps(path, raw)?;
                let attribute = match Self::parse_attribute_test(attr, raw)? {
                    Self::AttrExists(name) => (name, None),
                    Self::AttrEquals(name, value) => (name, Some(value)),
                    _ => return Err(invalid_path(raw)),
                };
                Ok(Self::PathExists {
                    steps,
                    attribute: Some(attribute),
                })
            }
            None => Ok(Self::PathExists {
                steps: parse_steps(trimmed, raw)?,
                attribute: None,
            }),
        }
    }

    fn parse_attribute_test(body: &str, raw: &str) -> Result<Self> {
        if let Some((name, value)) = body.split_once("!=") {
            let value = unquote(value).ok_or_else(|| invalid_path(raw))?;
            return Ok(Self::Not(Box::new(Self::AttrEquals(
                name.trim().to_string(),
                value,
            ))));
        }
        if let Some((name, value)) = body.split_once('=') {
            let value = unquote(value).ok_or_else(|| invalid_path(raw))?;
            return Ok(Self::AttrEquals(name.trim().to_string(), value));
        }
        Ok(Self::AttrExists(body.trim().to_string()))
    }

    fn evaluate(&self, element: &XmlElement) -> bool {
        match self {
            Self::AttrExists(name) => element.attributes.contains_key(name),
            Self::AttrEquals(name, value) => {
                element.attributes.get(name).map(String::as_str) == Some(value)
            }
            Self::PathExists { steps, attribute } => {
                select_descendants(element, steps).iter().any(|found| {
                    match attribute {
                        None => true,
                        Some((attr, None)) => found.attributes.contains_key(attr),
                        Some((attr, Some(value))) => {
                            found.attributes.get(attr).map(String::as_str) == Some(value.as_str())
                        }
                    }
                })
            }
            Self::Not(inner) => !inner.evaluate(element),
        }
    }
}

fn parse_steps(path: &str, raw: &str) -> Result<Vec<String>> {
    let steps: Vec<String> = path
        .trim()
        .trim_matches('/')
        .split('/')
        .map(str::trim)
        .map(String::from)
        .collect();
    if steps.iter().any(String::is_empty) {
        return Err(invalid_path(raw));
    }
    Ok(steps)
}

fn unquote(value: &str) -> Option<String> {
    let trimmed = value.trim();
    let inner = trimmed
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
        .or_else(|| {
            trimmed
                .strip_prefix('"')
                .and_then(|rest| rest.strip_suffix('"'))
        })?;
    Some(inner.to_string())
}

/// Elements reached from `element` by walking `steps` along the child axis.
fn select_descendants<'e>(element: &'e XmlElement, steps: &[String]) -> Vec<&'e XmlElement> {
    let mut current: Vec<&XmlElement> = vec![element];
    for step in steps {
        let mut next = Vec::new();
        for node in current {
            for child in node.child_elements() {
                if step == "*" || child.local_name == *step {
                    next.push(child);
                }
            }
        }
        current = next;
        if current.is_empty() {
            break;
        }
    }
    current
}

fn invalid_path(raw: &str) -> XmlGuardianError {
    XmlGuardianError::schema(
        "compiling Schematron",
        SchemaErrorKind::InvalidPath(raw.trim().to_string()),
    )
}

fn is_warning_role(role: Option<&String>) -> Option<bool> {
    role.map(|role| matches!(role.to_lowercase().as_str(), "warning" | "warn" | "info"))
}

impl SchematronSchema {
    /// Compile a schema from its parsed XML document.
    pub fn from_document(doc: &XmlDocument) -> Result<Self> {
        let root = doc.root.as_ref().ok_or_else(|| {
            XmlGuardianError::schema(
                "compiling Schematron",
                SchemaErrorKind::InvalidXml("schema document is empty".into()),
            )
        })?;
        if root.local_name != "schema" {
            return Err(XmlGuardianError::schema(
                "compiling Schematron",
                SchemaErrorKind::UnsupportedSyntax(format!(
                    "expected <schema> root, found <{}>",
                    root.local_name
                )),
            ));
        }

        let mut patterns = Vec::new();
        for pattern_el in root.child_elements() {
            if pattern_el.local_name != "pattern" {
                continue;
            }
            let mut rules = Vec::new();
            for rule_el in pattern_el.child_elements() {
                if rule_el.local_name != "rule" {
                    continue;
                }
                let context_raw = rule_el.attributes.get("context").ok_or_else(|| {
                    XmlGuardianError::schema(
                        "compiling Schematron",
                        SchemaErrorKind::UnsupportedSyntax("<rule> without context".into()),
                    )
                })?;
                let rule_warning =
                    is_warning_role(rule_el.attributes.get("role")).unwrap_or(false);

                let mut asserts = Vec::new();
                let mut reports = Vec::new();
                for check_el in rule_el.child_elements() {
                    let assertion = Assertion {
                        test: TestExpr::parse(check_el.attributes.get("test").ok_or_else(
                            || {
                                XmlGuardianError::schema(
                                    "compiling Schematron",
                                    SchemaErrorKind::UnsupportedSyntax(format!(
                                        "<{}> without test",
                                        check_el.local_name
                                    )),
                                )
                            },
                        )?)?,
                        message: collapse_whitespace(&check_el.text_content()),
                        warning: is_warning_role(check_el.attributes.get("role")),
                    };
                    match check_el.local_name.as_str() {
                        "assert" => asserts.push(assertion),
                        "report" => reports.push(assertion),
                        _ => {}
                    }
                }

                rules.push(Rule {
                    context: ContextPath::parse(context_raw)?,
                    warning: rule_warning,
                    asserts,
                    reports,
                });
            }
            patterns.push(Pattern { rules });
        }

        Ok(Self { patterns })
    }

    /// Validate a document; findings preserve element positions.
    #[must_use]
    pub fn validate(
        &self,
        doc: &XmlDocument,
        file: &str,
    ) -> (Vec<ValidationError>, Vec<ValidationError>) {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        if let Some(root) = &doc.root {
            let mut chain = Vec::new();
            self.visit(root, &mut chain, file, &mut errors, &mut warnings);
        }
        (errors, warnings)
    }

    fn visit<'e>(
        &self,
        element: &'e XmlElement,
        chain: &mut Vec<&'e str>,
        file: &str,
        errors: &mut Vec<ValidationError>,
        warnings: &mut Vec<ValidationError>,
    ) {
        chain.push(&element.local_name);

        for pattern in &self.patterns {
            // First matching rule in a pattern claims the element.
            if let Some(rule) = pattern.rules.iter().find(|r| r.context.matches(chain)) {
                for assertion in &rule.asserts {
                    if !assertion.test.evaluate(element) {
                        push_finding(file, element, rule, assertion, errors, warnings);
                    }
                }
                for assertion in &rule.reports {
                    if assertion.test.evaluate(element) {
                        push_finding(file, element, rule, assertion, errors, warnings);
                    }
                }
            }
        }

        for child in element.child_elements() {
            self.visit(child, chain, file, errors, warnings);
        }
        chain.pop();
    }
}

fn push_finding(
    file: &str,
    element: &XmlElement,
    rule: &Rule,
    assertion: &Assertion,
    errors: &mut Vec<ValidationError>,
    warnings: &mut Vec<ValidationError>,
) {
    let warning = assertion.warning.unwrap_or(rule.warning);
    let message = if assertion.message.is_empty() {
        "schematron assertion failed".to_string()
    } else {
        assertion.message.clone()
    };
    if warning {
        warnings.push(
            ValidationError::warning(file, message, rules::SCHEMATRON)
                .at(element.position)
                .in_element(element.qualified_name.clone()),
        );
    } else {
        errors.push(
            ValidationError::error(file, message, rules::SCHEMATRON)
                .at(element.position)
                .in_element(element.qualified_name.clone()),
        );
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
