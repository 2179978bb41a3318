//! Optional schema validation: Relax NG (XML syntax) and Schematron.
//!
//! Schemas are compiled once per run. Validation happens over the buffered
//! tree after streaming structural validation completes; schema findings
//! and structural findings are reported independently, neither
//! short-circuits the other.

mod relaxng;
mod schematron;

pub use relaxng::RelaxNgSchema;
pub use schematron::SchematronSchema;

use crate::config::SchemaConfig;
use crate::error::{ErrorContext, Result, SchemaErrorKind, XmlGuardianError};
use crate::model::{ParserEvent, Severity, ValidationError};
use crate::parser::{EventStream, ParserOptions};
use crate::tree::XmlDocument;
use std::path::Path;
use tracing::debug;

/// The compiled schemas of one validation run.
#[derive(Debug, Default)]
pub struct SchemaSet {
    pub relaxng: Option<RelaxNgSchema>,
    pub schematron: Option<SchematronSchema>,
}

impl SchemaSet {
    /// Load and compile the schemas named by the configuration.
    ///
    /// Relax NG is accepted in its XML syntax only; the compact syntax is
    /// rejected with a configuration-grade error.
    pub fn load(config: &SchemaConfig) -> Result<Self> {
        let mut set = Self::default();
        if let Some(path) = &config.relaxng {
            if path.extension().is_some_and(|ext| ext == "rnc") {
                return Err(XmlGuardianError::schema(
                    format!("loading {}", path.display()),
                    SchemaErrorKind::UnsupportedSyntax(
                        "compact Relax NG syntax is not supported; use the XML syntax".into(),
                    ),
                ));
            }
            let doc = parse_schema_document(path)
                .with_context(|| format!("loading Relax NG schema {}", path.display()))?;
            set.relaxng = Some(RelaxNgSchema::from_document(&doc)?);
            debug!(path = %path.display(), "Relax NG schema compiled");
        }
        if let Some(path) = &config.schematron {
            let doc = parse_schema_document(path)
                .with_context(|| format!("loading Schematron schema {}", path.display()))?;
            set.schematron = Some(SchematronSchema::from_document(&doc)?);
            debug!(path = %path.display(), "Schematron schema compiled");
        }
        Ok(set)
    }

    /// Whether any schema is loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.relaxng.is_none() && self.schematron.is_none()
    }

    /// Run all loaded schemas over a buffered document. Returns
    /// `(errors, warnings)` with positions preserved.
    #[must_use]
    pub fn validate(
        &self,
        doc: &XmlDocument,
        file: &str,
    ) -> (Vec<ValidationError>, Vec<ValidationError>) {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if let Some(relaxng) = &self.relaxng {
            for finding in relaxng.validate(doc, file) {
                match finding.severity {
                    Severity::Error => errors.push(finding),
                    Severity::Warning => warnings.push(finding),
                }
            }
        }
        if let Some(schematron) = &self.schematron {
            let (mut sch_errors, mut sch_warnings) = schematron.validate(doc, file);
            errors.append(&mut sch_errors);
            warnings.append(&mut sch_warnings);
        }
        (errors, warnings)
    }
}

/// Parse a schema file into a buffered tree using the crate's own parser.
fn parse_schema_document(path: &Path) -> Result<XmlDocument> {
    let stream = EventStream::from_path_with(path, ParserOptions::default())?;
    let events: Vec<ParserEvent> = stream
        .collect::<std::result::Result<_, _>>()
        .map_err(|fatal| {
            XmlGuardianError::schema(
                format!("parsing {}", path.display()),
                SchemaErrorKind::InvalidXml(fatal.to_string()),
            )
        })?;
    XmlDocument::from_events(&events).ok_or_else(|| {
        XmlGuardianError::schema(
            format!("parsing {}", path.display()),
            SchemaErrorKind::InvalidXml("schema document is not well-nested".into()),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_both_schemas() {
        let dir = tempfile::tempdir().unwrap();
        let rng = write(
            dir.path(),
            "lifecycle.rng",
            r#"<element name="document" xmlns="http://relaxng.org/ns/structure/1.0">
                 <element name="phases">
                   <zeroOrMore>
                     <element name="phase">
                       <attribute name="name"/>
                       <optional><attribute name="timestamp"/></optional>
                       <empty/>
                     </element>
                   </zeroOrMore>
                 </element>
               </element>"#,
        );
        let sch = write(
            dir.path(),
            "lifecycle.sch",
            r#"<schema xmlns="http://purl.oclc.org/dsdl/schematron">
                 <pattern>
                   <rule context="phase"><assert test="@name">phase needs a name</assert></rule>
                 </pattern>
               </schema>"#,
        );

        let config = SchemaConfig::default()
            .with_relaxng(rng)
            .with_schematron(sch);
        let set = SchemaSet::load(&config).unwrap();
        assert!(!set.is_empty());
    }

    #[test]
    fn test_compact_syntax_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let rnc = write(dir.path(), "schema.rnc", "element r { empty }");
        let config = SchemaConfig::default().with_relaxng(rnc);
        let err = SchemaSet::load(&config).unwrap_err();
        assert!(err.to_string().contains("Schema"));
    }

    #[test]
    fn test_malformed_schema_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let bad = write(dir.path(), "broken.rng", "<element name=\"r\"");
        let config = SchemaConfig::default().with_relaxng(bad);
        assert!(SchemaSet::load(&config).is_err());
    }

    #[test]
    fn test_empty_set_is_empty() {
        let set = SchemaSet::load(&SchemaConfig::default()).unwrap();
        assert!(set.is_empty());
    }
}
