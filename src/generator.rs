//! Synthetic XML generator for tests and benchmarks.
//!
//! Writes well-formed documents of a requested byte size with a chosen
//! shape, streaming straight to disk with constant auxiliary memory. The
//! generator stops as soon as the written byte count first meets the
//! target, after closing all open elements, so output may slightly exceed
//! the target by the closing tags. Output is deterministic for a given
//! seed.

use crate::error::{Result, XmlGuardianError};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Document shape produced by the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentShape {
    /// Flat records, short names, few attributes
    Simple,
    /// Business-ish vocabulary, more attributes, namespaces
    Complex,
    /// Deep nesting
    Nested,
    /// Mixed structure with comments
    Realistic,
}

impl std::str::FromStr for DocumentShape {
    type Err = XmlGuardianError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "simple" => Ok(Self::Simple),
            "complex" => Ok(Self::Complex),
            "nested" => Ok(Self::Nested),
            "realistic" => Ok(Self::Realistic),
            other => Err(XmlGuardianError::Generate(format!(
                "unknown document shape '{other}'"
            ))),
        }
    }
}

/// Record vocabulary for realistic datasets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    User,
    Product,
    Transaction,
    Log,
}

/// Tuning knobs for one generation run.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub shape: DocumentShape,
    pub max_depth: usize,
    /// Attributes drawn per element (bounded by the vocabulary)
    pub attribute_count: usize,
    /// Approximate text length per text node
    pub text_length: usize,
    pub namespace_enabled: bool,
    pub add_comments: bool,
}

impl GeneratorConfig {
    /// Preset configuration for a named shape.
    #[must_use]
    pub fn for_shape(shape: DocumentShape) -> Self {
        match shape {
            DocumentShape::Simple => Self {
                shape,
                max_depth: 5,
                attribute_count: 2,
                text_length: 30,
                namespace_enabled: false,
                add_comments: false,
            },
            DocumentShape::Complex => Self {
                shape,
                max_depth: 10,
                attribute_count: 5,
                text_length: 100,
                namespace_enabled: true,
                add_comments: false,
            },
            DocumentShape::Nested => Self {
                shape,
                max_depth: 20,
                attribute_count: 3,
                text_length: 50,
                namespace_enabled: false,
                add_comments: false,
            },
            DocumentShape::Realistic => Self {
                shape,
                max_depth: 8,
                attribute_count: 4,
                text_length: 80,
                namespace_enabled: true,
                add_comments: true,
            },
        }
    }
}

const ELEMENT_VOCAB_SIMPLE: [&str; 5] = ["item", "data", "value", "entry", "record"];
const ELEMENT_VOCAB_COMPLEX: [&str; 7] = [
    "customer", "order", "product", "invoice", "payment", "address", "details",
];
const ELEMENT_VOCAB_NESTED: [&str; 6] = [
    "section",
    "subsection",
    "paragraph",
    "item",
    "subitem",
    "detail",
];
const ELEMENT_VOCAB_REALISTIC: [&str; 6] = [
    "record",
    "metadata",
    "content",
    "properties",
    "attributes",
    "data",
];

const ATTRIBUTE_VOCAB: [&str; 5] = ["type", "status", "created", "modified", "version"];
const TEXT_WORDS: [&str; 15] = [
    "lorem",
    "ipsum",
    "dolor",
    "sit",
    "amet",
    "consectetur",
    "adipiscing",
    "elit",
    "sed",
    "do",
    "eiusmod",
    "tempor",
    "incididunt",
    "ut",
    "labore",
];

/// Streaming generator of synthetic XML documents.
#[derive(Debug)]
pub struct DocumentGenerator {
    buffer_size: usize,
}

impl Default for DocumentGenerator {
    fn default() -> Self {
        Self {
            buffer_size: 64 * 1024,
        }
    }
}

impl DocumentGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a document of at least `target_bytes` bytes with a preset
    /// shape. Returns the number of bytes written.
    pub fn generate(
        &self,
        output: &Path,
        target_bytes: u64,
        shape: DocumentShape,
        seed: u64,
    ) -> Result<u64> {
        self.generate_with_config(output, target_bytes, &GeneratorConfig::for_shape(shape), seed)
    }

    /// Generate with explicit tuning knobs.
    pub fn generate_with_config(
        &self,
        output: &Path,
        target_bytes: u64,
        config: &GeneratorConfig,
        seed: u64,
    ) -> Result<u64> {
        if config.max_depth == 0 {
            return Err(XmlGuardianError::Generate(
                "max_depth must be at least 1".into(),
            ));
        }
        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| XmlGuardianError::io(parent, e))?;
            }
        }
        let file = File::create(output).map_err(|e| XmlGuardianError::io(output, e))?;
        let mut writer = CountingWriter::new(BufWriter::with_capacity(self.buffer_size, file));
        let mut rng = StdRng::seed_from_u64(seed);
        let mut ids = IdSequence::new(seed);

        writer.write_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n")?;
        let root_attrs = self.render_attributes(config, &mut rng, &mut ids);
        writer.write_str(&format!("<root{root_attrs}>\n"))?;

        let vocabulary = element_vocabulary(config.shape);
        let mut open: Vec<&'static str> = Vec::new();
        let mut element_count: u64 = 0;

        while writer.written() < target_bytes {
            let depth = open.len() + 1;
            let descend = depth < config.max_depth && (depth < 2 || rng.gen_bool(0.6));
            if descend {
                let name = *vocabulary.choose(&mut rng).expect("non-empty vocabulary");
                let attrs = self.render_attributes(config, &mut rng, &mut ids);
                let indent = "  ".repeat(depth);
                writer.write_str(&format!("{indent}<{name}{attrs}>\n"))?;

                if rng.gen_bool(0.7) {
                    let text = self.render_text(config.text_length, &mut rng);
                    writer.write_str(&format!("{indent}  {text}\n"))?;
                }
                open.push(name);
                element_count += 1;
            } else if let Some(name) = open.pop() {
                let indent = "  ".repeat(open.len() + 1);
                writer.write_str(&format!("{indent}</{name}>\n"))?;
            }

            if config.add_comments && rng.gen_bool(0.1) {
                let indent = "  ".repeat(open.len() + 1);
                writer.write_str(&format!("{indent}<!-- marker {element_count} -->\n"))?;
            }
        }

        // Close whatever is still open; the byte target has been met.
        while let Some(name) = open.pop() {
            let indent = "  ".repeat(open.len() + 1);
            writer.write_str(&format!("{indent}</{name}>\n"))?;
        }
        writer.write_str("</root>\n")?;
        writer.finish()?;
        Ok(writer.written())
    }

    /// Generate a dataset of realistic records. Size is controlled by the
    /// record count rather than a byte target.
    pub fn generate_records(
        &self,
        output: &Path,
        record_count: u64,
        kind: RecordKind,
        seed: u64,
    ) -> Result<u64> {
        let file = File::create(output).map_err(|e| XmlGuardianError::io(output, e))?;
        let mut writer = CountingWriter::new(BufWriter::with_capacity(self.buffer_size, file));
        let mut rng = StdRng::seed_from_u64(seed);

        let dataset_type = match kind {
            RecordKind::User => "user",
            RecordKind::Product => "product",
            RecordKind::Transaction => "transaction",
            RecordKind::Log => "log",
        };
        writer.write_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n")?;
        writer.write_str(&format!("<dataset type=\"{dataset_type}\">\n"))?;
        for index in 0..record_count {
            let record = match kind {
                RecordKind::User => render_user_record(index, seed, &mut rng),
                RecordKind::Product => render_product_record(index, seed, &mut rng),
                RecordKind::Transaction => render_transaction_record(index, seed, &mut rng),
                RecordKind::Log => render_log_record(index, &mut rng),
            };
            writer.write_str(&record)?;
        }
        writer.write_str("</dataset>\n")?;
        writer.finish()?;
        Ok(writer.written())
    }

    fn render_attributes(
        &self,
        config: &GeneratorConfig,
        rng: &mut StdRng,
        ids: &mut IdSequence,
    ) -> String {
        let mut attrs: Vec<String> = Vec::new();

        if config.namespace_enabled && rng.gen_bool(0.2) {
            attrs.push("xmlns=\"http://example.com/ns\"".to_string());
        }

        if config.attribute_count > 0 {
            // Ids come from a per-file sequence so generated corpora stay
            // free of accidental duplicate-ID findings.
            attrs.push(format!("id=\"{}\"", ids.next_id()));
            let mut pool = ATTRIBUTE_VOCAB.to_vec();
            pool.shuffle(rng);
            for name in pool
                .into_iter()
                .take(config.attribute_count.saturating_sub(1))
            {
                attrs.push(format!("{name}=\"{}\"", attribute_value(name, rng)));
            }
        }

        if attrs.is_empty() {
            String::new()
        } else {
            format!(" {}", attrs.join(" "))
        }
    }

    fn render_text(&self, length: usize, rng: &mut StdRng) -> String {
        let mut text = String::new();
        while text.len() < length {
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(TEXT_WORDS.choose(rng).expect("non-empty words"));
        }
        text.truncate(length);
        // Never end a text node halfway into nothing meaningful.
        text.trim_end().to_string()
    }
}

fn element_vocabulary(shape: DocumentShape) -> &'static [&'static str] {
    match shape {
        DocumentShape::Simple => &ELEMENT_VOCAB_SIMPLE,
        DocumentShape::Complex => &ELEMENT_VOCAB_COMPLEX,
        DocumentShape::Nested => &ELEMENT_VOCAB_NESTED,
        DocumentShape::Realistic => &ELEMENT_VOCAB_REALISTIC,
    }
}

fn attribute_value(name: &str, rng: &mut StdRng) -> String {
    match name {
        "type" => ["A", "B", "C", "D"]
            .choose(rng)
            .expect("non-empty")
            .to_string(),
        "status" => ["active", "inactive", "pending"]
            .choose(rng)
            .expect("non-empty")
            .to_string(),
        "created" | "modified" => {
            // Deterministic date arithmetic; no wall clock involved.
            let day = rng.gen_range(1..=28);
            let month = rng.gen_range(1..=12);
            format!("2024-{month:02}-{day:02}")
        }
        "version" => format!("{}.{}", rng.gen_range(1..=5), rng.gen_range(0..=9)),
        _ => format!("v{}", rng.gen_range(0..=9999)),
    }
}

/// Per-file id sequence: unique within a file, disjoint across seeds.
struct IdSequence {
    seed: u64,
    next: u64,
}

impl IdSequence {
    fn new(seed: u64) -> Self {
        Self { seed, next: 0 }
    }

    fn next_id(&mut self) -> String {
        let id = format!("id{:x}-{}", self.seed, self.next);
        self.next += 1;
        id
    }
}

fn render_user_record(index: u64, seed: u64, rng: &mut StdRng) -> String {
    let status = if index % 10 == 0 { "inactive" } else { "active" };
    let mut out = String::new();
    let _ = write!(
        out,
        "  <user id=\"u{seed:x}-{index}\">\n    <username>user{index}</username>\n    \
         <email>user{index}@example.com</email>\n    <created>2024-{:02}-{:02}</created>\n    \
         <status>{status}</status>\n  </user>\n",
        rng.gen_range(1..=12),
        rng.gen_range(1..=28),
    );
    out
}

fn render_product_record(index: u64, seed: u64, rng: &mut StdRng) -> String {
    let category = ["Electronics", "Clothing", "Books", "Home"]
        .choose(rng)
        .expect("non-empty");
    let price = rng.gen_range(10_00..=1000_00);
    let mut out = String::new();
    let _ = write!(
        out,
        "  <product id=\"p{seed:x}-{index}\">\n    <name>Product {index}</name>\n    \
         <price>{}.{:02}</price>\n    <category>{category}</category>\n  </product>\n",
        price / 100,
        price % 100,
    );
    out
}

fn render_transaction_record(index: u64, seed: u64, rng: &mut StdRng) -> String {
    let status = if index % 20 == 0 { "pending" } else { "completed" };
    let amount = rng.gen_range(1_00..=10_000_00);
    let second = index % 60;
    let minute = (index / 60) % 60;
    let hour = (index / 3600) % 24;
    let mut out = String::new();
    let _ = write!(
        out,
        "  <transaction id=\"t{seed:x}-{index}\">\n    <amount>{}.{:02}</amount>\n    \
         <timestamp>2024-06-01T{hour:02}:{minute:02}:{second:02}Z</timestamp>\n    \
         <status>{status}</status>\n  </transaction>\n",
        amount / 100,
        amount % 100,
    );
    out
}

fn render_log_record(index: u64, rng: &mut StdRng) -> String {
    let level = ["INFO", "INFO", "INFO", "WARNING", "ERROR"]
        .choose(rng)
        .expect("non-empty");
    let message = [
        "Operation completed successfully",
        "Request processed",
        "Connection established",
        "Data synchronized",
        "Cache updated",
    ]
    .choose(rng)
    .expect("non-empty");
    let second = index % 60;
    let minute = (index / 60) % 60;
    let mut out = String::new();
    let _ = write!(
        out,
        "  <log level=\"{level}\">\n    <timestamp>2024-06-01T00:{minute:02}:{second:02}Z</timestamp>\n    \
         <message>{message}</message>\n  </log>\n",
    );
    out
}

/// Byte-counting wrapper over the output writer.
struct CountingWriter<W: Write> {
    inner: W,
    written: u64,
}

impl<W: Write> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    fn write_str(&mut self, content: &str) -> Result<()> {
        self.inner
            .write_all(content.as_bytes())
            .map_err(XmlGuardianError::from)?;
        self.written += content.len() as u64;
        Ok(())
    }

    fn written(&self) -> u64 {
        self.written
    }

    fn finish(&mut self) -> Result<()> {
        self.inner.flush().map_err(XmlGuardianError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ParserEvent;
    use crate::parser::{count_elements, EventStream};

    fn generate_to_temp(shape: DocumentShape, target: u64, seed: u64) -> (tempfile::TempDir, std::path::PathBuf, u64) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gen.xml");
        let written = DocumentGenerator::new()
            .generate(&path, target, shape, seed)
            .unwrap();
        (dir, path, written)
    }

    #[test]
    fn test_meets_byte_target() {
        let (_dir, path, written) = generate_to_temp(DocumentShape::Simple, 10_000, 1);
        assert!(written >= 10_000);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), written);
    }

    #[test]
    fn test_output_is_well_formed() {
        for shape in [
            DocumentShape::Simple,
            DocumentShape::Complex,
            DocumentShape::Nested,
            DocumentShape::Realistic,
        ] {
            let (_dir, path, _) = generate_to_temp(shape, 20_000, 7);
            let events: Vec<_> = EventStream::from_path(&path)
                .unwrap()
                .collect::<std::result::Result<Vec<_>, _>>()
                .unwrap_or_else(|e| panic!("{shape:?} produced malformed output: {e}"));
            let starts = events.iter().filter(|e| e.is_start()).count();
            let ends = events.iter().filter(|e| e.is_end()).count();
            assert_eq!(starts, ends, "{shape:?} unbalanced");
        }
    }

    #[test]
    fn test_deterministic_for_seed() {
        let (_d1, p1, w1) = generate_to_temp(DocumentShape::Complex, 15_000, 42);
        let (_d2, p2, w2) = generate_to_temp(DocumentShape::Complex, 15_000, 42);
        assert_eq!(w1, w2);
        assert_eq!(
            std::fs::read(&p1).unwrap(),
            std::fs::read(&p2).unwrap()
        );
    }

    #[test]
    fn test_different_seeds_differ() {
        let (_d1, p1, _) = generate_to_temp(DocumentShape::Complex, 15_000, 1);
        let (_d2, p2, _) = generate_to_temp(DocumentShape::Complex, 15_000, 2);
        assert_ne!(std::fs::read(&p1).unwrap(), std::fs::read(&p2).unwrap());
    }

    #[test]
    fn test_respects_max_depth() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested.xml");
        let config = GeneratorConfig {
            max_depth: 4,
            ..GeneratorConfig::for_shape(DocumentShape::Nested)
        };
        DocumentGenerator::new()
            .generate_with_config(&path, 20_000, &config, 3)
            .unwrap();

        let mut stream = EventStream::from_path(&path).unwrap();
        let mut max_depth = 0;
        while let Some(event) = stream.next() {
            event.unwrap();
            max_depth = max_depth.max(stream.state_after_last_event().depth);
        }
        assert!(max_depth <= 4, "depth {max_depth} exceeds limit");
    }

    #[test]
    fn test_ids_unique_within_file() {
        let (_dir, path, _) = generate_to_temp(DocumentShape::Complex, 30_000, 9);
        let mut seen = std::collections::HashSet::new();
        for event in EventStream::from_path(&path).unwrap() {
            if let ParserEvent::StartElement { attributes, .. } = event.unwrap() {
                if let Some(id) = attributes.get("id") {
                    assert!(seen.insert(id.clone()), "duplicate id {id}");
                }
            }
        }
        assert!(!seen.is_empty());
    }

    #[test]
    fn test_record_datasets_parse() {
        let dir = tempfile::tempdir().unwrap();
        for kind in [
            RecordKind::User,
            RecordKind::Product,
            RecordKind::Transaction,
            RecordKind::Log,
        ] {
            let path = dir.path().join(format!("{kind:?}.xml"));
            DocumentGenerator::new()
                .generate_records(&path, 50, kind, 11)
                .unwrap();
            assert!(count_elements(&path).unwrap() > 50);
        }
    }

    #[test]
    fn test_shape_parsing() {
        assert_eq!(
            "realistic".parse::<DocumentShape>().unwrap(),
            DocumentShape::Realistic
        );
        assert!("weird".parse::<DocumentShape>().is_err());
    }
}
