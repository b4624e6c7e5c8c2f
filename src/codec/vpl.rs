//! Verse-per-line plain text codec
//!
//! ```text
//! # id: KJV
//! # title: King James Version
//! Gen.1.1 In the beginning God created the heaven and the earth.
//! Gen.1.2 And the earth was without form, and void.
//! ```
//!
//! `# key: value` lines carry corpus metadata; other `#` lines are comments.
//! Verse text is everything after the first whitespace following the reference.

use super::framework::{Codec, Emission, ExtractOptions, Extraction};
use super::regenerate;
use crate::books;
use crate::ir::{ContentBlock, Corpus, Document, ModuleKind, SpanKind, RAW_SOURCE_PREFIX};
use crate::loss::{LossClass, LossTracker};
use crate::reference::Ref;
use crate::{Error, Result};
use regex::Regex;
use std::fmt::Write as _;
use std::sync::LazyLock;

pub const FORMAT: &str = "vpl";

/// Header keys understood on extract and written on emit, in output order
const HEADER_KEYS: &[&str] = &["id", "title", "language", "versification", "publisher", "rights", "description"];

static VERSE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[1-4]?[A-Za-z]+\.\d+\.\d+[a-z]?(-\d+)?\s").expect("verse line pattern is valid")
});

static HEADER_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#\s*([A-Za-z_]+)\s*:\s*(.*)$").expect("header line pattern is valid"));

/// Codec for verse-per-line text
#[derive(Debug, Default)]
pub struct VplCodec;

impl VplCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Codec for VplCodec {
    fn format_name(&self) -> &str {
        FORMAT
    }

    fn description(&self) -> &str {
        "Verse-per-line plain text"
    }

    fn file_extensions(&self) -> &[&str] {
        &["vpl"]
    }

    fn sniff(&self, head: &[u8]) -> Option<String> {
        let text = String::from_utf8_lossy(head);
        VERSE_LINE
            .is_match(&text)
            .then(|| "line starting with a Book.Chapter.Verse reference".to_string())
    }

    fn extract(&self, source: &[u8], options: &ExtractOptions) -> Result<Extraction> {
        let text = std::str::from_utf8(source)
            .map_err(|e| Error::parse(FORMAT, format!("input is not UTF-8: {}", e)))?;

        let mut header: Vec<(String, String)> = Vec::new();
        let mut documents: Vec<Document> = Vec::new();
        let mut extra_books = 0;

        for (index, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            if line.starts_with('#') {
                if let Some(caps) = HEADER_LINE.captures(line) {
                    header.push((caps[1].to_ascii_lowercase(), caps[2].trim().to_string()));
                }
                continue;
            }

            let (raw_ref, verse_text) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
            let reference = Ref::parse(raw_ref)
                .map_err(|e| Error::parse(FORMAT, format!("line {}: {}", index + 1, e)))?;
            if reference.verse == 0 {
                return Err(Error::parse(
                    FORMAT,
                    format!("line {}: '{}' does not name a verse", index + 1, raw_ref),
                ));
            }

            let position = match documents.iter().position(|d| d.id == reference.book) {
                Some(position) => position,
                None => {
                    let order = books::order_for_code(&reference.book, &mut extra_books);
                    let document = Document::new(reference.book.clone(), order);
                    documents.push(match books::long_name(&reference.book) {
                        Some(name) => document.with_title(name),
                        None => document,
                    });
                    documents.len() - 1
                }
            };
            let document = &mut documents[position];
            let block = ContentBlock::verse(
                reference.to_canonical_string(),
                document.next_sequence(),
                verse_text,
                reference,
            );
            document.content_blocks.push(block);
        }

        let value = |key: &str| header.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone());
        let id = value("id")
            .filter(|id| !id.is_empty())
            .or_else(|| options.corpus_hint.clone())
            .ok_or_else(|| Error::MissingIdentifier("VPL text has no '# id:' header and no fallback name was given".to_string()))?;

        let mut corpus = Corpus::new(id, FORMAT).with_source_bytes(source);
        if let Some(title) = value("title") {
            corpus = corpus.with_title(title);
        }
        if let Some(language) = value("language") {
            corpus = corpus.with_language(language);
        }
        if let Some(versification) = value("versification") {
            corpus = corpus.with_versification(versification);
        }
        if let Some(publisher) = value("publisher") {
            corpus = corpus.with_publisher(publisher);
        }
        if let Some(rights) = value("rights") {
            corpus = corpus.with_rights(rights);
        }
        if let Some(description) = value("description") {
            corpus = corpus.with_description(description);
        }
        let corpus = corpus.with_documents(documents);

        let mut tracker = LossTracker::new(FORMAT, "ir", LossClass::L1);
        for (key, _) in header.iter().filter(|(k, _)| !HEADER_KEYS.contains(&k.as_str())) {
            tracker.warn(format!("ignored unknown header '{}'", key));
        }
        let (loss_class, report) = tracker.finish();
        Ok(Extraction {
            corpus,
            loss_class,
            report,
        })
    }

    fn emit(&self, corpus: &Corpus) -> Result<Emission> {
        let mut tracker = LossTracker::new("ir", FORMAT, corpus.loss_class.max(LossClass::L1));
        let mut out = String::new();

        let fields = [
            ("id", Some(&corpus.id)),
            ("title", corpus.title.as_ref()),
            ("language", corpus.language.as_ref()),
            ("versification", corpus.versification.as_ref()),
            ("publisher", corpus.publisher.as_ref()),
            ("rights", corpus.rights.as_ref()),
            ("description", corpus.description.as_ref()),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                if value.contains('\n') {
                    tracker.degrade(LossClass::L2, format!("corpus:{} (line break)", key));
                }
                let _ = writeln!(out, "# {}: {}", key, single_line(value));
            }
        }

        if corpus.module_kind != ModuleKind::TextCollection {
            tracker.degrade(LossClass::L2, format!("module_kind:{}", corpus.module_kind));
        }
        if corpus.attributes.keys().any(|k| !k.starts_with(RAW_SOURCE_PREFIX)) {
            tracker.degrade(LossClass::L2, "corpus:attributes");
        }

        let mut extra_books = 0;
        for document in &corpus.documents {
            let expected_order = books::order_for_code(&document.id, &mut extra_books);
            regenerate::track_document(&mut tracker, document, expected_order);
            for (index, block) in document.content_blocks.iter().enumerate() {
                let reference = block.verse_ref().ok_or_else(|| {
                    Error::MissingIdentifier(format!(
                        "block '{}' in '{}' has no verse reference to name its line",
                        block.id, document.id
                    ))
                })?;
                if reference.verse == 0 {
                    return Err(Error::MissingIdentifier(format!(
                        "block '{}' in '{}' is keyed by '{}', which names no verse",
                        block.id, document.id, reference
                    )));
                }
                if reference.book != document.id {
                    tracker.degrade(LossClass::L2, "document:grouping");
                }
                regenerate::track_block(&mut tracker, block, index, reference);
                regenerate::track_verse_spans(&mut tracker, block);
                for span in block.spans().filter(|s| s.kind != SpanKind::Verse) {
                    tracker.degrade(LossClass::L2, format!("span:{}", span.kind));
                }
                if block.text.contains('\n') {
                    tracker.degrade(LossClass::L2, "text:line-breaks");
                }
                let _ = writeln!(out, "{} {}", reference, single_line(&block.text));
            }
        }

        let (loss_class, report) = tracker.finish();
        Ok(Emission {
            bytes: out.into_bytes(),
            format: FORMAT.to_string(),
            loss_class,
            report,
        })
    }
}

fn single_line(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}
