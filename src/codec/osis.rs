//! OSIS XML codec
//!
//! Books are `<div type="book">`; verses come either as containers
//! (`<verse osisID>text</verse>`) or as milestones (`<verse sID/>text<verse eID/>`).
//! Inside a verse, `<note>` becomes a zero-width NOTE span carrying the note
//! text, and `<l>` becomes a POETRY span between two anchors. Any other inline
//! markup is flattened into the text.
//!
//! Extraction always retains the source bytes, so OSIS -> IR -> OSIS replays
//! them at L0.

use super::framework::{Codec, Emission, ExtractOptions, Extraction};
use super::regenerate;
use crate::books;
use crate::ir::{Anchor, ContentBlock, Corpus, Document, ModuleKind, Span, SpanKind, RAW_SOURCE_PREFIX};
use crate::loss::{LossClass, LossReport, LossTracker};
use crate::reference::Ref;
use crate::{Error, Result};
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::{BTreeSet, HashMap};
use std::fmt::Write as _;

pub const FORMAT: &str = "osis";

const OSIS_NAMESPACE: &str = "http://www.bibletechnologies.net/2003/OSIS/namespace";

/// Codec for OSIS XML
#[derive(Debug, Default)]
pub struct OsisCodec;

impl OsisCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Codec for OsisCodec {
    fn format_name(&self) -> &str {
        FORMAT
    }

    fn description(&self) -> &str {
        "OSIS XML (Open Scripture Information Standard)"
    }

    fn file_extensions(&self) -> &[&str] {
        &["osis", "osis.xml"]
    }

    fn sniff(&self, head: &[u8]) -> Option<String> {
        contains(head, b"<osis").then(|| "<osis> root element".to_string())
    }

    fn extract(&self, source: &[u8], options: &ExtractOptions) -> Result<Extraction> {
        let xml = std::str::from_utf8(source)
            .map_err(|e| Error::parse(FORMAT, format!("input is not UTF-8: {}", e)))?;
        let parsed = OsisParser::default().run(xml)?;

        let id = parsed
            .work_id
            .clone()
            .or_else(|| options.corpus_hint.clone())
            .ok_or_else(|| {
                Error::MissingIdentifier("OSIS text has no osisIDWork and no fallback name was given".to_string())
            })?;

        let mut tracker = LossTracker::new(FORMAT, "ir", LossClass::L0);
        if !parsed.flattened.is_empty() {
            let names: Vec<_> = parsed.flattened.iter().map(String::as_str).collect();
            tracker.warn(format!("inline markup flattened into text: {}", names.join(", ")));
        }

        let mut corpus = Corpus::new(id, FORMAT)
            .with_module_kind(ModuleKind::TextCollection)
            .with_source_bytes(source);
        if let Some(language) = parsed.language {
            corpus = corpus.with_language(language);
        }
        if let Some(title) = parsed.header.get("title") {
            corpus = corpus.with_title(title.clone());
        }
        if let Some(publisher) = parsed.header.get("publisher") {
            corpus = corpus.with_publisher(publisher.clone());
        }
        if let Some(rights) = parsed.header.get("rights") {
            corpus = corpus.with_rights(rights.clone());
        }
        if let Some(description) = parsed.header.get("description") {
            corpus = corpus.with_description(description.clone());
        }
        if let Some(system) = parsed.header.get("refSystem") {
            corpus = corpus.with_versification(system.strip_prefix("Bible.").unwrap_or(system));
        }

        let documents = parsed
            .documents
            .into_iter()
            .map(|d| {
                let document = Document::new(d.id.clone(), d.order).with_blocks(d.blocks);
                match books::long_name(&d.id) {
                    Some(name) => document.with_title(name),
                    None => document,
                }
            })
            .collect();
        let corpus = corpus.with_documents(documents).with_raw_source(FORMAT, source);

        let (loss_class, report) = tracker.finish();
        Ok(Extraction {
            corpus,
            loss_class,
            report,
        })
    }

    fn emit(&self, corpus: &Corpus) -> Result<Emission> {
        if let Some(raw) = corpus.raw_source(FORMAT)? {
            tracing::debug!("Replaying {} retained OSIS bytes for '{}'", raw.len(), corpus.id);
            return Ok(Emission {
                bytes: raw,
                format: FORMAT.to_string(),
                loss_class: LossClass::L0,
                report: LossReport::clean("ir", FORMAT, LossClass::L0),
            });
        }

        let mut tracker = LossTracker::new("ir", FORMAT, corpus.loss_class.max(LossClass::L1));
        let xml = write_osis(corpus, &mut tracker);
        let (loss_class, report) = tracker.finish();
        Ok(Emission {
            bytes: xml.into_bytes(),
            format: FORMAT.to_string(),
            loss_class,
            report,
        })
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

fn xml_error(reader: &Reader<&[u8]>, err: impl std::fmt::Display) -> Error {
    Error::parse(FORMAT, format!("at byte {}: {}", reader.buffer_position(), err))
}

/// Collect an element's attributes as owned strings
fn attributes(reader: &Reader<&[u8]>, e: &BytesStart) -> Result<HashMap<String, String>> {
    e.attributes()
        .map(|attr| {
            let attr = attr.map_err(|err| xml_error(reader, err))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value().map_err(|err| xml_error(reader, err))?.into_owned();
            Ok((key, value))
        })
        .collect()
}

struct DocumentBuilder {
    id: String,
    order: u32,
    blocks: Vec<ContentBlock>,
}

/// A verse being read: text so far plus its anchor arena
struct VerseBuilder {
    reference: Ref,
    block_id: String,
    text: String,
    len: u32,
    anchors: Vec<Anchor>,
    /// Open `<l>` spans: (span id, anchor holding it)
    open_lines: Vec<(String, String)>,
    next_span: u32,
}

impl VerseBuilder {
    fn new(block_id: String, reference: Ref) -> Self {
        let anchor = Anchor::new("a0", 0).with_span(Span::new("s0", SpanKind::Verse, "a0").with_ref(reference.clone()));
        Self {
            reference,
            block_id,
            text: String::new(),
            len: 0,
            anchors: vec![anchor],
            open_lines: Vec::new(),
            next_span: 1,
        }
    }

    fn push_text(&mut self, text: &str) {
        self.text.push_str(text);
        self.len += text.chars().count() as u32;
    }

    /// Anchor at the current position, created on first use
    fn anchor_here(&mut self) -> String {
        let id = format!("a{}", self.len);
        if !self.anchors.iter().any(|a| a.id == id) {
            self.anchors.push(Anchor::new(id.clone(), self.len));
        }
        id
    }

    fn add_span(&mut self, kind: SpanKind) -> (String, String) {
        let anchor_id = self.anchor_here();
        let span_id = format!("s{}", self.next_span);
        self.next_span += 1;
        if let Some(anchor) = self.anchors.iter_mut().find(|a| a.id == anchor_id) {
            anchor.spans.push(Span::new(span_id.clone(), kind, anchor_id.clone()));
        }
        (span_id, anchor_id)
    }

    fn add_note(&mut self, text: String, note_type: Option<String>) {
        let (span_id, anchor_id) = self.add_span(SpanKind::Note);
        if let Some(span) = self.span_mut(&anchor_id, &span_id) {
            span.end_anchor_id = Some(anchor_id.clone());
            span.attributes.insert("text".to_string(), text.into());
            if let Some(note_type) = note_type {
                span.attributes.insert("note_type".to_string(), note_type.into());
            }
        }
    }

    fn open_line(&mut self) {
        let line = self.add_span(SpanKind::Poetry);
        self.open_lines.push(line);
    }

    fn close_line(&mut self) {
        if let Some((span_id, anchor_id)) = self.open_lines.pop() {
            let end = self.anchor_here();
            if let Some(span) = self.span_mut(&anchor_id, &span_id) {
                span.end_anchor_id = Some(end);
            }
        }
    }

    fn span_mut(&mut self, anchor_id: &str, span_id: &str) -> Option<&mut Span> {
        self.anchors
            .iter_mut()
            .find(|a| a.id == anchor_id)?
            .spans
            .iter_mut()
            .find(|s| s.id == span_id)
    }

    fn finish(self, sequence: u32) -> ContentBlock {
        self.anchors
            .into_iter()
            .fold(ContentBlock::new(self.block_id, sequence, self.text), |block, anchor| {
                block.with_anchor(anchor)
            })
    }
}

/// Note text being collected
struct NoteBuilder {
    text: String,
    note_type: Option<String>,
    depth: u32,
}

#[derive(Default)]
struct OsisParser {
    seen_root: bool,
    work_id: Option<String>,
    language: Option<String>,
    header: HashMap<String, String>,
    in_work: bool,
    work_done: bool,
    header_field: Option<String>,
    documents: Vec<DocumentBuilder>,
    /// One entry per open `<div>`: the document index for book divs
    divs: Vec<Option<usize>>,
    extra_books: u32,
    verse: Option<VerseBuilder>,
    note: Option<NoteBuilder>,
    flattened: BTreeSet<String>,
}

impl OsisParser {
    fn run(mut self, xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    let attrs = attributes(&reader, &e)?;
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    self.start(&name, attrs, false)?;
                }
                Ok(Event::Empty(e)) => {
                    let attrs = attributes(&reader, &e)?;
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    self.start(&name, attrs, true)?;
                }
                Ok(Event::End(e)) => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    self.end(&name);
                }
                Ok(Event::Text(t)) => {
                    let text = t.unescape().map_err(|err| xml_error(&reader, err))?;
                    self.text(&text);
                }
                Ok(Event::CData(c)) => {
                    let text = std::str::from_utf8(&c).map_err(|err| xml_error(&reader, err))?;
                    self.text(text);
                }
                Ok(Event::Eof) => break,
                Err(err) => return Err(xml_error(&reader, err)),
                _ => {}
            }
            buf.clear();
        }

        if !self.seen_root {
            return Err(Error::parse(FORMAT, "no <osis> root element"));
        }
        self.close_verse();
        Ok(self)
    }

    fn start(&mut self, name: &str, attrs: HashMap<String, String>, empty: bool) -> Result<()> {
        if let Some(note) = self.note.as_mut() {
            if !empty {
                note.depth += 1;
            }
            return Ok(());
        }

        match name {
            "osis" => self.seen_root = true,
            "osisText" => {
                self.work_id = attrs.get("osisIDWork").cloned().filter(|s| !s.is_empty());
                self.language = attrs.get("xml:lang").cloned();
            }
            "work" if !self.work_done && !empty => {
                self.in_work = true;
                if self.work_id.is_none() {
                    self.work_id = attrs.get("osisWork").cloned().filter(|s| !s.is_empty());
                }
            }
            "title" | "publisher" | "rights" | "description" | "refSystem" | "language" if self.in_work => {
                if !empty {
                    self.header_field = Some(name.to_string());
                }
            }
            "div" => {
                let book = match (attrs.get("type").map(String::as_str), attrs.get("osisID")) {
                    (Some("book"), Some(id)) => Some(self.document_index(id)),
                    _ => None,
                };
                if !empty {
                    self.divs.push(book);
                }
            }
            "verse" => {
                if attrs.contains_key("eID") {
                    self.close_verse();
                } else if let Some(id) = attrs.get("osisID").or_else(|| attrs.get("sID")) {
                    self.open_verse(id)?;
                    if empty && !attrs.contains_key("sID") {
                        self.close_verse();
                    }
                }
            }
            "note" if self.verse.is_some() && !empty => {
                self.note = Some(NoteBuilder {
                    text: String::new(),
                    note_type: attrs.get("type").cloned(),
                    depth: 0,
                });
            }
            "l" if !empty => {
                if let Some(verse) = self.verse.as_mut() {
                    verse.open_line();
                }
            }
            "chapter" | "header" | "lb" => {}
            other => {
                if self.verse.is_some() {
                    self.flattened.insert(other.to_string());
                }
            }
        }
        Ok(())
    }

    fn end(&mut self, name: &str) {
        if let Some(note) = self.note.as_mut() {
            if note.depth > 0 {
                note.depth -= 1;
                return;
            }
            if let (Some(note), Some(verse)) = (self.note.take(), self.verse.as_mut()) {
                verse.add_note(note.text, note.note_type);
            }
            return;
        }

        match name {
            "work" if self.in_work => {
                self.in_work = false;
                self.work_done = true;
            }
            "div" => {
                self.divs.pop();
            }
            "verse" => self.close_verse(),
            "l" => {
                if let Some(verse) = self.verse.as_mut() {
                    verse.close_line();
                }
            }
            _ => {
                if self.header_field.as_deref() == Some(name) {
                    self.header_field = None;
                }
            }
        }
    }

    fn text(&mut self, text: &str) {
        if let Some(note) = self.note.as_mut() {
            note.text.push_str(text);
        } else if let Some(verse) = self.verse.as_mut() {
            verse.push_text(text);
        } else if let Some(field) = &self.header_field {
            self.header.entry(field.clone()).or_default().push_str(text);
        }
    }

    fn open_verse(&mut self, osis_id: &str) -> Result<()> {
        self.close_verse();
        // osisID may list several references; the first names the block
        let first = osis_id.split_whitespace().next().unwrap_or(osis_id);
        let reference = Ref::parse(first)
            .map_err(|e| Error::parse(FORMAT, format!("verse osisID '{}': {}", osis_id, e)))?;
        self.verse = Some(VerseBuilder::new(first.to_string(), reference));
        Ok(())
    }

    fn close_verse(&mut self) {
        let Some(verse) = self.verse.take() else {
            return;
        };
        let index = match self.divs.iter().rev().find_map(|d| *d) {
            Some(index) => index,
            None => self.document_index(&verse.reference.book),
        };
        let document = &mut self.documents[index];
        let sequence = document.blocks.last().map(|b| b.sequence + 1).unwrap_or(1);
        document.blocks.push(verse.finish(sequence));
    }

    fn document_index(&mut self, id: &str) -> usize {
        if let Some(index) = self.documents.iter().position(|d| d.id == id) {
            return index;
        }
        let order = books::order_for_code(id, &mut self.extra_books);
        self.documents.push(DocumentBuilder {
            id: id.to_string(),
            order,
            blocks: Vec::new(),
        });
        self.documents.len() - 1
    }
}

/// Inline markup placed at one character position
enum Markup<'a> {
    CloseLine,
    Note(&'a Span),
    OpenLine,
}

fn write_osis(corpus: &Corpus, tracker: &mut LossTracker) -> String {
    let id = escape(&corpus.id);
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let _ = writeln!(out, "<osis xmlns=\"{}\">", OSIS_NAMESPACE);
    let _ = match &corpus.language {
        Some(lang) => writeln!(out, "  <osisText osisIDWork=\"{}\" xml:lang=\"{}\">", id, escape(lang)),
        None => writeln!(out, "  <osisText osisIDWork=\"{}\">", id),
    };
    out.push_str("    <header>\n");
    let _ = writeln!(out, "      <work osisWork=\"{}\">", id);
    let fields = [
        ("title", &corpus.title),
        ("publisher", &corpus.publisher),
        ("rights", &corpus.rights),
        ("description", &corpus.description),
    ];
    for (tag, value) in fields {
        if let Some(value) = value {
            let _ = writeln!(out, "        <{tag}>{}</{tag}>", escape(value));
        }
    }
    if let Some(system) = &corpus.versification {
        let _ = writeln!(out, "        <refSystem>Bible.{}</refSystem>", escape(system));
    }
    out.push_str("      </work>\n    </header>\n");

    if corpus.module_kind != ModuleKind::TextCollection {
        tracker.degrade(LossClass::L2, format!("module_kind:{}", corpus.module_kind));
    }
    if corpus.attributes.keys().any(|k| !k.starts_with(RAW_SOURCE_PREFIX)) {
        tracker.degrade(LossClass::L2, "corpus:attributes");
    }

    let mut extra_books = 0;
    for document in &corpus.documents {
        let expected_order = books::order_for_code(&document.id, &mut extra_books);
        regenerate::track_document(tracker, document, expected_order);
        let _ = writeln!(out, "    <div type=\"book\" osisID=\"{}\">", escape(&document.id));
        for (index, block) in document.content_blocks.iter().enumerate() {
            write_block(&mut out, block, index, tracker);
        }
        out.push_str("    </div>\n");
    }

    out.push_str("  </osisText>\n</osis>\n");
    out
}

fn write_block(out: &mut String, block: &ContentBlock, index: usize, tracker: &mut LossTracker) {
    regenerate::track_verse_spans(tracker, block);

    let mut markup: Vec<(u32, Markup)> = Vec::new();
    for span in block.spans() {
        match span.kind {
            SpanKind::Verse => {}
            SpanKind::Note => {
                regenerate::track_span_attributes(tracker, span, &["text", "note_type"]);
                if let Some((start, _)) = block.span_range(span) {
                    markup.push((start, Markup::Note(span)));
                }
            }
            SpanKind::Poetry => {
                regenerate::track_span_attributes(tracker, span, &[]);
                if let Some((start, end)) = block.span_range(span) {
                    markup.push((start, Markup::OpenLine));
                    markup.push((end, Markup::CloseLine));
                }
            }
            ref other => tracker.degrade(LossClass::L2, format!("span:{}", other)),
        }
    }
    markup.sort_by_key(|(position, m)| {
        let rank = match m {
            Markup::CloseLine => 0,
            Markup::Note(_) => 1,
            Markup::OpenLine => 2,
        };
        (*position, rank)
    });

    let (open, close) = match block.verse_ref() {
        Some(reference) => {
            regenerate::track_block(tracker, block, index, reference);
            (format!("<verse osisID=\"{}\">", escape(&reference.to_canonical_string())), "</verse>")
        }
        None => {
            if !block.attributes.is_empty() {
                tracker.degrade(LossClass::L2, "block:attributes");
            }
            tracker.degrade(LossClass::L2, "block:unreferenced");
            ("<p>".to_string(), "</p>")
        }
    };
    out.push_str("      ");
    out.push_str(&open);

    let mut pending = markup.iter().peekable();
    let mut chars = block.text.chars();
    let mut position = 0u32;
    let mut segment = String::new();
    loop {
        while let Some((_, m)) = pending.next_if(|(p, _)| *p == position) {
            out.push_str(&escape(&segment));
            segment.clear();
            match m {
                Markup::CloseLine => out.push_str("</l>"),
                Markup::OpenLine => out.push_str("<l>"),
                Markup::Note(span) => {
                    let text = span.attribute_str("text").unwrap_or_default();
                    match span.attribute_str("note_type") {
                        Some(t) => {
                            let _ = write!(out, "<note type=\"{}\">{}</note>", escape(t), escape(text));
                        }
                        None => {
                            let _ = write!(out, "<note>{}</note>", escape(text));
                        }
                    }
                }
            }
        }
        match chars.next() {
            Some(c) => segment.push(c),
            None => break,
        }
        position += 1;
    }
    out.push_str(&escape(&segment));
    out.push_str(close);
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::contract;

    const GENESIS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<osis xmlns="http://www.bibletechnologies.net/2003/OSIS/namespace">
  <osisText osisIDWork="KJV" xml:lang="en">
    <header>
      <work osisWork="KJV">
        <title>King James Version</title>
        <refSystem>Bible.KJV</refSystem>
      </work>
    </header>
    <div type="book" osisID="Gen">
      <chapter osisID="Gen.1">
        <verse osisID="Gen.1.1">In the beginning God created the heaven and the earth.</verse>
        <verse osisID="Gen.1.2">And the earth was without form<note type="study">Heb. tohu</note>, and void.</verse>
      </chapter>
    </div>
  </osisText>
</osis>
"#;

    fn extract(xml: &str) -> Extraction {
        contract::extract(&OsisCodec, xml.as_bytes(), &ExtractOptions::default()).unwrap()
    }

    #[test]
    fn test_container_verses() {
        let extraction = extract(GENESIS);
        let corpus = &extraction.corpus;
        assert_eq!(extraction.loss_class, LossClass::L0);
        assert_eq!(corpus.id, "KJV");
        assert_eq!(corpus.language.as_deref(), Some("en"));
        assert_eq!(corpus.title.as_deref(), Some("King James Version"));
        assert_eq!(corpus.versification.as_deref(), Some("KJV"));

        assert_eq!(corpus.documents.len(), 1);
        let genesis = &corpus.documents[0];
        assert_eq!(genesis.id, "Gen");
        assert_eq!(genesis.order, 1);
        assert_eq!(genesis.content_blocks.len(), 2);

        let second = &genesis.content_blocks[1];
        assert_eq!(second.sequence, 2);
        assert_eq!(second.text, "And the earth was without form, and void.");
        assert_eq!(second.verse_ref().unwrap().to_string(), "Gen.1.2");
        let note = second.spans_of(SpanKind::Note).next().unwrap();
        assert_eq!(note.attribute_str("text"), Some("Heb. tohu"));
        assert_eq!(note.attribute_str("note_type"), Some("study"));
        assert_eq!(second.span_range(note), Some((30, 30)));
    }

    #[test]
    fn test_milestone_verses_and_poetry() {
        let xml = r#"<osis><osisText osisIDWork="WEB"><div type="book" osisID="Ps">
<verse sID="Ps.23.1" osisID="Ps.23.1"/><l>The LORD is my shepherd;</l> <l>I shall not want.</l><verse eID="Ps.23.1"/>
<verse sID="Ps.23.2" osisID="Ps.23.2"/>He makes me lie down<verse eID="Ps.23.2"/>
</div></osisText></osis>"#;
        let corpus = extract(xml).corpus;
        let psalms = corpus.document("Ps").unwrap();
        assert_eq!(psalms.order, 19);
        assert_eq!(psalms.content_blocks.len(), 2);

        let first = &psalms.content_blocks[0];
        let lines: Vec<_> = first.spans_of(SpanKind::Poetry).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(first.span_text(lines[0]).unwrap(), "The LORD is my shepherd;");
        assert_eq!(first.span_text(lines[1]).unwrap(), "I shall not want.");
        assert_eq!(psalms.content_blocks[1].text, "He makes me lie down");
    }

    #[test]
    fn test_corpus_id_fallback() {
        let xml = r#"<osis><osisText><div type="book" osisID="Gen"><verse osisID="Gen.1.1">x</verse></div></osisText></osis>"#;
        let err = OsisCodec.extract(xml.as_bytes(), &ExtractOptions::default()).unwrap_err();
        assert!(matches!(err, Error::MissingIdentifier(_)));

        let extraction = OsisCodec.extract(xml.as_bytes(), &ExtractOptions::with_hint("mybible")).unwrap();
        assert_eq!(extraction.corpus.id, "mybible");
    }

    #[test]
    fn test_malformed_xml_is_a_parse_error() {
        let err = OsisCodec
            .extract(b"<osis><osisText osisIDWork='X'><verse osisID='Gen.1.1'>x</div></osis>", &ExtractOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Parse);

        let err = OsisCodec.extract(b"<html/>", &ExtractOptions::default()).unwrap_err();
        assert!(err.to_string().contains("<osis>"));
    }

    #[test]
    fn test_replay_is_byte_identical() {
        let round_trip = contract::verify_round_trip(&OsisCodec, GENESIS.as_bytes(), &ExtractOptions::default()).unwrap();
        assert_eq!(round_trip.emit_class, LossClass::L0);
        assert!(round_trip.byte_identical);
        assert!(round_trip.ir_identical);
    }

    #[test]
    fn test_regenerated_output_reextracts() {
        let corpus = extract(GENESIS).corpus;
        let mut stripped = corpus.clone();
        stripped.attributes.clear();
        stripped.loss_class = LossClass::L1;

        let emission = contract::emit(&OsisCodec, &stripped).unwrap();
        assert_eq!(emission.loss_class, LossClass::L1);
        let again = extract(std::str::from_utf8(&emission.bytes).unwrap()).corpus;
        assert_eq!(again.documents, corpus.documents);
        assert_eq!(again.title, corpus.title);
    }

    #[test]
    fn test_foreign_spans_degrade_to_l2() {
        let block = ContentBlock::verse("John.1.1", 1, "In the beginning was the Word", Ref::verse("John", 1, 1))
            .with_anchor(Anchor::new("a17", 17).with_span(Span::new("s1", SpanKind::Variant, "a17")));
        let corpus = Corpus::new("NA28", "vpl").with_document(Document::new("John", 43).with_title("John").with_block(block));
        let emission = contract::emit(&OsisCodec, &corpus).unwrap();
        assert_eq!(emission.loss_class, LossClass::L2);
        assert_eq!(emission.report.lost_elements, vec!["span:VARIANT"]);
    }

    #[test]
    fn test_dropped_identity_and_attributes_degrade_to_l2() {
        let block = ContentBlock::new("b5", 5, "Blessed is the man").with_anchor(
            Anchor::new("a0", 0)
                .with_span(Span::new("s0", SpanKind::Verse, "a0").with_ref(Ref::verse("Ps", 1, 1)).with_attribute("source", "ms"))
                .with_span(Span::new("s1", SpanKind::Poetry, "a0").with_attribute("level", 2i64)),
        );
        let corpus = Corpus::new("WEB", "vpl").with_document(Document::new("Ps", 19).with_title("Tehillim").with_block(block));
        let emission = contract::emit(&OsisCodec, &corpus).unwrap();
        assert_eq!(emission.loss_class, LossClass::L2);
        assert_eq!(
            emission.report.lost_elements,
            vec![
                "document:title",
                "span:VERSE:attributes",
                "span:POETRY:attributes",
                "block:sequence",
                "block:id"
            ]
        );

        let again = extract(std::str::from_utf8(&emission.bytes).unwrap()).corpus;
        let psalm = &again.documents[0].content_blocks[0];
        assert_eq!(psalm.text, "Blessed is the man");
        assert_eq!(psalm.sequence, 1);
    }

    #[test]
    fn test_note_keeps_only_text_and_type() {
        let note = Span::new("s1", SpanKind::Note, "a4")
            .ending_at("a4")
            .with_attribute("text", "or, happy")
            .with_attribute("resp", "translator");
        let block = ContentBlock::verse("Ps.1.1", 1, "Blessed is the man", Ref::verse("Ps", 1, 1))
            .with_anchor(Anchor::new("a4", 4).with_span(note));
        let corpus = Corpus::new("WEB", "vpl").with_document(Document::new("Ps", 19).with_title("Psalms").with_block(block));
        let emission = contract::emit(&OsisCodec, &corpus).unwrap();
        assert_eq!(emission.report.lost_elements, vec!["span:NOTE:attributes"]);
    }

    #[test]
    fn test_empty_corpus_emits_shell() {
        let corpus = Corpus::new("EMPTY", "vpl");
        let emission = contract::emit(&OsisCodec, &corpus).unwrap();
        let xml = String::from_utf8(emission.bytes).unwrap();
        assert!(xml.contains("<osisText osisIDWork=\"EMPTY\">"));
        let again = extract(&xml).corpus;
        assert!(again.documents.is_empty());
        assert_eq!(again.id, "EMPTY");
    }
}
