//! e-Sword style SQLite Bible codec
//!
//! A module is an SQLite database with two tables:
//! - `Bible(Book, Chapter, Verse, Scripture)` keyed by legacy book numbers 1..=66
//! - `Details(...)`, one row of module metadata
//!
//! Byte payloads are materialized in a temporary file because SQLite reads
//! from paths.

use super::framework::{enumerate_path, Codec, Emission, Entry, ExtractOptions, Extraction};
use super::regenerate;
use crate::books;
use crate::ignore::IgnoreFilter;
use crate::ir::{ContentBlock, Corpus, Document, ModuleKind, SpanKind, RAW_SOURCE_PREFIX};
use crate::loss::{LossClass, LossTracker};
use crate::reference::Ref;
use crate::{Error, IoContext, Result};
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OpenFlags};
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::Path;

pub const FORMAT: &str = "esword";

const SQLITE_MAGIC: &[u8] = b"SQLite format 3\0";

/// Table definitions written on emit
pub const CREATE_BIBLE: &str = r#"
CREATE TABLE IF NOT EXISTS Bible (
    Book INTEGER NOT NULL,
    Chapter INTEGER NOT NULL,
    Verse INTEGER NOT NULL,
    Scripture TEXT
)
"#;

pub const CREATE_BIBLE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS BookChapterVerseIndex ON Bible (Book, Chapter, Verse)
"#;

pub const CREATE_DETAILS: &str = r#"
CREATE TABLE IF NOT EXISTS Details (
    Title TEXT,
    Abbreviation TEXT,
    Description TEXT,
    Language TEXT,
    Publisher TEXT,
    Rights TEXT,
    Versification TEXT
)
"#;

pub fn all_schema_statements() -> Vec<&'static str> {
    vec![CREATE_BIBLE, CREATE_BIBLE_INDEX, CREATE_DETAILS]
}

/// Codec for e-Sword `.bblx` modules
#[derive(Debug, Default)]
pub struct EswordCodec;

impl EswordCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Codec for EswordCodec {
    fn format_name(&self) -> &str {
        FORMAT
    }

    fn description(&self) -> &str {
        "e-Sword Bible module (SQLite)"
    }

    fn file_extensions(&self) -> &[&str] {
        &["bblx", "bbli"]
    }

    fn sniff(&self, head: &[u8]) -> Option<String> {
        head.starts_with(SQLITE_MAGIC).then(|| "SQLite database header".to_string())
    }

    fn extract(&self, source: &[u8], options: &ExtractOptions) -> Result<Extraction> {
        if !source.starts_with(SQLITE_MAGIC) {
            return Err(Error::parse(FORMAT, "input is not an SQLite database"));
        }
        let file = materialize(source)?;
        let conn = Connection::open_with_flags(file.path(), OpenFlags::SQLITE_OPEN_READ_ONLY)?;

        let tables = table_names(&conn)?;
        if !tables.iter().any(|t| t == "Bible") {
            return Err(Error::parse(FORMAT, "database has no Bible table"));
        }
        let details = if tables.iter().any(|t| t == "Details") {
            read_details(&conn)?
        } else {
            HashMap::new()
        };

        let mut tracker = LossTracker::new(FORMAT, "ir", LossClass::L1);
        let mut documents: Vec<Document> = Vec::new();
        let mut stmt = conn.prepare("SELECT Book, Chapter, Verse, Scripture FROM Bible ORDER BY Book, Chapter, Verse")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        for (book, chapter, verse, scripture) in rows {
            let (Ok(book), Ok(chapter), Ok(verse)) = (u32::try_from(book), u32::try_from(chapter), u32::try_from(verse))
            else {
                return Err(Error::parse(FORMAT, format!("negative location {}:{}:{}", book, chapter, verse)));
            };
            if book == 0 || chapter == 0 || verse == 0 {
                return Err(Error::parse(FORMAT, format!("zero location {}:{}:{}", book, chapter, verse)));
            }

            let code = match books::code_for_ordinal(book) {
                Some(code) => code.to_string(),
                None => {
                    tracker.warn(format!("book number {} is outside the 66-book table", book));
                    format!("B{}", book)
                }
            };
            if documents.last().is_none_or(|d| d.order != book) {
                let document = Document::new(code.clone(), book);
                documents.push(match books::long_name(&code) {
                    Some(name) => document.with_title(name),
                    None => document,
                });
            }
            let Some(document) = documents.last_mut() else {
                continue;
            };
            let reference = Ref::verse(code, chapter, verse);
            let block = ContentBlock::verse(
                reference.to_canonical_string(),
                document.next_sequence(),
                scripture.unwrap_or_default(),
                reference,
            );
            document.content_blocks.push(block);
        }

        let id = details
            .get("Abbreviation")
            .filter(|s| !s.is_empty())
            .cloned()
            .or_else(|| options.corpus_hint.clone())
            .ok_or_else(|| {
                Error::MissingIdentifier("module has no Details.Abbreviation and no fallback name was given".to_string())
            })?;

        let mut corpus = Corpus::new(id, FORMAT).with_source_bytes(source);
        if let Some(title) = details.get("Title") {
            corpus = corpus.with_title(title.clone());
        }
        if let Some(description) = details.get("Description") {
            corpus = corpus.with_description(description.clone());
        }
        if let Some(language) = details.get("Language") {
            corpus = corpus.with_language(language.clone());
        }
        if let Some(publisher) = details.get("Publisher") {
            corpus = corpus.with_publisher(publisher.clone());
        }
        if let Some(rights) = details.get("Rights") {
            corpus = corpus.with_rights(rights.clone());
        }
        if let Some(versification) = details.get("Versification") {
            corpus = corpus.with_versification(versification.clone());
        }
        let corpus = corpus.with_documents(documents);

        let (loss_class, report) = tracker.finish();
        Ok(Extraction {
            corpus,
            loss_class,
            report,
        })
    }

    fn emit(&self, corpus: &Corpus) -> Result<Emission> {
        let mut tracker = LossTracker::new("ir", FORMAT, corpus.loss_class.max(LossClass::L1));
        if corpus.module_kind != ModuleKind::TextCollection {
            tracker.degrade(LossClass::L2, format!("module_kind:{}", corpus.module_kind));
        }
        if corpus.attributes.keys().any(|k| !k.starts_with(RAW_SOURCE_PREFIX)) {
            tracker.degrade(LossClass::L2, "corpus:attributes");
        }

        let dir = tempfile::tempdir().with_context(|| "creating scratch directory".to_string())?;
        let path = dir.path().join("module.bblx");
        let mut conn = Connection::open(&path)?;
        for stmt in all_schema_statements() {
            conn.execute(stmt, [])?;
        }

        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO Details (Title, Abbreviation, Description, Language, Publisher, Rights, Versification)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                corpus.title,
                corpus.id,
                corpus.description,
                corpus.language,
                corpus.publisher,
                corpus.rights,
                corpus.versification,
            ],
        )?;

        {
            let mut insert = tx.prepare("INSERT INTO Bible (Book, Chapter, Verse, Scripture) VALUES (?1, ?2, ?3, ?4)")?;
            for document in &corpus.documents {
                let Some(book) = legacy_book_number(&document.id) else {
                    tracker.degrade(LossClass::L2, format!("document:{} (no legacy book number)", document.id));
                    continue;
                };
                regenerate::track_document(&mut tracker, document, book);

                let mut previous: Option<(u32, u32)> = None;
                for (index, block) in document.content_blocks.iter().enumerate() {
                    let reference = block.verse_ref().ok_or_else(|| {
                        Error::MissingIdentifier(format!(
                            "block '{}' in '{}' has no verse reference to key its row",
                            block.id, document.id
                        ))
                    })?;
                    if reference.chapter == 0 || reference.verse == 0 {
                        return Err(Error::MissingIdentifier(format!(
                            "block '{}' in '{}' is keyed by '{}', which has no chapter and verse for its row",
                            block.id, document.id, reference
                        )));
                    }
                    if reference.book != document.id {
                        tracker.degrade(LossClass::L2, "document:grouping");
                    }
                    if reference.is_range() || reference.sub_verse.is_some() {
                        tracker.degrade(LossClass::L2, "ref:range-or-sub-verse");
                    }
                    let location = (reference.chapter, reference.verse);
                    if previous.is_some_and(|p| p >= location) {
                        tracker.degrade(LossClass::L2, "block:order");
                    }
                    previous = Some(location);

                    regenerate::track_block(&mut tracker, block, index, reference);
                    regenerate::track_verse_spans(&mut tracker, block);
                    for span in block.spans().filter(|s| s.kind != SpanKind::Verse) {
                        tracker.degrade(LossClass::L2, format!("span:{}", span.kind));
                    }
                    insert.execute(params![book, reference.chapter, reference.verse, block.text])?;
                }
            }
        }
        tx.commit()?;
        conn.close().map_err(|(_, e)| Error::Storage(e))?;

        let bytes = std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
        let (loss_class, report) = tracker.finish();
        Ok(Emission {
            bytes,
            format: FORMAT.to_string(),
            loss_class,
            report,
        })
    }

    /// A module file lists its tables with row counts; directories are walked
    fn enumerate(&self, path: &Path) -> Result<Vec<Entry>> {
        if !path.is_file() {
            return enumerate_path(path, &IgnoreFilter::new(path, None));
        }
        let mut entries = enumerate_path(path, &IgnoreFilter::new(path, None))?;
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        for table in table_names(&conn)? {
            let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM \"{}\"", table.replace('"', "\"\"")), [], |row| {
                row.get(0)
            })?;
            let metadata = BTreeMap::from([
                ("kind".to_string(), "table".to_string()),
                ("rows".to_string(), count.to_string()),
            ]);
            entries.push(Entry {
                path: format!("{}#{}", path.display(), table),
                size_bytes: 0,
                is_dir: false,
                metadata: Some(metadata),
            });
        }
        Ok(entries)
    }
}

/// Legacy number for a document id: canonical code, or the `B<n>` form
/// extraction uses for books outside the table
fn legacy_book_number(id: &str) -> Option<u32> {
    books::ordinal_for_code(id).or_else(|| id.strip_prefix('B').and_then(|n| n.parse().ok()).filter(|n| *n > 0))
}

fn materialize(source: &[u8]) -> Result<tempfile::NamedTempFile> {
    let mut file = tempfile::NamedTempFile::new().with_context(|| "creating scratch file".to_string())?;
    file.write_all(source)
        .and_then(|_| file.flush())
        .with_context(|| format!("writing scratch file {}", file.path().display()))?;
    Ok(file)
}

fn table_names(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(names)
}

/// First Details row as column name -> text; columns vary between modules
fn read_details(conn: &Connection) -> Result<HashMap<String, String>> {
    let mut stmt = conn.prepare("SELECT * FROM Details LIMIT 1")?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(str::to_string).collect();
    let mut rows = stmt.query([])?;
    let mut details = HashMap::new();
    if let Some(row) = rows.next()? {
        for (index, column) in columns.iter().enumerate() {
            let value = match row.get_ref(index)? {
                ValueRef::Text(text) => Some(String::from_utf8_lossy(text).into_owned()),
                ValueRef::Integer(n) => Some(n.to_string()),
                ValueRef::Real(f) => Some(f.to_string()),
                ValueRef::Null | ValueRef::Blob(_) => None,
            };
            if let Some(value) = value {
                details.insert(column.clone(), value);
            }
        }
    }
    Ok(details)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::contract;
    use crate::ir::{Anchor, Span};

    fn kjv() -> Corpus {
        Corpus::new("KJV", "vpl")
            .with_title("King James Version")
            .with_language("en")
            .with_documents(vec![
                Document::new("Gen", 1).with_title("Genesis").with_blocks(vec![
                    ContentBlock::verse("Gen.1.1", 1, "In the beginning", Ref::verse("Gen", 1, 1)),
                    ContentBlock::verse("Gen.1.2", 2, "And the earth", Ref::verse("Gen", 1, 2)),
                ]),
                Document::new("Rev", 66)
                    .with_title("Revelation")
                    .with_block(ContentBlock::verse("Rev.22.21", 1, "Amen.", Ref::verse("Rev", 22, 21))),
            ])
    }

    #[test]
    fn test_emit_then_extract() {
        let emission = contract::emit(&EswordCodec, &kjv()).unwrap();
        assert_eq!(emission.loss_class, LossClass::L1);
        assert!(emission.bytes.starts_with(SQLITE_MAGIC));

        let extraction = contract::extract(&EswordCodec, &emission.bytes, &ExtractOptions::default()).unwrap();
        let corpus = extraction.corpus;
        assert_eq!(corpus.id, "KJV");
        assert_eq!(corpus.title.as_deref(), Some("King James Version"));
        assert_eq!(corpus.documents.len(), 2);
        assert_eq!(corpus.documents[1].id, "Rev");
        assert_eq!(corpus.documents[1].order, 66);
        assert_eq!(corpus.documents[0].content_blocks[1].text, "And the earth");
        let refs: Vec<_> = corpus.verse_refs().iter().map(|r| r.to_string()).collect();
        assert_eq!(refs, vec!["Gen.1.1", "Gen.1.2", "Rev.22.21"]);
    }

    #[test]
    fn test_documents_without_book_number_are_dropped() {
        let corpus = kjv().with_document(
            Document::new("Intro", 2000).with_block(ContentBlock::verse("Intro.1.1", 1, "Preface", Ref::verse("Intro", 1, 1))),
        );
        let emission = contract::emit(&EswordCodec, &corpus).unwrap();
        assert_eq!(emission.loss_class, LossClass::L2);
        assert_eq!(emission.report.lost_elements, vec!["document:Intro (no legacy book number)"]);
    }

    #[test]
    fn test_markup_degrades() {
        let block = ContentBlock::verse("Gen.1.1", 1, "In the beginning", Ref::verse("Gen", 1, 1))
            .with_anchor(Anchor::new("a3", 3).with_span(Span::new("s1", SpanKind::Note, "a3")));
        let corpus = Corpus::new("X", "osis").with_document(Document::new("Gen", 1).with_title("Genesis").with_block(block));
        let emission = contract::emit(&EswordCodec, &corpus).unwrap();
        assert_eq!(emission.loss_class, LossClass::L2);
    }

    #[test]
    fn test_verseless_reference_is_refused() {
        let block = ContentBlock::verse("Gen.1", 1, "Chapter heading", Ref::chapter("Gen", 1));
        let corpus = Corpus::new("X", "osis").with_document(Document::new("Gen", 1).with_title("Genesis").with_block(block));
        let err = contract::emit(&EswordCodec, &corpus).unwrap_err();
        assert!(matches!(err, Error::MissingIdentifier(_)));

        let chapterless = ContentBlock::verse("Gen.0.3", 1, "Prologue", Ref::verse("Gen", 0, 3));
        let corpus = Corpus::new("X", "osis").with_document(Document::new("Gen", 1).with_title("Genesis").with_block(chapterless));
        assert!(contract::emit(&EswordCodec, &corpus).is_err());
    }

    #[test]
    fn test_rows_out_of_reference_order_degrade() {
        let corpus = Corpus::new("X", "vpl").with_document(Document::new("Gen", 1).with_title("Genesis").with_blocks(vec![
            ContentBlock::verse("Gen.1.2", 1, "second", Ref::verse("Gen", 1, 2)),
            ContentBlock::verse("Gen.1.1", 2, "first", Ref::verse("Gen", 1, 1)),
        ]));
        let emission = contract::emit(&EswordCodec, &corpus).unwrap();
        assert_eq!(emission.loss_class, LossClass::L2);
        assert_eq!(emission.report.lost_elements, vec!["block:order"]);
    }

    #[test]
    fn test_empty_corpus_is_an_empty_shell() {
        let emission = contract::emit(&EswordCodec, &Corpus::new("EMPTY", "vpl")).unwrap();
        let corpus = contract::extract(&EswordCodec, &emission.bytes, &ExtractOptions::default())
            .unwrap()
            .corpus;
        assert_eq!(corpus.id, "EMPTY");
        assert!(corpus.documents.is_empty());
    }

    #[test]
    fn test_not_a_database() {
        let err = EswordCodec.extract(b"plain text", &ExtractOptions::default()).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Parse);
    }

    #[test]
    fn test_enumerate_lists_tables() {
        let emission = contract::emit(&EswordCodec, &kjv()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kjv.bblx");
        std::fs::write(&path, &emission.bytes).unwrap();

        let entries = EswordCodec.enumerate(&path).unwrap();
        assert_eq!(entries.len(), 3);
        let bible = entries.iter().find(|e| e.path.ends_with("#Bible")).unwrap();
        assert_eq!(bible.metadata.as_ref().unwrap()["rows"], "3");
        assert!(EswordCodec.detect(&path).unwrap().detected);
    }

    #[test]
    fn test_legacy_book_number() {
        assert_eq!(legacy_book_number("Matt"), Some(40));
        assert_eq!(legacy_book_number("B67"), Some(67));
        assert_eq!(legacy_book_number("Intro"), None);
    }
}
