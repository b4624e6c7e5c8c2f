//! Corpus and Document - the root and logical units of the IR tree

use super::block::ContentBlock;
use crate::digest;
use crate::loss::LossClass;
use crate::reference::Ref;
use crate::value::{Attributes, Value};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// IR format version written into every corpus
pub const IR_VERSION: &str = "1.0.0";

/// Attribute-key prefix under which a codec retains raw source bytes
pub const RAW_SOURCE_PREFIX: &str = "raw_source:";

/// What kind of collection a corpus is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModuleKind {
    /// Bible text or any verse-addressed text collection
    #[default]
    TextCollection,
    /// Commentary keyed to references
    Commentary,
    /// Dictionary / lexicon keyed by headword
    Dictionary,
    /// General book with its own chapter structure
    GeneralBook,
}

impl ModuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleKind::TextCollection => "text-collection",
            ModuleKind::Commentary => "commentary",
            ModuleKind::Dictionary => "dictionary",
            ModuleKind::GeneralBook => "general-book",
        }
    }
}

impl FromStr for ModuleKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text-collection" | "bible" | "text" => Ok(ModuleKind::TextCollection),
            "commentary" | "comm" => Ok(ModuleKind::Commentary),
            "dictionary" | "lexicon" | "lexdict" => Ok(ModuleKind::Dictionary),
            "general-book" | "genbook" | "book" => Ok(ModuleKind::GeneralBook),
            _ => Err(crate::Error::InvalidArgument(format!("Unknown module kind: {}", s))),
        }
    }
}

impl std::fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One logical unit inside a corpus (a book, a dictionary, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Ordering key, unique within the corpus
    pub order: u32,
    #[serde(default)]
    pub content_blocks: Vec<ContentBlock>,
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
}

impl Document {
    pub fn new(id: impl Into<String>, order: u32) -> Self {
        Self {
            id: id.into(),
            title: None,
            order,
            content_blocks: Vec::new(),
            attributes: Attributes::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_blocks(mut self, blocks: Vec<ContentBlock>) -> Self {
        self.content_blocks = blocks;
        self
    }

    pub fn with_block(mut self, block: ContentBlock) -> Self {
        self.content_blocks.push(block);
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn block(&self, id: &str) -> Option<&ContentBlock> {
        self.content_blocks.iter().find(|b| b.id == id)
    }

    /// Next sequence number after the last block
    pub fn next_sequence(&self) -> u32 {
        self.content_blocks.last().map(|b| b.sequence + 1).unwrap_or(1)
    }
}

/// Root of one converted document collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Corpus {
    pub id: String,
    pub version: String,
    pub module_kind: ModuleKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub versification: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rights: Option<String>,
    /// Format the corpus was extracted from
    pub source_format: String,
    /// Content hash of the original source bytes
    #[serde(default)]
    pub source_hash: String,
    pub loss_class: LossClass,
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
    #[serde(default)]
    pub documents: Vec<Document>,
}

impl Corpus {
    /// Create an empty corpus classified L1
    pub fn new(id: impl Into<String>, source_format: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: IR_VERSION.to_string(),
            module_kind: ModuleKind::default(),
            versification: None,
            language: None,
            title: None,
            description: None,
            publisher: None,
            rights: None,
            source_format: source_format.into(),
            source_hash: String::new(),
            loss_class: LossClass::L1,
            attributes: Attributes::new(),
            documents: Vec::new(),
        }
    }

    pub fn with_module_kind(mut self, kind: ModuleKind) -> Self {
        self.module_kind = kind;
        self
    }

    pub fn with_versification(mut self, versification: impl Into<String>) -> Self {
        self.versification = Some(versification.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_publisher(mut self, publisher: impl Into<String>) -> Self {
        self.publisher = Some(publisher.into());
        self
    }

    pub fn with_rights(mut self, rights: impl Into<String>) -> Self {
        self.rights = Some(rights.into());
        self
    }

    /// Record the hash of the bytes this corpus was extracted from
    pub fn with_source_bytes(mut self, source: &[u8]) -> Self {
        self.source_hash = digest::content_hash(source);
        self
    }

    pub fn with_loss_class(mut self, loss_class: LossClass) -> Self {
        self.loss_class = loss_class;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_document(mut self, document: Document) -> Self {
        self.documents.push(document);
        self
    }

    /// Replace the document list, sorted by `order`
    pub fn with_documents(mut self, mut documents: Vec<Document>) -> Self {
        documents.sort_by_key(|d| d.order);
        self.documents = documents;
        self
    }

    /// Retain the verbatim source for exact replay by `codec`; classifies L0.
    pub fn with_raw_source(mut self, codec: &str, source: &[u8]) -> Self {
        self.attributes.insert(
            raw_source_key(codec),
            Value::String(digest::encode_payload(source)),
        );
        self.loss_class = LossClass::L0;
        self
    }

    /// Raw source retained by `codec`, if any.
    ///
    /// A payload that fails to decode is reported as an error rather than
    /// treated as absent, so a corrupt IR never silently downgrades to L1.
    pub fn raw_source(&self, codec: &str) -> Result<Option<Vec<u8>>> {
        match self.attributes.get(&raw_source_key(codec)) {
            Some(Value::String(encoded)) if !encoded.is_empty() => {
                digest::decode_payload(encoded).map(Some)
            }
            Some(_) => Err(crate::Error::parse(
                "ir",
                format!("raw payload for '{}' is not a non-empty string", codec),
            )),
            None => Ok(None),
        }
    }

    /// Whether any codec retained a non-empty raw payload
    pub fn has_raw_source(&self) -> bool {
        self.attributes.iter().any(|(k, v)| {
            k.starts_with(RAW_SOURCE_PREFIX) && v.as_str().is_some_and(|s| !s.is_empty())
        })
    }

    /// Codec names holding raw payloads
    pub fn raw_source_codecs(&self) -> Vec<&str> {
        self.attributes
            .keys()
            .filter_map(|k| k.strip_prefix(RAW_SOURCE_PREFIX))
            .collect()
    }

    /// L0 claims and raw payload presence agree
    pub fn loss_class_consistent(&self) -> bool {
        (self.loss_class == LossClass::L0) == self.has_raw_source()
    }

    pub fn document(&self, id: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.id == id)
    }

    /// All blocks in global reading order (document order, then sequence)
    pub fn blocks(&self) -> impl Iterator<Item = (&Document, &ContentBlock)> {
        self.documents
            .iter()
            .flat_map(|d| d.content_blocks.iter().map(move |b| (d, b)))
    }

    /// Every verse reference, in reading order
    pub fn verse_refs(&self) -> Vec<&Ref> {
        self.blocks().filter_map(|(_, b)| b.verse_ref()).collect()
    }

    pub fn block_count(&self) -> usize {
        self.documents.iter().map(|d| d.content_blocks.len()).sum()
    }

    /// Structural equality that ignores `source_hash`
    pub fn eq_ignoring_source_hash(&self, other: &Corpus) -> bool {
        let mut left = self.clone();
        left.source_hash.clear();
        let mut right = other.clone();
        right.source_hash.clear();
        left == right
    }
}

/// Attribute key for `codec`'s retained source
pub fn raw_source_key(codec: &str) -> String {
    format!("{}{}", RAW_SOURCE_PREFIX, codec)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_corpus() -> Corpus {
        Corpus::new("KJV", "osis")
            .with_title("King James Version")
            .with_language("en")
            .with_documents(vec![
                Document::new("Exod", 2).with_block(ContentBlock::verse(
                    "Exod.1.1",
                    1,
                    "Now these are the names",
                    Ref::verse("Exod", 1, 1),
                )),
                Document::new("Gen", 1).with_blocks(vec![
                    ContentBlock::verse("Gen.1.1", 1, "In the beginning", Ref::verse("Gen", 1, 1)),
                    ContentBlock::verse("Gen.1.2", 2, "And the earth", Ref::verse("Gen", 1, 2)),
                ]),
            ])
    }

    #[test]
    fn test_documents_sorted_by_order() {
        let corpus = sample_corpus();
        let ids: Vec<_> = corpus.documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["Gen", "Exod"]);
        let refs: Vec<_> = corpus.verse_refs().iter().map(|r| r.to_string()).collect();
        assert_eq!(refs, vec!["Gen.1.1", "Gen.1.2", "Exod.1.1"]);
        assert_eq!(corpus.block_count(), 3);
    }

    #[test]
    fn test_raw_source_sets_l0() {
        let corpus = sample_corpus();
        assert_eq!(corpus.loss_class, LossClass::L1);
        assert!(corpus.loss_class_consistent());

        let retained = corpus.with_raw_source("osis", b"<osis/>");
        assert_eq!(retained.loss_class, LossClass::L0);
        assert!(retained.has_raw_source());
        assert!(retained.loss_class_consistent());
        assert_eq!(retained.raw_source("osis").unwrap().unwrap(), b"<osis/>");
        assert_eq!(retained.raw_source("vpl").unwrap(), None);
        assert_eq!(retained.raw_source_codecs(), vec!["osis"]);
    }

    #[test]
    fn test_l0_without_payload_is_inconsistent() {
        let corpus = sample_corpus().with_loss_class(LossClass::L0);
        assert!(!corpus.loss_class_consistent());
    }

    #[test]
    fn test_corrupt_payload_is_an_error() {
        let corpus = sample_corpus().with_attribute(raw_source_key("osis"), 7i64);
        assert!(corpus.raw_source("osis").is_err());
    }

    #[test]
    fn test_eq_ignoring_source_hash() {
        let a = sample_corpus().with_source_bytes(b"one");
        let b = sample_corpus().with_source_bytes(b"two");
        assert_ne!(a, b);
        assert!(a.eq_ignoring_source_hash(&b));
    }

    #[test]
    fn test_module_kind_serialization() {
        assert_eq!(serde_json::to_string(&ModuleKind::TextCollection).unwrap(), "\"text-collection\"");
        assert_eq!("lexicon".parse::<ModuleKind>().unwrap(), ModuleKind::Dictionary);
    }
}
