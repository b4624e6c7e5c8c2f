//! Content blocks and stand-off markup
//!
//! A [`ContentBlock`] owns its text and a local arena of [`Anchor`]s.
//! Each anchor is a zero-width position; [`Span`]s start at one anchor and may
//! end at another, referring to both by identifier only. Overlapping ranges
//! (verse boundaries, variant readings, poetry lines) therefore never need to
//! nest.

use crate::digest;
use crate::reference::Ref;
use crate::value::{Attributes, Value};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Type tag of a span.
///
/// Known kinds serialize as upper-case tags; anything else a codec needs is
/// carried verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SpanKind {
    /// Verse boundary carrying the verse reference
    Verse,
    /// Chapter boundary
    Chapter,
    /// Section heading or division
    Section,
    /// Paragraph break
    Paragraph,
    /// Poetry line
    Poetry,
    /// Footnote / study note (zero-width, text in attributes)
    Note,
    /// Critical-apparatus variant reading
    Variant,
    /// Dictionary entry headword
    Entry,
    /// Codec-specific markup
    Other(String),
}

impl SpanKind {
    pub fn as_str(&self) -> &str {
        match self {
            SpanKind::Verse => "VERSE",
            SpanKind::Chapter => "CHAPTER",
            SpanKind::Section => "SECTION",
            SpanKind::Paragraph => "PARAGRAPH",
            SpanKind::Poetry => "POETRY",
            SpanKind::Note => "NOTE",
            SpanKind::Variant => "VARIANT",
            SpanKind::Entry => "ENTRY",
            SpanKind::Other(tag) => tag,
        }
    }

    /// Normalize a tag; unknown tags become `Other`
    pub fn from_tag(tag: &str) -> Self {
        match tag.to_ascii_uppercase().as_str() {
            "VERSE" => SpanKind::Verse,
            "CHAPTER" => SpanKind::Chapter,
            "SECTION" => SpanKind::Section,
            "PARAGRAPH" => SpanKind::Paragraph,
            "POETRY" => SpanKind::Poetry,
            "NOTE" => SpanKind::Note,
            "VARIANT" => SpanKind::Variant,
            "ENTRY" => SpanKind::Entry,
            _ => SpanKind::Other(tag.to_string()),
        }
    }
}

impl FromStr for SpanKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_tag(s))
    }
}

impl std::fmt::Display for SpanKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for SpanKind {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SpanKind {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(SpanKind::from_tag(&s))
    }
}

/// Markup beginning at one anchor and optionally ending at another.
///
/// `end_anchor_id == None` means the span runs to the end of its block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: SpanKind,
    pub start_anchor_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_anchor_id: Option<String>,
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<Ref>,
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
}

impl Span {
    pub fn new(id: impl Into<String>, kind: SpanKind, start_anchor_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            start_anchor_id: start_anchor_id.into(),
            end_anchor_id: None,
            reference: None,
            attributes: Attributes::new(),
        }
    }

    /// Close the span at another anchor
    pub fn ending_at(mut self, end_anchor_id: impl Into<String>) -> Self {
        self.end_anchor_id = Some(end_anchor_id.into());
        self
    }

    pub fn with_ref(mut self, reference: Ref) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// String attribute lookup
    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }
}

/// Zero-width position inside a block's text.
///
/// `position` is a character offset into the owning block's text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub id: String,
    pub position: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub spans: Vec<Span>,
}

impl Anchor {
    pub fn new(id: impl Into<String>, position: u32) -> Self {
        Self {
            id: id.into(),
            position,
            spans: Vec::new(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.spans.push(span);
        self
    }
}

/// Unit of prose content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    pub id: String,
    /// Reading order within the owning document (strictly increasing)
    pub sequence: u32,
    pub text: String,
    /// Content hash of `text`
    pub hash: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub anchors: Vec<Anchor>,
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
}

impl ContentBlock {
    /// Create a block; the hash is computed from `text`
    pub fn new(id: impl Into<String>, sequence: u32, text: impl Into<String>) -> Self {
        let text = text.into();
        let hash = digest::text_hash(&text);
        Self {
            id: id.into(),
            sequence,
            text,
            hash,
            anchors: Vec::new(),
            attributes: Attributes::new(),
        }
    }

    /// The common shape of one verse: one anchor at 0 holding one VERSE span
    pub fn verse(id: impl Into<String>, sequence: u32, text: impl Into<String>, reference: Ref) -> Self {
        let anchor = Anchor::new("a0", 0).with_span(Span::new("s0", SpanKind::Verse, "a0").with_ref(reference));
        Self::new(id, sequence, text).with_anchor(anchor)
    }

    pub fn with_anchor(mut self, anchor: Anchor) -> Self {
        self.anchors.push(anchor);
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Look up an anchor in this block's arena
    pub fn anchor(&self, id: &str) -> Option<&Anchor> {
        self.anchors.iter().find(|a| a.id == id)
    }

    /// All spans, in anchor order
    pub fn spans(&self) -> impl Iterator<Item = &Span> {
        self.anchors.iter().flat_map(|a| a.spans.iter())
    }

    /// Spans of one kind
    pub fn spans_of(&self, kind: SpanKind) -> impl Iterator<Item = &Span> {
        self.spans().filter(move |s| s.kind == kind)
    }

    /// Reference of the first VERSE span, if any
    pub fn verse_ref(&self) -> Option<&Ref> {
        self.spans_of(SpanKind::Verse).find_map(|s| s.reference.as_ref())
    }

    /// Character length of the text
    pub fn char_len(&self) -> u32 {
        self.text.chars().count() as u32
    }

    /// Resolve a span to its (start, end) character positions.
    ///
    /// Open spans end at the end of the block. Returns `None` when an anchor
    /// id does not resolve inside this block.
    pub fn span_range(&self, span: &Span) -> Option<(u32, u32)> {
        let start = self.anchor(&span.start_anchor_id)?.position;
        let end = match &span.end_anchor_id {
            Some(id) => self.anchor(id)?.position,
            None => self.char_len(),
        };
        Some((start, end))
    }

    /// Text covered by a span
    pub fn span_text(&self, span: &Span) -> Option<String> {
        let (start, end) = self.span_range(span)?;
        Some(
            self.text
                .chars()
                .skip(start as usize)
                .take(end.saturating_sub(start) as usize)
                .collect(),
        )
    }

    /// Whether the stored hash matches the text
    pub fn hash_matches(&self) -> bool {
        self.hash == digest::text_hash(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_kind_roundtrip() {
        for tag in ["VERSE", "NOTE", "POETRY", "VARIANT", "ENTRY", "rdg"] {
            assert_eq!(SpanKind::from_tag(tag).as_str(), tag);
        }
        assert_eq!(SpanKind::from_tag("variant"), SpanKind::Variant);
        assert_eq!(SpanKind::from_tag("milestone"), SpanKind::Other("milestone".to_string()));
    }

    #[test]
    fn test_verse_block_shape() {
        let block = ContentBlock::verse("Gen.1.1", 1, "In the beginning", Ref::verse("Gen", 1, 1));
        assert_eq!(block.anchors.len(), 1);
        assert_eq!(block.anchors[0].spans.len(), 1);
        assert_eq!(block.verse_ref().unwrap().to_string(), "Gen.1.1");
        assert!(block.hash_matches());
    }

    #[test]
    fn test_overlapping_spans_resolve_by_id() {
        // "abcdef": poetry over [0,4), variant over [2,6) - they cross.
        let block = ContentBlock::new("b1", 1, "abcdef")
            .with_anchor(Anchor::new("a0", 0).with_span(Span::new("p", SpanKind::Poetry, "a0").ending_at("a4")))
            .with_anchor(Anchor::new("a2", 2).with_span(
                Span::new("v", SpanKind::Variant, "a2").with_attribute("reading", "CDEF"),
            ))
            .with_anchor(Anchor::new("a4", 4));

        let poetry = block.spans_of(SpanKind::Poetry).next().unwrap();
        let variant = block.spans_of(SpanKind::Variant).next().unwrap();
        assert_eq!(block.span_text(poetry).unwrap(), "abcd");
        assert_eq!(block.span_text(variant).unwrap(), "cdef");
        assert_eq!(variant.attribute_str("reading"), Some("CDEF"));
    }

    #[test]
    fn test_dangling_anchor_does_not_resolve() {
        let block = ContentBlock::new("b1", 1, "text")
            .with_anchor(Anchor::new("a0", 0).with_span(Span::new("s", SpanKind::Poetry, "a0").ending_at("missing")));
        let span = block.spans().next().unwrap();
        assert!(block.span_range(span).is_none());
    }

    #[test]
    fn test_span_serialization_names() {
        let span = Span::new("s0", SpanKind::Verse, "a0").with_ref(Ref::verse("Gen", 1, 1));
        let json = serde_json::to_value(&span).unwrap();
        assert_eq!(json["type"], "VERSE");
        assert_eq!(json["start_anchor_id"], "a0");
        assert_eq!(json["ref"]["canonical"], "Gen.1.1");
        assert!(json.get("end_anchor_id").is_none());
    }
}
