//! Reference canonicalizer - structured locations to/from canonical strings
//!
//! Format: `<book>[.<chapter>[.<verse>[<sub>][-<verse_end>]]]`
//!
//! Examples:
//! - `Gen` (whole book: chapter 0, verse 0)
//! - `Gen.1` (whole chapter: verse 0)
//! - `John.3.16-18` (verse range)
//! - `Ps.23.1a` (sub-verse part)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical structured location.
///
/// Zero in `chapter` / `verse` / `verse_end` means "not present", so partial
/// references survive a round trip without gaining `.0` suffixes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RefRecord", into = "RefRecord")]
pub struct Ref {
    /// Short alphanumeric book code ("Gen", "1Cor")
    pub book: String,
    /// Chapter number, 0 when absent
    pub chapter: u32,
    /// Verse number, 0 when absent
    pub verse: u32,
    /// Last verse of a range, 0 when not a range
    pub verse_end: u32,
    /// Optional sub-verse letter ("a" in `Ps.23.1a`)
    pub sub_verse: Option<char>,
}

impl Ref {
    /// Whole-book reference
    pub fn book(book: impl Into<String>) -> Self {
        Self {
            book: book.into(),
            chapter: 0,
            verse: 0,
            verse_end: 0,
            sub_verse: None,
        }
    }

    /// Whole-chapter reference
    pub fn chapter(book: impl Into<String>, chapter: u32) -> Self {
        Self {
            chapter,
            ..Self::book(book)
        }
    }

    /// Single-verse reference
    pub fn verse(book: impl Into<String>, chapter: u32, verse: u32) -> Self {
        Self {
            chapter,
            verse,
            ..Self::book(book)
        }
    }

    /// Turn this reference into a range ending at `verse_end`
    pub fn with_range(mut self, verse_end: u32) -> Self {
        self.verse_end = verse_end;
        self
    }

    /// Attach a sub-verse letter
    pub fn with_sub_verse(mut self, sub: char) -> Self {
        self.sub_verse = Some(sub);
        self
    }

    /// Parse a reference string
    ///
    /// Missing components are not errors: `Gen` yields chapter 0 and verse 0.
    pub fn parse(raw_id: &str) -> Result<Self> {
        let raw = raw_id.trim();
        if raw.is_empty() {
            return Err(Error::InvalidRef("reference is empty".to_string()));
        }

        let mut parts = raw.split('.');
        let book = parts.next().unwrap_or_default();
        if book.is_empty() || !book.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::InvalidRef(format!("invalid book code in '{}'", raw)));
        }

        let mut reference = Self::book(book);

        if let Some(chapter) = parts.next() {
            reference.chapter = parse_number(chapter, "chapter", raw)?;
        }

        if let Some(verse_part) = parts.next() {
            let (start, end) = match verse_part.split_once('-') {
                Some((start, end)) => (start, Some(end)),
                None => (verse_part, None),
            };

            let (digits, sub) = match start.char_indices().last() {
                Some((idx, c)) if c.is_ascii_lowercase() => (&start[..idx], Some(c)),
                _ => (start, None),
            };
            reference.verse = parse_number(digits, "verse", raw)?;
            reference.sub_verse = sub;

            if let Some(end) = end {
                reference.verse_end = parse_number(end, "verse end", raw)?;
                if reference.verse_end < reference.verse {
                    return Err(Error::InvalidRef(format!(
                        "range end precedes start in '{}'",
                        raw
                    )));
                }
            }
        }

        if parts.next().is_some() {
            return Err(Error::InvalidRef(format!("too many components in '{}'", raw)));
        }

        if reference.verse == 0 && (reference.verse_end != 0 || reference.sub_verse.is_some()) {
            return Err(Error::InvalidRef(format!(
                "range end or sub-verse on a reference without a verse in '{}'",
                raw
            )));
        }

        Ok(reference)
    }

    /// Convert to the minimal canonical string
    pub fn to_canonical_string(&self) -> String {
        let mut out = self.book.clone();
        if self.chapter == 0 && self.verse == 0 {
            return out;
        }
        out.push('.');
        out.push_str(&self.chapter.to_string());
        if self.verse == 0 {
            return out;
        }
        out.push('.');
        out.push_str(&self.verse.to_string());
        if let Some(sub) = self.sub_verse {
            out.push(sub);
        }
        if self.verse_end != 0 {
            out.push('-');
            out.push_str(&self.verse_end.to_string());
        }
        out
    }

    /// Whether this reference spans more than one verse
    pub fn is_range(&self) -> bool {
        self.verse_end != 0
    }

    /// The enclosing whole-chapter reference
    pub fn chapter_ref(&self) -> Ref {
        Ref::chapter(self.book.clone(), self.chapter)
    }

    /// The enclosing whole-book reference
    pub fn book_ref(&self) -> Ref {
        Ref::book(self.book.clone())
    }

    /// Last verse covered by this reference
    pub fn last_verse(&self) -> u32 {
        if self.is_range() { self.verse_end } else { self.verse }
    }

    /// Whether `other` lies inside the location this reference names
    pub fn contains(&self, other: &Ref) -> bool {
        if self.book != other.book {
            return false;
        }
        if self.chapter == 0 {
            return true;
        }
        if self.chapter != other.chapter {
            return false;
        }
        if self.verse == 0 {
            return true;
        }
        other.verse >= self.verse && other.last_verse() <= self.last_verse()
    }
}

fn parse_number(part: &str, what: &str, raw: &str) -> Result<u32> {
    if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::InvalidRef(format!("invalid {} '{}' in '{}'", what, part, raw)));
    }
    part.parse()
        .map_err(|_| Error::InvalidRef(format!("{} out of range in '{}'", what, raw)))
}

impl fmt::Display for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

impl FromStr for Ref {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Persisted shape of a [`Ref`]; `canonical` is derived and checked on load.
#[derive(Serialize, Deserialize)]
struct RefRecord {
    book: String,
    chapter: u32,
    verse: u32,
    verse_end: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sub_verse: Option<char>,
    canonical: String,
}

impl From<Ref> for RefRecord {
    fn from(r: Ref) -> Self {
        let canonical = r.to_canonical_string();
        Self {
            book: r.book,
            chapter: r.chapter,
            verse: r.verse,
            verse_end: r.verse_end,
            sub_verse: r.sub_verse,
            canonical,
        }
    }
}

impl TryFrom<RefRecord> for Ref {
    type Error = Error;

    fn try_from(record: RefRecord) -> Result<Self> {
        let reference = Ref {
            book: record.book,
            chapter: record.chapter,
            verse: record.verse,
            verse_end: record.verse_end,
            sub_verse: record.sub_verse,
        };
        if Ref::parse(&record.canonical)? != reference {
            return Err(Error::InvalidRef(format!(
                "canonical form '{}' disagrees with its fields",
                record.canonical
            )));
        }
        Ok(reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ref_roundtrip() {
        for s in ["Gen", "Gen.1", "Gen.1.1", "John.3.16-18", "1Cor.13.4", "Ps.23.1a", "Ps.23.1a-3"] {
            let parsed = Ref::parse(s).unwrap();
            assert_eq!(parsed.to_canonical_string(), s);
        }
    }

    #[test]
    fn test_verse_range() {
        let r = Ref::parse("John.3.16-18").unwrap();
        assert_eq!(r.book, "John");
        assert_eq!(r.chapter, 3);
        assert_eq!(r.verse, 16);
        assert_eq!(r.verse_end, 18);
        assert!(r.is_range());
        assert_eq!(r.to_string(), "John.3.16-18");
    }

    #[test]
    fn test_partial_refs() {
        let book = Ref::parse("Gen").unwrap();
        assert_eq!((book.chapter, book.verse, book.verse_end), (0, 0, 0));

        let chapter = Ref::parse("Gen.5").unwrap();
        assert_eq!((chapter.chapter, chapter.verse), (5, 0));
        assert_eq!(chapter, Ref::chapter("Gen", 5));
    }

    #[test]
    fn test_non_minimal_input_normalizes() {
        let r = Ref::parse("Gen.1.0").unwrap();
        assert_eq!(r.to_string(), "Gen.1");
        assert_eq!(Ref::parse(&r.to_string()).unwrap(), r);
    }

    #[test]
    fn test_invalid_refs() {
        assert!(Ref::parse("").is_err());
        assert!(Ref::parse(".1.1").is_err());
        assert!(Ref::parse("Gen.x").is_err());
        assert!(Ref::parse("Gen.1.1.1").is_err());
        assert!(Ref::parse("Gen.1.5-3").is_err());
        assert!(Ref::parse("Gen 1:1").is_err());
        assert!(Ref::parse("Gen.1.-3").is_err());
    }

    #[test]
    fn test_verseless_refs_reject_ranges_and_parts() {
        for s in ["Gen.1.0-3", "Gen.0.0-2", "Gen.0.0a", "Gen.1.0a-2"] {
            assert!(matches!(Ref::parse(s), Err(Error::InvalidRef(_))), "{} parsed", s);
        }
        let chapterless = Ref::parse("Gen.0.5").unwrap();
        assert_eq!(Ref::parse(&chapterless.to_string()).unwrap(), chapterless);
    }

    #[test]
    fn test_contains() {
        let chapter = Ref::chapter("John", 3);
        let range = Ref::parse("John.3.16-18").unwrap();
        assert!(chapter.contains(&Ref::verse("John", 3, 16)));
        assert!(range.contains(&Ref::verse("John", 3, 17)));
        assert!(!range.contains(&Ref::verse("John", 3, 19)));
        assert!(Ref::book("John").contains(&range));
        assert!(!chapter.contains(&Ref::verse("Gen", 3, 16)));
    }

    #[test]
    fn test_serde_carries_canonical_form() {
        let r = Ref::parse("John.3.16-18").unwrap();
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["canonical"], "John.3.16-18");
        assert_eq!(json["verse_end"], 18);

        let back: Ref = serde_json::from_value(json).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn test_serde_rejects_inconsistent_canonical() {
        let json = serde_json::json!({
            "book": "Gen", "chapter": 1, "verse": 2, "verse_end": 0, "canonical": "Gen.1.1"
        });
        assert!(serde_json::from_value::<Ref>(json).is_err());
    }
}
