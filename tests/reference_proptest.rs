//! Property-based tests for reference canonicalization and verse text survival

use palimpsest::codec::{contract, VplCodec};
use palimpsest::{ExtractOptions, LossClass, Ref};
use proptest::prelude::*;

fn book_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[A-Z][a-z]{1,5}",
        "[1-4][A-Z][a-z]{1,4}",
    ]
}

/// Structurally valid references, including chapter 0, sub-verses and ranges
fn reference_strategy() -> impl Strategy<Value = Ref> {
    (
        book_strategy(),
        0u32..200,
        0u32..180,
        prop::option::of(prop::char::range('a', 'e')),
        prop::option::of(0u32..20),
    )
        .prop_map(|(book, chapter, verse, sub, extra)| {
            let mut reference = match (chapter, verse) {
                (0, 0) => Ref::book(book),
                (_, 0) => Ref::chapter(book, chapter),
                _ => Ref::verse(book, chapter, verse),
            };
            if verse > 0 {
                if let Some(sub) = sub {
                    reference = reference.with_sub_verse(sub);
                }
                if let Some(extra) = extra {
                    reference = reference.with_range(verse + extra);
                }
            }
            reference
        })
}

/// Raw reference strings, zeros and all, valid or not
fn raw_reference_strategy() -> impl Strategy<Value = String> {
    (
        book_strategy(),
        prop::option::of(0u32..5),
        prop::option::of(0u32..5),
        prop::option::of(prop::char::range('a', 'c')),
        prop::option::of(0u32..8),
    )
        .prop_map(|(book, chapter, verse, sub, end)| {
            let mut raw = book;
            if let Some(chapter) = chapter {
                raw.push_str(&format!(".{}", chapter));
                if let Some(verse) = verse {
                    raw.push_str(&format!(".{}", verse));
                    if let Some(sub) = sub {
                        raw.push(sub);
                    }
                    if let Some(end) = end {
                        raw.push_str(&format!("-{}", end));
                    }
                }
            }
            raw
        })
}

fn verse_text_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z ,.;:'!?]{0,60}"
}

proptest! {
    #[test]
    fn canonical_string_parses_back(reference in reference_strategy()) {
        let canonical = reference.to_canonical_string();
        let parsed = Ref::parse(&canonical).unwrap();
        prop_assert_eq!(&parsed, &reference, "canonical form was {}", canonical);
        prop_assert_eq!(parsed.to_canonical_string(), canonical);
    }

    #[test]
    fn formatting_a_parsed_ref_is_stable(raw in raw_reference_strategy()) {
        if let Ok(parsed) = Ref::parse(&raw) {
            let reparsed = Ref::parse(&parsed.to_canonical_string());
            prop_assert_eq!(reparsed.ok(), Some(parsed), "input was {}", raw);
        }
    }

    #[test]
    fn parsing_is_whitespace_insensitive(reference in reference_strategy()) {
        let padded = format!("  {}\t", reference.to_canonical_string());
        prop_assert_eq!(Ref::parse(&padded).unwrap(), reference);
    }

    #[test]
    fn range_contains_its_endpoints(reference in reference_strategy()) {
        prop_assert!(reference.contains(&reference));
        prop_assert!(reference.book_ref().contains(&reference));
        prop_assert!(reference.last_verse() >= reference.verse);
    }

    #[test]
    fn verse_text_survives_plain_text_round_trip(texts in prop::collection::vec(verse_text_strategy(), 1..8)) {
        let mut source = String::from("# id: PROP\n");
        for (index, text) in texts.iter().enumerate() {
            source.push_str(&format!("Gen.1.{} {}\n", index + 1, text));
        }

        let codec = VplCodec::new();
        let options = ExtractOptions::default();
        let first = contract::extract(&codec, source.as_bytes(), &options).unwrap();
        let emission = contract::emit(&codec, &first.corpus).unwrap();
        prop_assert_eq!(emission.loss_class, LossClass::L1);

        let second = contract::extract(&codec, &emission.bytes, &options).unwrap();
        prop_assert!(first.corpus.eq_ignoring_source_hash(&second.corpus));
        let extracted: Vec<&str> = second.corpus.documents[0]
            .content_blocks
            .iter()
            .map(|b| b.text.as_str())
            .collect();
        let expected: Vec<&str> = texts.iter().map(String::as_str).collect();
        prop_assert_eq!(extracted, expected);
    }
}
