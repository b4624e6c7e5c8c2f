//! Legacy book numbering
//!
//! Numeric-indexed formats (SQLite Bible modules, older binary containers)
//! address books by ordinal 1..=66. The table is static configuration data;
//! the reverse lookup is built once on first use.

use std::collections::HashMap;
use std::sync::OnceLock;

/// Order keys for books outside the table start here
pub const EXTRA_BOOK_ORDER: u32 = 1000;

/// Canonical book codes and display names in legacy ordinal order (index + 1).
const BOOKS: &[(&str, &str)] = &[
    ("Gen", "Genesis"),
    ("Exod", "Exodus"),
    ("Lev", "Leviticus"),
    ("Num", "Numbers"),
    ("Deut", "Deuteronomy"),
    ("Josh", "Joshua"),
    ("Judg", "Judges"),
    ("Ruth", "Ruth"),
    ("1Sam", "1 Samuel"),
    ("2Sam", "2 Samuel"),
    ("1Kgs", "1 Kings"),
    ("2Kgs", "2 Kings"),
    ("1Chr", "1 Chronicles"),
    ("2Chr", "2 Chronicles"),
    ("Ezra", "Ezra"),
    ("Neh", "Nehemiah"),
    ("Esth", "Esther"),
    ("Job", "Job"),
    ("Ps", "Psalms"),
    ("Prov", "Proverbs"),
    ("Eccl", "Ecclesiastes"),
    ("Song", "Song of Solomon"),
    ("Isa", "Isaiah"),
    ("Jer", "Jeremiah"),
    ("Lam", "Lamentations"),
    ("Ezek", "Ezekiel"),
    ("Dan", "Daniel"),
    ("Hos", "Hosea"),
    ("Joel", "Joel"),
    ("Amos", "Amos"),
    ("Obad", "Obadiah"),
    ("Jonah", "Jonah"),
    ("Mic", "Micah"),
    ("Nah", "Nahum"),
    ("Hab", "Habakkuk"),
    ("Zeph", "Zephaniah"),
    ("Hag", "Haggai"),
    ("Zech", "Zechariah"),
    ("Mal", "Malachi"),
    ("Matt", "Matthew"),
    ("Mark", "Mark"),
    ("Luke", "Luke"),
    ("John", "John"),
    ("Acts", "Acts"),
    ("Rom", "Romans"),
    ("1Cor", "1 Corinthians"),
    ("2Cor", "2 Corinthians"),
    ("Gal", "Galatians"),
    ("Eph", "Ephesians"),
    ("Phil", "Philippians"),
    ("Col", "Colossians"),
    ("1Thess", "1 Thessalonians"),
    ("2Thess", "2 Thessalonians"),
    ("1Tim", "1 Timothy"),
    ("2Tim", "2 Timothy"),
    ("Titus", "Titus"),
    ("Phlm", "Philemon"),
    ("Heb", "Hebrews"),
    ("Jas", "James"),
    ("1Pet", "1 Peter"),
    ("2Pet", "2 Peter"),
    ("1John", "1 John"),
    ("2John", "2 John"),
    ("3John", "3 John"),
    ("Jude", "Jude"),
    ("Rev", "Revelation"),
];

static ORDINALS: OnceLock<HashMap<&'static str, u32>> = OnceLock::new();

fn ordinals() -> &'static HashMap<&'static str, u32> {
    ORDINALS.get_or_init(|| {
        BOOKS
            .iter()
            .enumerate()
            .map(|(idx, (code, _))| (*code, idx as u32 + 1))
            .collect()
    })
}

/// Canonical code for a legacy ordinal (1-based)
pub fn code_for_ordinal(ordinal: u32) -> Option<&'static str> {
    let idx = ordinal.checked_sub(1)? as usize;
    BOOKS.get(idx).map(|(code, _)| *code)
}

/// Legacy ordinal for a canonical code
pub fn ordinal_for_code(code: &str) -> Option<u32> {
    ordinals().get(code).copied()
}

/// Display name for a canonical code
pub fn long_name(code: &str) -> Option<&'static str> {
    let ordinal = ordinal_for_code(code)?;
    BOOKS.get(ordinal as usize - 1).map(|(_, name)| *name)
}

/// Document order key for a book code.
///
/// Table books use their ordinal; others take the next free slot after
/// [`EXTRA_BOOK_ORDER`], counted by `extras_seen`.
pub fn order_for_code(code: &str, extras_seen: &mut u32) -> u32 {
    match ordinal_for_code(code) {
        Some(ordinal) => ordinal,
        None => {
            let order = EXTRA_BOOK_ORDER + *extras_seen;
            *extras_seen += 1;
            order
        }
    }
}

/// All (ordinal, code) pairs in canonical order
pub fn all() -> impl Iterator<Item = (u32, &'static str)> {
    BOOKS
        .iter()
        .enumerate()
        .map(|(idx, (code, _))| (idx as u32 + 1, *code))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_bidirectional() {
        for (ordinal, code) in all() {
            assert_eq!(code_for_ordinal(ordinal), Some(code));
            assert_eq!(ordinal_for_code(code), Some(ordinal));
        }
        assert_eq!(all().count(), 66);
    }

    #[test]
    fn test_known_ordinals() {
        assert_eq!(code_for_ordinal(1), Some("Gen"));
        assert_eq!(code_for_ordinal(40), Some("Matt"));
        assert_eq!(code_for_ordinal(66), Some("Rev"));
        assert_eq!(ordinal_for_code("1Cor"), Some(46));
        assert_eq!(long_name("Song"), Some("Song of Solomon"));
    }

    #[test]
    fn test_out_of_table() {
        assert_eq!(code_for_ordinal(0), None);
        assert_eq!(code_for_ordinal(67), None);
        assert_eq!(ordinal_for_code("Tob"), None);
        assert_eq!(long_name("gen"), None);
    }

    #[test]
    fn test_extra_books_take_consecutive_slots() {
        let mut extras = 0;
        assert_eq!(order_for_code("Tob", &mut extras), 1000);
        assert_eq!(order_for_code("Gen", &mut extras), 1);
        assert_eq!(order_for_code("Sir", &mut extras), 1001);
        assert_eq!(extras, 2);
    }
}
