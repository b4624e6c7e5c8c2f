//! Parallel corpora - N corpora aligned by reference
//!
//! Alignments are built fresh from finished corpora; nothing here points back
//! into a [`Corpus`]. Units carry owned text keyed by corpus identifier.

use super::corpus::Corpus;
use crate::reference::Ref;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Granularity at which corpora are aligned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlignmentLevel {
    /// Whole documents (books)
    Document,
    /// Content blocks (verses)
    Block,
    /// Individual tokens inside aligned blocks
    Token,
}

/// One aligned location: a reference and each corpus's text for it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedUnit {
    #[serde(rename = "ref")]
    pub reference: Ref,
    /// Corpus id -> aligned text
    pub texts: BTreeMap<String, String>,
}

impl AlignedUnit {
    pub fn new(reference: Ref) -> Self {
        Self {
            reference,
            texts: BTreeMap::new(),
        }
    }

    pub fn with_text(mut self, corpus_id: impl Into<String>, text: impl Into<String>) -> Self {
        self.texts.insert(corpus_id.into(), text.into());
        self
    }

    pub fn text(&self, corpus_id: &str) -> Option<&str> {
        self.texts.get(corpus_id).map(String::as_str)
    }
}

/// Source-token to target-token correspondence inside one aligned unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenAlignment {
    #[serde(rename = "ref")]
    pub reference: Ref,
    pub source_corpus: String,
    pub target_corpus: String,
    /// Token indices in the source text
    pub source_tokens: Vec<usize>,
    /// Token indices in the target text
    pub target_tokens: Vec<usize>,
    /// 1.0 = certain, lower = probabilistic
    pub confidence: f32,
}

impl TokenAlignment {
    pub fn new(
        reference: Ref,
        source_corpus: impl Into<String>,
        target_corpus: impl Into<String>,
        source_tokens: Vec<usize>,
        target_tokens: Vec<usize>,
        confidence: f32,
    ) -> Self {
        Self {
            reference,
            source_corpus: source_corpus.into(),
            target_corpus: target_corpus.into(),
            source_tokens,
            target_tokens,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Check if this alignment is certain
    pub fn is_exact(&self) -> bool {
        (self.confidence - 1.0).abs() < f32::EPSILON
    }
}

/// Ordered aligned units at one granularity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alignment {
    pub id: String,
    pub level: AlignmentLevel,
    pub units: Vec<AlignedUnit>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub token_alignments: Vec<TokenAlignment>,
}

impl Alignment {
    /// Attach token-level correspondences; the alignment becomes token level.
    ///
    /// Correspondences whose reference has no aligned unit are discarded and
    /// returned so callers can report them.
    pub fn with_token_alignments(mut self, alignments: Vec<TokenAlignment>) -> (Self, Vec<TokenAlignment>) {
        let (kept, orphaned): (Vec<_>, Vec<_>) = alignments
            .into_iter()
            .partition(|t| self.unit(&t.reference).is_some());
        self.token_alignments = kept;
        self.level = AlignmentLevel::Token;
        (self, orphaned)
    }

    pub fn unit(&self, reference: &Ref) -> Option<&AlignedUnit> {
        self.units.iter().find(|u| &u.reference == reference)
    }

    /// Token correspondences recorded for one unit
    pub fn tokens_for<'a>(&'a self, reference: &'a Ref) -> impl Iterator<Item = &'a TokenAlignment> + 'a {
        self.token_alignments.iter().filter(move |t| &t.reference == reference)
    }
}

/// N corpora and their alignments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallelCorpus {
    pub id: String,
    pub corpus_ids: Vec<String>,
    pub alignments: Vec<Alignment>,
}

impl ParallelCorpus {
    /// Align corpora by reference.
    ///
    /// `Block` keys units by verse reference, `Document` by book; `Token`
    /// starts from a block alignment that token correspondences are added to.
    /// Units are ordered by first appearance, walking corpora in argument
    /// order. Blocks sharing one reference in a corpus are joined with a space.
    pub fn align(id: impl Into<String>, corpora: &[&Corpus], level: AlignmentLevel) -> Self {
        let id = id.into();
        let mut units: Vec<AlignedUnit> = Vec::new();
        let mut index: HashMap<Ref, usize> = HashMap::new();

        for corpus in corpora {
            for (document, block) in corpus.blocks() {
                let key = match level {
                    AlignmentLevel::Document => match block.verse_ref() {
                        Some(r) => r.book_ref(),
                        None => Ref::book(document.id.clone()),
                    },
                    AlignmentLevel::Block | AlignmentLevel::Token => match block.verse_ref() {
                        Some(r) => r.clone(),
                        None => continue,
                    },
                };

                let slot = *index.entry(key.clone()).or_insert_with(|| {
                    units.push(AlignedUnit::new(key));
                    units.len() - 1
                });
                let text = units[slot].texts.entry(corpus.id.clone()).or_default();
                if !text.is_empty() {
                    text.push(' ');
                }
                text.push_str(&block.text);
            }
        }

        tracing::debug!("Aligned {} corpora into {} units ({:?})", corpora.len(), units.len(), level);

        Self {
            alignments: vec![Alignment {
                id: format!("{}.{}", id, level_name(level)),
                level,
                units,
                token_alignments: Vec::new(),
            }],
            corpus_ids: corpora.iter().map(|c| c.id.clone()).collect(),
            id,
        }
    }

    /// Fraction of units (over all alignments) that carry text for `corpus_id`
    pub fn coverage(&self, corpus_id: &str) -> f32 {
        let total: usize = self.alignments.iter().map(|a| a.units.len()).sum();
        if total == 0 {
            return 0.0;
        }
        let covered = self
            .alignments
            .iter()
            .flat_map(|a| a.units.iter())
            .filter(|u| u.texts.contains_key(corpus_id))
            .count();
        covered as f32 / total as f32
    }

    /// References present in some corpus but missing from `corpus_id`
    pub fn gaps(&self, corpus_id: &str) -> Vec<&Ref> {
        self.alignments
            .iter()
            .flat_map(|a| a.units.iter())
            .filter(|u| !u.texts.contains_key(corpus_id))
            .map(|u| &u.reference)
            .collect()
    }
}

fn level_name(level: AlignmentLevel) -> &'static str {
    match level {
        AlignmentLevel::Document => "document",
        AlignmentLevel::Block => "block",
        AlignmentLevel::Token => "token",
    }
}
