//! Structural invariants of a corpus
//!
//! Checked by the conversion contract on everything a codec produces or
//! consumes. Ordering and hash violations are codec bugs; they are reported
//! here as data so callers decide how loudly to fail.

use super::corpus::Corpus;
use std::collections::HashSet;
use std::fmt;

/// One broken invariant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    DuplicateOrder { order: u32, document: String },
    DocumentsOutOfOrder { before: String, after: String },
    SequenceNotIncreasing { document: String, block: String, sequence: u32, previous: u32 },
    HashMismatch { document: String, block: String },
    DuplicateAnchor { block: String, anchor: String },
    AnchorBeyondText { block: String, anchor: String, position: u32, len: u32 },
    DanglingEndAnchor { block: String, span: String, anchor: String },
    SpanOutsideStartAnchor { block: String, span: String },
    L0WithoutPayload,
    PayloadWithoutL0,
}

impl Violation {
    /// Fidelity-contract violations, as opposed to structural ones
    pub fn is_fidelity(&self) -> bool {
        matches!(self, Violation::L0WithoutPayload | Violation::PayloadWithoutL0)
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::DuplicateOrder { order, document } => {
                write!(f, "document '{}' reuses order key {}", document, order)
            }
            Violation::DocumentsOutOfOrder { before, after } => {
                write!(f, "document '{}' precedes '{}' but has a higher order key", before, after)
            }
            Violation::SequenceNotIncreasing { document, block, sequence, previous } => write!(
                f,
                "block '{}' in '{}' has sequence {} after {}",
                block, document, sequence, previous
            ),
            Violation::HashMismatch { document, block } => {
                write!(f, "block '{}' in '{}' has a hash that does not match its text", block, document)
            }
            Violation::DuplicateAnchor { block, anchor } => {
                write!(f, "block '{}' defines anchor '{}' twice", block, anchor)
            }
            Violation::AnchorBeyondText { block, anchor, position, len } => write!(
                f,
                "anchor '{}' in block '{}' sits at {} past text length {}",
                anchor, block, position, len
            ),
            Violation::DanglingEndAnchor { block, span, anchor } => {
                write!(f, "span '{}' in block '{}' ends at unknown anchor '{}'", span, block, anchor)
            }
            Violation::SpanOutsideStartAnchor { block, span } => write!(
                f,
                "span '{}' in block '{}' is stored under an anchor other than its start",
                span, block
            ),
            Violation::L0WithoutPayload => write!(f, "corpus claims L0 without a retained raw payload"),
            Violation::PayloadWithoutL0 => write!(f, "corpus retains a raw payload but is not classified L0"),
        }
    }
}

/// Check every invariant; an empty result means the corpus is well-formed
pub fn validate(corpus: &Corpus) -> Vec<Violation> {
    let mut violations = Vec::new();

    if !corpus.loss_class_consistent() {
        violations.push(if corpus.has_raw_source() {
            Violation::PayloadWithoutL0
        } else {
            Violation::L0WithoutPayload
        });
    }

    let mut orders = HashSet::new();
    for (idx, document) in corpus.documents.iter().enumerate() {
        if !orders.insert(document.order) {
            violations.push(Violation::DuplicateOrder {
                order: document.order,
                document: document.id.clone(),
            });
        }
        if let Some(prev) = idx.checked_sub(1).map(|i| &corpus.documents[i]) {
            if prev.order > document.order {
                violations.push(Violation::DocumentsOutOfOrder {
                    before: prev.id.clone(),
                    after: document.id.clone(),
                });
            }
        }

        let mut previous: Option<u32> = None;
        for block in &document.content_blocks {
            if let Some(prev) = previous {
                if block.sequence <= prev {
                    violations.push(Violation::SequenceNotIncreasing {
                        document: document.id.clone(),
                        block: block.id.clone(),
                        sequence: block.sequence,
                        previous: prev,
                    });
                }
            }
            previous = Some(block.sequence);

            if !block.hash_matches() {
                violations.push(Violation::HashMismatch {
                    document: document.id.clone(),
                    block: block.id.clone(),
                });
            }

            let len = block.char_len();
            let mut anchor_ids = HashSet::new();
            for anchor in &block.anchors {
                if !anchor_ids.insert(anchor.id.as_str()) {
                    violations.push(Violation::DuplicateAnchor {
                        block: block.id.clone(),
                        anchor: anchor.id.clone(),
                    });
                }
                if anchor.position > len {
                    violations.push(Violation::AnchorBeyondText {
                        block: block.id.clone(),
                        anchor: anchor.id.clone(),
                        position: anchor.position,
                        len,
                    });
                }
            }

            for anchor in &block.anchors {
                for span in &anchor.spans {
                    if span.start_anchor_id != anchor.id {
                        violations.push(Violation::SpanOutsideStartAnchor {
                            block: block.id.clone(),
                            span: span.id.clone(),
                        });
                    }
                    if let Some(end) = &span.end_anchor_id {
                        if !anchor_ids.contains(end.as_str()) {
                            violations.push(Violation::DanglingEndAnchor {
                                block: block.id.clone(),
                                span: span.id.clone(),
                                anchor: end.clone(),
                            });
                        }
                    }
                }
            }
        }
    }

    violations
}
