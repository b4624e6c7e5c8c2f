//! Shared loss checks for codecs that write fresh output from the IR
//!
//! A regenerating emitter claims L1 only for what its own extractor will
//! rebuild. These helpers compare each IR element against the value a
//! re-extraction would produce and degrade the tracker where they differ.

use crate::books;
use crate::ir::{ContentBlock, Document, Span, SpanKind};
use crate::loss::{LossClass, LossTracker};
use crate::reference::Ref;

/// Document-level fields an extractor derives from the book code
pub(crate) fn track_document(tracker: &mut LossTracker, document: &Document, expected_order: u32) {
    if document.order != expected_order {
        tracker.degrade(LossClass::L2, "document:order");
    }
    if document.title.as_deref() != books::long_name(&document.id) {
        tracker.degrade(LossClass::L2, "document:title");
    }
    if !document.attributes.is_empty() {
        tracker.degrade(LossClass::L2, "document:attributes");
    }
}

/// Block identity: extractors number blocks from 1 and name them by reference
pub(crate) fn track_block(tracker: &mut LossTracker, block: &ContentBlock, index: usize, reference: &Ref) {
    if block.sequence as usize != index + 1 {
        tracker.degrade(LossClass::L2, "block:sequence");
    }
    if block.id != reference.to_canonical_string() {
        tracker.degrade(LossClass::L2, "block:id");
    }
    if !block.attributes.is_empty() {
        tracker.degrade(LossClass::L2, "block:attributes");
    }
}

/// Verse spans beyond the first, and any attributes they carry
pub(crate) fn track_verse_spans(tracker: &mut LossTracker, block: &ContentBlock) {
    for (index, span) in block.spans_of(SpanKind::Verse).enumerate() {
        if index > 0 {
            tracker.degrade(LossClass::L2, "span:VERSE (secondary)");
        }
        track_span_attributes(tracker, span, &[]);
    }
}

/// Span attributes outside `kept`; kept keys must hold strings
pub(crate) fn track_span_attributes(tracker: &mut LossTracker, span: &Span, kept: &[&str]) {
    let dropped = span
        .attributes
        .iter()
        .any(|(key, value)| !kept.contains(&key.as_str()) || value.as_str().is_none());
    if dropped {
        tracker.degrade(LossClass::L2, format!("span:{}:attributes", span.kind));
    }
}
