//! Conversion contract enforcement
//!
//! Every conversion goes through [`extract`] and [`emit`] rather than calling a
//! codec directly. The wrappers refuse unconvertible formats, stamp the source
//! hash, check ordering invariants, and assert the fidelity rules:
//! an L0 corpus must carry its raw payload, and an L0 emission must replay it
//! byte for byte. Breaking either is a codec bug and panics.

use super::framework::{Codec, Emission, ExtractOptions, Extraction};
use crate::digest;
use crate::ir::{validate, Corpus, Violation};
use crate::loss::LossClass;
use crate::{Error, Result};
use serde::Serialize;
use tracing::{debug, info};

/// Parse native bytes into a contract-checked IR
pub fn extract(codec: &dyn Codec, source: &[u8], options: &ExtractOptions) -> Result<Extraction> {
    refuse_unsupported(codec, "extract")?;
    debug!("Extracting {} bytes as {}", source.len(), codec.format_name());

    let mut extraction = codec.extract(source, options)?;
    let hash = digest::content_hash(source);
    if extraction.corpus.source_hash.is_empty() {
        extraction.corpus.source_hash = hash;
    } else {
        assert_eq!(
            extraction.corpus.source_hash,
            hash,
            "{} recorded a source hash for different bytes",
            codec.format_name()
        );
    }

    check_fidelity(codec, &extraction.corpus, extraction.loss_class);
    check_structure(codec, &extraction.corpus)?;

    info!(
        "Extracted '{}' from {}: {} documents, {} blocks ({})",
        extraction.corpus.id,
        codec.format_name(),
        extraction.corpus.documents.len(),
        extraction.corpus.block_count(),
        extraction.loss_class
    );
    Ok(extraction)
}

/// Serialize a contract-checked IR to native bytes
pub fn emit(codec: &dyn Codec, corpus: &Corpus) -> Result<Emission> {
    refuse_unsupported(codec, "emit")?;
    check_fidelity(codec, corpus, corpus.loss_class);
    check_structure(codec, corpus)?;

    let emission = codec.emit(corpus)?;
    if emission.loss_class == LossClass::L0 {
        let retained = corpus.raw_source(codec.format_name())?;
        assert!(
            retained.as_deref() == Some(emission.bytes.as_slice()),
            "{} claimed L0 but did not replay its retained source",
            codec.format_name()
        );
    } else {
        assert!(
            emission.loss_class >= corpus.loss_class.max(LossClass::L1),
            "{} claimed {} for a {} corpus",
            codec.format_name(),
            emission.loss_class,
            corpus.loss_class
        );
    }

    info!(
        "Emitted '{}' as {}: {} bytes ({})",
        corpus.id,
        codec.format_name(),
        emission.bytes.len(),
        emission.loss_class
    );
    Ok(emission)
}

/// Outcome of extract -> emit -> extract through one codec
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoundTrip {
    pub format: String,
    pub extract_class: LossClass,
    pub emit_class: LossClass,
    /// Emitted bytes equal the source
    pub byte_identical: bool,
    /// Second extraction equals the first, ignoring `source_hash`
    pub ir_identical: bool,
}

impl RoundTrip {
    /// The L0 path must reproduce both bytes and IR
    pub fn holds(&self) -> bool {
        match self.emit_class {
            LossClass::L0 => self.byte_identical && self.ir_identical,
            _ => true,
        }
    }
}

/// Run a full round trip and report what survived
pub fn verify_round_trip(codec: &dyn Codec, source: &[u8], options: &ExtractOptions) -> Result<RoundTrip> {
    let first = extract(codec, source, options)?;
    let emission = emit(codec, &first.corpus)?;
    let second = extract(codec, &emission.bytes, options)?;

    let round_trip = RoundTrip {
        format: codec.format_name().to_string(),
        extract_class: first.loss_class,
        emit_class: emission.loss_class,
        byte_identical: emission.bytes == source,
        ir_identical: first.corpus.eq_ignoring_source_hash(&second.corpus),
    };
    debug!("Round trip through {}: {:?}", codec.format_name(), round_trip);
    Ok(round_trip)
}

fn refuse_unsupported(codec: &dyn Codec, operation: &'static str) -> Result<()> {
    if codec.supports_structure() {
        return Ok(());
    }
    Err(Error::Unsupported {
        format: codec.format_name().to_string(),
        operation,
        reason: "proprietary container; only raw ingestion is possible".to_string(),
    })
}

fn check_fidelity(codec: &dyn Codec, corpus: &Corpus, claimed: LossClass) {
    assert_eq!(
        claimed,
        corpus.loss_class,
        "{} reported {} but classified the corpus {}",
        codec.format_name(),
        claimed,
        corpus.loss_class
    );
    assert!(
        corpus.loss_class_consistent(),
        "corpus '{}' is {} but {} a raw payload",
        corpus.id,
        corpus.loss_class,
        if corpus.has_raw_source() { "carries" } else { "lacks" }
    );
}

fn check_structure(codec: &dyn Codec, corpus: &Corpus) -> Result<()> {
    let violations: Vec<Violation> = validate(corpus).into_iter().filter(|v| !v.is_fidelity()).collect();
    match violations.first() {
        None => Ok(()),
        Some(first) => Err(Error::parse(
            codec.format_name(),
            format!(
                "corpus '{}' breaks {} structural invariant(s); first: {}",
                corpus.id,
                violations.len(),
                first
            ),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::framework::{Emission, Extraction};
    use crate::ir::{ContentBlock, Document};
    use crate::loss::LossTracker;
    use crate::reference::Ref;

    /// Codec whose output is driven by the test
    struct Scripted {
        retain: bool,
        replay: Option<Vec<u8>>,
        structured: bool,
    }

    impl Scripted {
        fn lossless() -> Self {
            Self { retain: true, replay: None, structured: true }
        }
    }

    impl Codec for Scripted {
        fn format_name(&self) -> &str { "scripted" }
        fn file_extensions(&self) -> &[&str] { &["scr"] }
        fn supports_structure(&self) -> bool { self.structured }

        fn extract(&self, source: &[u8], _options: &ExtractOptions) -> Result<Extraction> {
            let text = String::from_utf8_lossy(source).to_string();
            let mut corpus = Corpus::new("S", "scripted").with_document(
                Document::new("Gen", 1).with_block(ContentBlock::verse("Gen.1.1", 1, text, Ref::verse("Gen", 1, 1))),
            );
            if self.retain {
                corpus = corpus.with_raw_source("scripted", source);
            }
            let loss_class = corpus.loss_class;
            Ok(Extraction { corpus, loss_class, report: LossTracker::new("scripted", "ir", loss_class).finish().1 })
        }

        fn emit(&self, corpus: &Corpus) -> Result<Emission> {
            let (bytes, loss_class) = match (&self.replay, corpus.raw_source("scripted")?) {
                (Some(forced), _) => (forced.clone(), LossClass::L0),
                (None, Some(raw)) => (raw, LossClass::L0),
                (None, None) => (corpus.documents[0].content_blocks[0].text.clone().into_bytes(), LossClass::L1),
            };
            Ok(Emission {
                bytes,
                format: "scripted".into(),
                loss_class,
                report: LossTracker::new("ir", "scripted", loss_class).finish().1,
            })
        }
    }

    #[test]
    fn test_extract_stamps_source_hash() {
        let extraction = extract(&Scripted::lossless(), b"In the beginning", &ExtractOptions::default()).unwrap();
        assert_eq!(extraction.corpus.source_hash, digest::content_hash(b"In the beginning"));
    }

    #[test]
    fn test_l0_round_trip() {
        let round_trip = verify_round_trip(&Scripted::lossless(), b"In the beginning", &ExtractOptions::default()).unwrap();
        assert_eq!(round_trip.emit_class, LossClass::L0);
        assert!(round_trip.byte_identical);
        assert!(round_trip.ir_identical);
        assert!(round_trip.holds());
    }

    #[test]
    fn test_l1_round_trip() {
        let codec = Scripted { retain: false, ..Scripted::lossless() };
        let round_trip = verify_round_trip(&codec, b"text", &ExtractOptions::default()).unwrap();
        assert_eq!(round_trip.extract_class, LossClass::L1);
        assert_eq!(round_trip.emit_class, LossClass::L1);
        assert!(round_trip.holds());
    }

    #[test]
    fn test_unsupported_refuses_both_directions() {
        let codec = Scripted { structured: false, ..Scripted::lossless() };
        let err = extract(&codec, b"x", &ExtractOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Unsupported { operation: "extract", .. }));
        assert!(err.to_string().contains("unsupported for structural conversion"));

        let corpus = Corpus::new("S", "scripted");
        assert!(matches!(emit(&codec, &corpus), Err(Error::Unsupported { operation: "emit", .. })));
    }

    #[test]
    #[should_panic(expected = "did not replay")]
    fn test_l0_emission_must_match_payload() {
        let codec = Scripted { replay: Some(b"forged".to_vec()), ..Scripted::lossless() };
        let extraction = extract(&codec, b"original", &ExtractOptions::default()).unwrap();
        let _ = emit(&codec, &extraction.corpus);
    }

    #[test]
    #[should_panic(expected = "lacks a raw payload")]
    fn test_l0_claim_without_payload_panics() {
        let corpus = Corpus::new("S", "scripted").with_loss_class(LossClass::L0);
        let _ = emit(&Scripted::lossless(), &corpus);
    }

    #[test]
    fn test_structural_violation_is_a_parse_error() {
        let corpus = Corpus::new("S", "scripted").with_document(Document::new("Gen", 1).with_blocks(vec![
            ContentBlock::verse("Gen.1.2", 2, "b", Ref::verse("Gen", 1, 2)),
            ContentBlock::verse("Gen.1.1", 1, "a", Ref::verse("Gen", 1, 1)),
        ]));
        let err = emit(&Scripted { retain: false, ..Scripted::lossless() }, &corpus).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Parse);
    }
}
