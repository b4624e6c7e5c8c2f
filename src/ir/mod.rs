//! Intermediate Representation - the entity tree every codec reads and writes
//!
//! All entities are immutable value trees built fresh per conversion:
//! - [`Corpus`]: root, with provenance, loss class and ordered documents
//! - [`Document`]: ordered content blocks under an ordering key
//! - [`ContentBlock`]: text plus a local arena of anchors
//! - [`Anchor`] / [`Span`]: stand-off markup, linked by identifier only
//! - [`parallel`] / [`interlinear`]: aligned-corpus extensions

pub mod block;
pub mod corpus;
pub mod interlinear;
pub mod parallel;
pub mod persist;
pub mod validate;

pub use block::{Anchor, ContentBlock, Span, SpanKind};
pub use corpus::{Corpus, Document, ModuleKind, IR_VERSION, RAW_SOURCE_PREFIX};
pub use interlinear::{InterlinearLayer, InterlinearLine};
pub use parallel::{AlignedUnit, Alignment, AlignmentLevel, ParallelCorpus, TokenAlignment};
pub use validate::{validate, Violation};
