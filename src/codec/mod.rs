//! Codec Framework
//!
//! Each native format provides a [`Codec`] that extracts bytes into the IR and
//! emits the IR back to bytes. Conversions go through [`contract`], which
//! enforces ordering and fidelity rules; codecs never talk to each other.

pub mod contract;
pub mod esword;
pub mod framework;
pub mod logos;
pub mod osis;
mod regenerate;
pub mod vpl;

pub use contract::{verify_round_trip, RoundTrip};
pub use framework::{
    corpus_hint_from_path, default_registry, enumerate_path, Codec, CodecRegistry, Detection, Emission, Entry, ExtractOptions,
    Extraction,
};
pub use esword::EswordCodec;
pub use logos::LogosCodec;
pub use osis::OsisCodec;
pub use vpl::VplCodec;
