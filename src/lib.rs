//! # Palimpsest - Canonical IR for legacy text-encoding formats
//!
//! Converts documents between native formats through one intermediate
//! representation, so N formats need N codecs instead of N² converters.
//!
//! Palimpsest provides:
//! - A stand-off markup IR (Corpus, Document, ContentBlock, Anchor, Span, Ref)
//! - A reference canonicalizer for `book.chapter.verse[-end]` locations
//! - A five-level loss taxonomy (L0-L4) with structured loss reports
//! - The conversion contract every codec implements (`extract` / `emit`)
//! - Parallel and interlinear extensions over aligned corpora
//! - Content-addressed storage for raw ingestion

pub mod reference;
pub mod books;
pub mod value;
pub mod digest;
pub mod ir;
pub mod loss;
pub mod codec;
pub mod storage;
pub mod commands;
pub mod config;
pub mod ignore;
pub mod batch;
pub mod ui;

// Re-exports for convenient access
pub use reference::Ref;
pub use value::{Attributes, Value};
pub use ir::{Anchor, ContentBlock, Corpus, Document, ModuleKind, Span, SpanKind};
pub use loss::{LossClass, LossReport};
pub use codec::{Codec, CodecRegistry, Emission, Extraction, ExtractOptions};
pub use storage::BlobStore;

/// Result type alias for Palimpsest operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Palimpsest operations
///
/// Fidelity-contract violations (claiming L0 without a retained payload,
/// replaying bytes that differ from it) are not represented here: they are
/// programmer errors and abort through assertions in [`codec::contract`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid reference: {0}")]
    InvalidRef(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {format} input: {message}")]
    Parse { format: String, message: String },

    #[error("Format '{format}' is unsupported for structural conversion ({operation}): {reason}")]
    Unsupported {
        format: String,
        operation: &'static str,
        reason: String,
    },

    #[error("Missing identifier: {0}")]
    MissingIdentifier(String),

    #[error("No codec registered for format '{0}'")]
    UnknownFormat(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IR serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse error taxonomy reported to callers in error envelopes
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// Caller supplied a missing or malformed parameter
    Argument,
    /// Source unreadable or output uncreatable
    Io,
    /// Native input is malformed, or the IR cannot be named/serialized
    Parse,
    /// Format is recognized but permanently unconvertible
    Unsupported,
}

impl Error {
    /// Build a parse error for a named format
    pub fn parse(format: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Parse {
            format: format.into(),
            message: message.into(),
        }
    }

    /// Build an I/O error carrying a description of what was attempted
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Error::Io {
            context: context.into(),
            source,
        }
    }

    /// Classify this error into the caller-facing taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidArgument(_) | Error::InvalidRef(_) | Error::UnknownFormat(_) => {
                ErrorKind::Argument
            }
            Error::Io { .. } => ErrorKind::Io,
            Error::Parse { .. }
            | Error::MissingIdentifier(_)
            | Error::Storage(_)
            | Error::Serialization(_) => ErrorKind::Parse,
            Error::Unsupported { .. } => ErrorKind::Unsupported,
        }
    }
}

/// Attach path context to raw `std::io` results
pub trait IoContext<T> {
    fn with_context(self, context: impl FnOnce() -> String) -> Result<T>;
}

impl<T> IoContext<T> for std::result::Result<T, std::io::Error> {
    fn with_context(self, context: impl FnOnce() -> String) -> Result<T> {
        self.map_err(|source| Error::io(context(), source))
    }
}

/// Message sent from parallel batch workers to the coordinator
#[derive(Debug)]
pub enum BatchMessage {
    Converted {
        relative_path: String,
        output_path: std::path::PathBuf,
        loss_class: LossClass,
        status: FileStatus,
    },
    /// Recognized but not convertible, or no codec claims the file
    Skipped {
        relative_path: String,
        reason: String,
    },
    Error(String, String),
}

/// Status of a converted file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    /// Regenerated from IR structure
    Converted,
    /// Retained source bytes written back verbatim
    Replayed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(Error::InvalidArgument("x".into()).kind(), ErrorKind::Argument);
        assert_eq!(Error::parse("osis", "bad").kind(), ErrorKind::Parse);
        let io = Error::io("reading a.xml", std::io::Error::from(std::io::ErrorKind::NotFound));
        assert_eq!(io.kind(), ErrorKind::Io);
        let unsupported = Error::Unsupported {
            format: "logos".into(),
            operation: "extract",
            reason: "sealed".into(),
        };
        assert_eq!(unsupported.kind(), ErrorKind::Unsupported);
    }

    #[test]
    fn test_io_context_appends_cause() {
        let err = Err::<(), _>(std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"))
            .with_context(|| "reading missing.osis".to_string())
            .unwrap_err();
        assert_eq!(err.to_string(), "reading missing.osis: no such file");
    }
}
