//! Storage Layer - content-addressed blobs
//!
//! Original source bytes are kept verbatim, keyed by content hash:
//! - `root/<hash[0:2]>/<hash>`
//!
//! Writes are keyed by content, so concurrent writers of identical bytes race
//! harmlessly.

pub mod blob;

pub use blob::{BlobStore, StoredBlob};
