//! Content-addressed blob store

use crate::digest;
use crate::{IoContext, Result};
use std::path::{Path, PathBuf};

/// Length of the directory-sharding prefix taken from the hash
const SHARD_LEN: usize = 2;

/// Stores original source bytes at `root/<hash[0:2]>/<hash>`
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

/// Result of storing one blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub hash: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    /// False when an identical blob was already present
    pub created: bool,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where a blob with `hash` lives
    pub fn path_for(&self, hash: &str) -> PathBuf {
        let shard = hash.get(..SHARD_LEN).unwrap_or(hash);
        self.root.join(shard).join(hash)
    }

    /// Store bytes under their content hash.
    ///
    /// Writes go to a temporary file in the shard directory and are renamed
    /// into place, so concurrent writers of the same content end with the
    /// same file. An existing blob is left untouched.
    pub fn put(&self, bytes: &[u8]) -> Result<StoredBlob> {
        let hash = digest::content_hash(bytes);
        let path = self.path_for(&hash);
        let size_bytes = bytes.len() as u64;

        if path.is_file() {
            tracing::debug!("Blob {} already stored", hash);
            return Ok(StoredBlob {
                hash,
                path,
                size_bytes,
                created: false,
            });
        }

        let shard = path.parent().unwrap_or(&self.root);
        std::fs::create_dir_all(shard).with_context(|| format!("creating blob directory {}", shard.display()))?;

        let staged = tempfile::NamedTempFile::new_in(shard)
            .with_context(|| format!("staging blob in {}", shard.display()))?;
        std::fs::write(staged.path(), bytes).with_context(|| format!("writing blob {}", hash))?;
        staged
            .persist(&path)
            .map_err(|e| crate::Error::io(format!("storing blob at {}", path.display()), e.error))?;

        tracing::info!("Stored blob {} ({} bytes)", hash, size_bytes);
        Ok(StoredBlob {
            hash,
            path,
            size_bytes,
            created: true,
        })
    }

    /// Read a blob back; `None` if it was never stored
    pub fn get(&self, hash: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(hash);
        if !path.is_file() {
            return Ok(None);
        }
        std::fs::read(&path)
            .map(Some)
            .with_context(|| format!("reading blob {}", path.display()))
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.path_for(hash).is_file()
    }
}
