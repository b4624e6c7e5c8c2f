//! Core codec framework
//!
//! Defines the trait every native-format codec implements and the registry
//! that selects codecs by name, extension, or content marker.

use crate::ignore::IgnoreFilter;
use crate::ir::Corpus;
use crate::loss::{LossClass, LossReport};
use crate::{IoContext, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

/// Bytes read from the head of a file for content sniffing
pub const SNIFF_LEN: usize = 4096;

/// Caller-supplied hints for extraction
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Fallback corpus identifier (usually the source file stem) for
    /// formats that do not name themselves
    pub corpus_hint: Option<String>,
}

impl ExtractOptions {
    pub fn with_hint(hint: impl Into<String>) -> Self {
        Self {
            corpus_hint: Some(hint.into()),
        }
    }

    /// Derive the hint from a source path
    pub fn for_path(path: &Path) -> Self {
        Self {
            corpus_hint: corpus_hint_from_path(path),
        }
    }
}

/// File stem with every extension stripped ("kjv.osis.xml" -> "kjv")
pub fn corpus_hint_from_path(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let stem = name.split('.').next().unwrap_or(name);
    (!stem.is_empty()).then(|| stem.to_string())
}

/// Result of `extract`: native bytes -> IR
#[derive(Debug, Clone)]
pub struct Extraction {
    pub corpus: Corpus,
    pub loss_class: LossClass,
    pub report: LossReport,
}

/// Result of `emit`: IR -> native bytes
#[derive(Debug, Clone)]
pub struct Emission {
    pub bytes: Vec<u8>,
    pub format: String,
    pub loss_class: LossClass,
    pub report: LossReport,
}

/// Outcome of format sniffing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detection {
    pub detected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Detection {
    pub fn positive(format: &str, reason: impl Into<String>) -> Self {
        Self {
            detected: true,
            format: Some(format.to_string()),
            reason: Some(reason.into()),
        }
    }

    pub fn negative(reason: impl Into<String>) -> Self {
        Self {
            detected: false,
            format: None,
            reason: Some(reason.into()),
        }
    }
}

/// One entry listed by `enumerate`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub path: String,
    pub size_bytes: u64,
    pub is_dir: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,
}

/// Trait for native-format codecs
///
/// Each codec is responsible for:
/// 1. Recognizing its files (extension, then content marker)
/// 2. Extracting native bytes into a [`Corpus`] with a loss classification
/// 3. Emitting a [`Corpus`] back to native bytes, replaying retained raw
///    bytes when it has them
///
/// Codecs are invoked through [`super::contract`], which enforces the
/// fidelity and ordering rules around these methods.
pub trait Codec: Send + Sync {
    /// Get the format name (for display and registry lookup)
    fn format_name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Get file extensions this codec handles
    fn file_extensions(&self) -> &[&str];

    /// Check if this codec claims a path by extension
    fn can_handle(&self, path: &Path) -> bool {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        self.file_extensions()
            .iter()
            .any(|ext| name.ends_with(&format!(".{}", ext)))
    }

    /// Look for a content marker in the head of a file; returns the reason
    fn sniff(&self, _head: &[u8]) -> Option<String> {
        None
    }

    /// Whether structural conversion is possible at all.
    ///
    /// Proprietary containers are still detected and ingested, but both
    /// `extract` and `emit` refuse them.
    fn supports_structure(&self) -> bool {
        true
    }

    /// Sniff a file: extension check, then content-marker check
    fn detect(&self, path: &Path) -> Result<Detection> {
        if !path.is_file() {
            return Ok(Detection::negative(format!("{} is not a file", path.display())));
        }
        let head = read_head(path)?;
        let by_extension = self.can_handle(path);
        Ok(match (by_extension, self.sniff(&head)) {
            (true, Some(marker)) => Detection::positive(self.format_name(), format!("extension and {}", marker)),
            (false, Some(marker)) => Detection::positive(self.format_name(), marker),
            (true, None) => Detection::negative(format!(
                "extension matches {} but the content marker is missing",
                self.format_name()
            )),
            (false, None) => Detection::negative(format!("not a {} file", self.format_name())),
        })
    }

    /// Parse native bytes into the IR
    fn extract(&self, source: &[u8], options: &ExtractOptions) -> Result<Extraction>;

    /// Serialize the IR to native bytes
    fn emit(&self, corpus: &Corpus) -> Result<Emission>;

    /// List what a path contains
    fn enumerate(&self, path: &Path) -> Result<Vec<Entry>> {
        enumerate_path(path, &IgnoreFilter::new(path, None))
    }
}

/// Read up to [`SNIFF_LEN`] bytes from the start of a file
pub fn read_head(path: &Path) -> Result<Vec<u8>> {
    let file = std::fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut head = Vec::with_capacity(SNIFF_LEN);
    file.take(SNIFF_LEN as u64)
        .read_to_end(&mut head)
        .with_context(|| format!("reading {}", path.display()))?;
    Ok(head)
}

/// List a directory tree (ignore-filtered) or a single file
pub fn enumerate_path(path: &Path, filter: &IgnoreFilter) -> Result<Vec<Entry>> {
    let meta = std::fs::metadata(path).with_context(|| format!("reading metadata of {}", path.display()))?;
    if meta.is_file() {
        return Ok(vec![Entry {
            path: path.display().to_string(),
            size_bytes: meta.len(),
            is_dir: false,
            metadata: None,
        }]);
    }

    let mut entries = Vec::new();
    let walker = ignore::WalkBuilder::new(path)
        .standard_filters(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();
    for entry in walker.filter_map(|e| e.ok()) {
        if entry.depth() == 0 {
            continue;
        }
        let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
        let relative = entry.path().strip_prefix(path).unwrap_or(entry.path());
        if filter.is_ignored(relative, is_dir) {
            continue;
        }
        let size_bytes = if is_dir {
            0
        } else {
            entry.metadata().map(|m| m.len()).unwrap_or(0)
        };
        entries.push(Entry {
            path: relative.display().to_string(),
            size_bytes,
            is_dir,
            metadata: None,
        });
    }
    Ok(entries)
}

/// Registry of codecs
#[derive(Default)]
pub struct CodecRegistry {
    codecs: Vec<Box<dyn Codec>>,
}

impl CodecRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a codec, replacing any codec with the same format name
    pub fn register(&mut self, codec: impl Codec + 'static) {
        self.codecs.retain(|c| c.format_name() != codec.format_name());
        self.codecs.push(Box::new(codec));
    }

    /// Get a codec by format name
    pub fn get(&self, name: &str) -> Result<&dyn Codec> {
        self.codecs
            .iter()
            .find(|c| c.format_name().eq_ignore_ascii_case(name))
            .map(|c| c.as_ref())
            .ok_or_else(|| crate::Error::UnknownFormat(name.to_string()))
    }

    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_ok()
    }

    /// Find a codec for a file: first by extension, then by content marker
    pub fn find_codec(&self, path: &Path) -> Result<Option<&dyn Codec>> {
        if let Some(codec) = self.codecs.iter().find(|c| c.can_handle(path)) {
            return Ok(Some(codec.as_ref()));
        }
        if !path.is_file() {
            return Ok(None);
        }
        let head = read_head(path)?;
        Ok(self
            .codecs
            .iter()
            .find(|c| c.sniff(&head).is_some())
            .map(|c| c.as_ref()))
    }

    /// Run every codec's detection and return the first positive one
    pub fn detect(&self, path: &Path) -> Result<Detection> {
        let mut last = Detection::negative(format!("no registered codec recognizes {}", path.display()));
        for codec in &self.codecs {
            let detection = codec.detect(path)?;
            if detection.detected {
                return Ok(detection);
            }
            if codec.can_handle(path) {
                last = detection;
            }
        }
        Ok(last)
    }

    /// Get all registered codecs
    pub fn codecs(&self) -> &[Box<dyn Codec>] {
        &self.codecs
    }

    /// List all format names (sorted)
    pub fn list_formats(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.codecs.iter().map(|c| c.format_name()).collect();
        names.sort();
        names
    }
}

/// Create a default registry with all built-in codecs
pub fn default_registry() -> CodecRegistry {
    let mut registry = CodecRegistry::new();
    registry.register(super::osis::OsisCodec::new());
    registry.register(super::vpl::VplCodec::new());
    registry.register(super::esword::EswordCodec::new());
    registry.register(super::logos::LogosCodec::new());
    registry
}
