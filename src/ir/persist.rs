//! IR persistence - UTF-8 JSON with stable field names

use super::corpus::Corpus;
use crate::{IoContext, Result};
use std::path::Path;

/// File extension used for persisted IR
pub const IR_EXTENSION: &str = "ir.json";

pub fn to_json(corpus: &Corpus) -> Result<String> {
    Ok(serde_json::to_string(corpus)?)
}

pub fn to_json_pretty(corpus: &Corpus) -> Result<String> {
    Ok(serde_json::to_string_pretty(corpus)?)
}

pub fn from_json(json: &str) -> Result<Corpus> {
    Ok(serde_json::from_str(json)?)
}

/// Write a corpus to `path`, creating parent directories as needed
pub fn write_ir(path: &Path, corpus: &Corpus, pretty: bool) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating IR directory {}", parent.display()))?;
        }
    }
    let json = if pretty { to_json_pretty(corpus)? } else { to_json(corpus)? };
    std::fs::write(path, json).with_context(|| format!("writing IR to {}", path.display()))?;
    tracing::debug!("Wrote IR for '{}' to {}", corpus.id, path.display());
    Ok(())
}

pub fn read_ir(path: &Path) -> Result<Corpus> {
    let json = std::fs::read_to_string(path).with_context(|| format!("reading IR from {}", path.display()))?;
    from_json(&json)
}

/// Conventional IR file name for a corpus
pub fn ir_file_name(corpus_id: &str) -> String {
    format!("{}.{}", corpus_id, IR_EXTENSION)
}
