//! Logos proprietary resource containers
//!
//! The container format is undocumented and encrypted. Files are recognized
//! by extension so they can be ingested as raw blobs, but no structure is
//! ever extracted from or emitted to them.

use super::framework::{Codec, Detection, Emission, ExtractOptions, Extraction};
use crate::ir::Corpus;
use crate::{Error, Result};
use std::path::Path;

pub const FORMAT: &str = "logos";

const REASON: &str = "Logos resources are encrypted proprietary containers";

/// Codec that recognizes Logos resources and refuses to convert them
#[derive(Debug, Default)]
pub struct LogosCodec;

impl LogosCodec {
    pub fn new() -> Self {
        Self
    }

    fn unsupported(&self, operation: &'static str) -> Error {
        Error::Unsupported {
            format: FORMAT.to_string(),
            operation,
            reason: REASON.to_string(),
        }
    }
}

impl Codec for LogosCodec {
    fn format_name(&self) -> &str {
        FORMAT
    }

    fn description(&self) -> &str {
        "Logos Bible Software resource (detect and ingest only)"
    }

    fn file_extensions(&self) -> &[&str] {
        &["lbxlls", "lbsbbl", "logos4"]
    }

    fn supports_structure(&self) -> bool {
        false
    }

    fn detect(&self, path: &Path) -> Result<Detection> {
        if !path.is_file() {
            return Ok(Detection::negative(format!("{} is not a file", path.display())));
        }
        Ok(if self.can_handle(path) {
            Detection::positive(FORMAT, "Logos resource extension; structural conversion unsupported")
        } else {
            Detection::negative("not a Logos resource")
        })
    }

    fn extract(&self, _source: &[u8], _options: &ExtractOptions) -> Result<Extraction> {
        Err(self.unsupported("extract"))
    }

    fn emit(&self, _corpus: &Corpus) -> Result<Emission> {
        Err(self.unsupported("emit"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::contract;
    use crate::ErrorKind;

    #[test]
    fn test_detected_but_unconvertible() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ESV.lbxlls");
        std::fs::write(&path, [0x4c, 0x42, 0x58, 0x00, 0xff]).unwrap();

        let detection = LogosCodec.detect(&path).unwrap();
        assert!(detection.detected);
        assert_eq!(detection.format.as_deref(), Some("logos"));

        let err = contract::extract(&LogosCodec, &[0x4c, 0x42], &ExtractOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
        let err = LogosCodec.emit(&Corpus::new("ESV", "osis")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
        assert!(err.to_string().contains("encrypted"));
    }
}
