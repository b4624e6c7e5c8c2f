//! Wire commands
//!
//! Five commands, transport independent:
//! - `detect {path}`
//! - `ingest {path, output_dir}`
//! - `enumerate {path}`
//! - `extract-ir {path, output_dir?}`
//! - `emit-native {ir_path | ir, output_dir}`
//!
//! Every response is tagged `status: ok` or `status: error`; errors carry a
//! message and the coarse [`ErrorKind`].

use crate::codec::{contract, corpus_hint_from_path, enumerate_path, Codec, CodecRegistry, Detection, Entry, ExtractOptions};
use crate::ignore::IgnoreFilter;
use crate::ir::{persist, Corpus};
use crate::loss::{LossClass, LossReport};
use crate::storage::BlobStore;
use crate::{Error, ErrorKind, IoContext, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// One command with its parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum Request {
    Detect {
        path: PathBuf,
    },
    Ingest {
        path: PathBuf,
        output_dir: PathBuf,
    },
    Enumerate {
        path: PathBuf,
    },
    ExtractIr {
        path: PathBuf,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output_dir: Option<PathBuf>,
    },
    EmitNative {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ir_path: Option<PathBuf>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ir: Option<Box<Corpus>>,
        output_dir: PathBuf,
    },
}

impl Request {
    pub fn name(&self) -> &'static str {
        match self {
            Request::Detect { .. } => "detect",
            Request::Ingest { .. } => "ingest",
            Request::Enumerate { .. } => "enumerate",
            Request::ExtractIr { .. } => "extract-ir",
            Request::EmitNative { .. } => "emit-native",
        }
    }
}

/// A request addressed to a codec, as read from a JSON call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    /// Codec to use; inferred from the input when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(flatten)]
    pub request: Request,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestOutcome {
    pub artifact_id: String,
    pub blob_hash: String,
    pub size_bytes: u64,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumerateOutcome {
    pub entries: Vec<Entry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractOutcome {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ir_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ir: Option<Box<Corpus>>,
    pub loss_class: LossClass,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loss_report: Option<LossReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmitOutcome {
    pub output_path: PathBuf,
    pub format: String,
    pub loss_class: LossClass,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loss_report: Option<LossReport>,
}

/// Successful result of any command.
///
/// Variant order matters for deserialization: `ExtractIr` has the fewest
/// required fields and must come last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Outcome {
    Detect(Detection),
    Ingest(IngestOutcome),
    Enumerate(EnumerateOutcome),
    EmitNative(EmitOutcome),
    ExtractIr(ExtractOutcome),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub message: String,
    pub kind: ErrorKind,
}

impl From<&Error> for Failure {
    fn from(err: &Error) -> Self {
        Self {
            message: err.to_string(),
            kind: err.kind(),
        }
    }
}

/// Response envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Response {
    Ok(Outcome),
    Error(Failure),
}

impl Response {
    pub fn from_result(result: Result<Outcome>) -> Self {
        match result {
            Ok(outcome) => Response::Ok(outcome),
            Err(err) => Response::Error(Failure::from(&err)),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Response::Ok(_))
    }
}

/// Runs commands against a codec registry
pub struct Dispatcher<'a> {
    registry: &'a CodecRegistry,
    pretty_ir: bool,
}

impl<'a> Dispatcher<'a> {
    pub fn new(registry: &'a CodecRegistry) -> Self {
        Self {
            registry,
            pretty_ir: false,
        }
    }

    pub fn with_pretty_ir(mut self, pretty: bool) -> Self {
        self.pretty_ir = pretty;
        self
    }

    /// Run a call and wrap the result in an envelope
    pub fn dispatch(&self, call: Call) -> Response {
        let command = call.request.name();
        let response = Response::from_result(self.run(call.format.as_deref(), call.request));
        if let Response::Error(failure) = &response {
            tracing::debug!("{} failed ({:?}): {}", command, failure.kind, failure.message);
        }
        response
    }

    /// Run a command, returning its typed outcome
    pub fn run(&self, format: Option<&str>, request: Request) -> Result<Outcome> {
        tracing::debug!("Running {} (format: {})", request.name(), format.unwrap_or("auto"));
        match request {
            Request::Detect { path } => self.detect(format, &path).map(Outcome::Detect),
            Request::Ingest { path, output_dir } => self.ingest(format, &path, &output_dir).map(Outcome::Ingest),
            Request::Enumerate { path } => self.enumerate(format, &path).map(Outcome::Enumerate),
            Request::ExtractIr { path, output_dir } => {
                self.extract_ir(format, &path, output_dir.as_deref()).map(Outcome::ExtractIr)
            }
            Request::EmitNative { ir_path, ir, output_dir } => {
                let corpus = match (ir, ir_path) {
                    (Some(ir), None) => *ir,
                    (None, Some(path)) => persist::read_ir(&path)?,
                    (Some(_), Some(_)) => {
                        return Err(Error::InvalidArgument("pass either ir or ir_path, not both".to_string()));
                    }
                    (None, None) => return Err(Error::InvalidArgument("emit-native needs ir or ir_path".to_string())),
                };
                self.emit_native(format, &corpus, &output_dir).map(Outcome::EmitNative)
            }
        }
    }

    pub fn detect(&self, format: Option<&str>, path: &Path) -> Result<Detection> {
        match format {
            Some(name) => self.registry.get(name)?.detect(path),
            None => self.registry.detect(path),
        }
    }

    /// Store the original bytes whether or not the format converts
    pub fn ingest(&self, format: Option<&str>, path: &Path, output_dir: &Path) -> Result<IngestOutcome> {
        let bytes = read_source(path)?;
        let stored = BlobStore::new(output_dir).put(&bytes)?;
        let detection = self.detect(format, path)?;

        let mut metadata = BTreeMap::new();
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            metadata.insert("file_name".to_string(), name.to_string());
        }
        metadata.insert("source_path".to_string(), path.display().to_string());
        metadata.insert("blob_path".to_string(), stored.path.display().to_string());
        metadata.insert("format".to_string(), detection.format.unwrap_or_else(|| "unknown".to_string()));
        metadata.insert("stored".to_string(), if stored.created { "new" } else { "existing" }.to_string());

        Ok(IngestOutcome {
            artifact_id: corpus_hint_from_path(path).unwrap_or_else(|| stored.hash.clone()),
            blob_hash: stored.hash,
            size_bytes: stored.size_bytes,
            metadata,
        })
    }

    pub fn enumerate(&self, format: Option<&str>, path: &Path) -> Result<EnumerateOutcome> {
        let codec = match format {
            Some(name) => Some(self.registry.get(name)?),
            None if path.is_file() => self.registry.find_codec(path)?,
            None => None,
        };
        let entries = match codec {
            Some(codec) => codec.enumerate(path)?,
            None => enumerate_path(path, &IgnoreFilter::new(path, None))?,
        };
        Ok(EnumerateOutcome { entries })
    }

    pub fn extract_ir(&self, format: Option<&str>, path: &Path, output_dir: Option<&Path>) -> Result<ExtractOutcome> {
        let codec = self.codec_for_source(format, path)?;
        let bytes = read_source(path)?;
        let extraction = contract::extract(codec, &bytes, &ExtractOptions::for_path(path))?;
        let loss_report = (!extraction.report.is_clean()).then_some(extraction.report);

        Ok(match output_dir {
            Some(dir) => {
                let ir_path = dir.join(persist::ir_file_name(&extraction.corpus.id));
                persist::write_ir(&ir_path, &extraction.corpus, self.pretty_ir)?;
                ExtractOutcome {
                    ir_path: Some(ir_path),
                    ir: None,
                    loss_class: extraction.loss_class,
                    loss_report,
                }
            }
            None => ExtractOutcome {
                ir_path: None,
                ir: Some(Box::new(extraction.corpus)),
                loss_class: extraction.loss_class,
                loss_report,
            },
        })
    }

    /// Emit with `format`, or back to the corpus's source format
    pub fn emit_native(&self, format: Option<&str>, corpus: &Corpus, output_dir: &Path) -> Result<EmitOutcome> {
        let codec = self.registry.get(format.unwrap_or(corpus.source_format.as_str()))?;
        let emission = contract::emit(codec, corpus)?;

        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("creating output directory {}", output_dir.display()))?;
        let output_path = output_dir.join(output_file_name(&corpus.id, codec));
        std::fs::write(&output_path, &emission.bytes)
            .with_context(|| format!("writing {}", output_path.display()))?;

        Ok(EmitOutcome {
            output_path,
            format: emission.format,
            loss_class: emission.loss_class,
            loss_report: (!emission.report.is_clean()).then_some(emission.report),
        })
    }

    /// Codec named by `format`, or the one recognizing `path`
    pub fn codec_for_source(&self, format: Option<&str>, path: &Path) -> Result<&'a dyn Codec> {
        match format {
            Some(name) => self.registry.get(name),
            None => self.registry.find_codec(path)?.ok_or_else(|| {
                Error::InvalidArgument(format!("no codec recognizes {}; name a format explicitly", path.display()))
            }),
        }
    }
}

/// `<id>.<first extension>` for a codec's output
pub fn output_file_name(corpus_id: &str, codec: &dyn Codec) -> String {
    let extension = codec.file_extensions().first().copied().unwrap_or(codec.format_name());
    format!("{}.{}", corpus_id, extension)
}

fn read_source(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("reading {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::default_registry;
    use pretty_assertions::assert_eq;

    const VPL: &str = "# id: KJV\nGen.1.1 In the beginning\nGen.1.2 And the earth\n";

    #[test]
    fn test_request_wire_shape() {
        let call: Call = serde_json::from_str(r#"{"command":"extract-ir","path":"kjv.vpl","format":"vpl"}"#).unwrap();
        assert_eq!(call.format.as_deref(), Some("vpl"));
        assert_eq!(
            call.request,
            Request::ExtractIr {
                path: PathBuf::from("kjv.vpl"),
                output_dir: None
            }
        );
        assert!(serde_json::from_str::<Call>(r#"{"command":"ingest","path":"x"}"#).is_err());
        assert!(serde_json::from_str::<Call>(r#"{"command":"convert","path":"x"}"#).is_err());
    }

    #[test]
    fn test_extract_then_emit_via_files() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("kjv.vpl");
        std::fs::write(&source, VPL).unwrap();
        let registry = default_registry();
        let dispatcher = Dispatcher::new(&registry);

        let Outcome::ExtractIr(extracted) = dispatcher
            .run(None, Request::ExtractIr { path: source, output_dir: Some(dir.path().join("ir")) })
            .unwrap()
        else {
            panic!("expected extract outcome");
        };
        assert_eq!(extracted.loss_class, LossClass::L1);
        let ir_path = extracted.ir_path.unwrap();
        assert!(ir_path.ends_with("KJV.ir.json"));

        let response = dispatcher.dispatch(Call {
            format: Some("osis".to_string()),
            request: Request::EmitNative { ir_path: Some(ir_path), ir: None, output_dir: dir.path().join("out") },
        });
        let Response::Ok(Outcome::EmitNative(emitted)) = response else {
            panic!("expected emit outcome, got {:?}", response);
        };
        assert_eq!(emitted.format, "osis");
        assert_eq!(emitted.loss_class, LossClass::L1);
        assert!(emitted.output_path.ends_with("KJV.osis"));
        assert!(std::fs::read_to_string(&emitted.output_path).unwrap().contains("osisID=\"Gen.1.2\""));
    }

    #[test]
    fn test_ingest_shards_blob() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("kjv.vpl");
        std::fs::write(&source, VPL).unwrap();
        let registry = default_registry();

        let outcome = Dispatcher::new(&registry).ingest(None, &source, &dir.path().join("blobs")).unwrap();
        assert_eq!(outcome.artifact_id, "kjv");
        assert_eq!(outcome.size_bytes, VPL.len() as u64);
        assert_eq!(outcome.metadata["format"], "vpl");
        let blob = dir.path().join("blobs").join(&outcome.blob_hash[..2]).join(&outcome.blob_hash);
        assert_eq!(std::fs::read_to_string(blob).unwrap(), VPL);
    }

    #[test]
    fn test_error_envelope() {
        let registry = default_registry();
        let response = Dispatcher::new(&registry).dispatch(Call {
            format: Some("vpl".to_string()),
            request: Request::ExtractIr { path: PathBuf::from("/nonexistent/kjv.vpl"), output_dir: None },
        });
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["kind"], "io");
        assert!(json["message"].as_str().unwrap().contains("/nonexistent/kjv.vpl"));

        let response = Dispatcher::new(&registry).dispatch(Call {
            format: None,
            request: Request::EmitNative { ir_path: None, ir: None, output_dir: PathBuf::from("out") },
        });
        assert_eq!(response, Response::Error(Failure { message: "Invalid argument: emit-native needs ir or ir_path".to_string(), kind: ErrorKind::Argument }));
    }

    #[test]
    fn test_response_round_trips() {
        let responses = vec![
            Response::Ok(Outcome::Detect(Detection::positive("osis", "<osis> root element"))),
            Response::Ok(Outcome::Enumerate(EnumerateOutcome { entries: Vec::new() })),
            Response::Ok(Outcome::ExtractIr(ExtractOutcome {
                ir_path: Some(PathBuf::from("KJV.ir.json")),
                ir: None,
                loss_class: LossClass::L0,
                loss_report: None,
            })),
            Response::Ok(Outcome::EmitNative(EmitOutcome {
                output_path: PathBuf::from("KJV.vpl"),
                format: "vpl".to_string(),
                loss_class: LossClass::L2,
                loss_report: None,
            })),
        ];
        for response in responses {
            let json = serde_json::to_string(&response).unwrap();
            assert!(json.contains("\"status\":\"ok\""));
            assert_eq!(serde_json::from_str::<Response>(&json).unwrap(), response);
        }
    }
}
