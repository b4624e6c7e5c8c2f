//! Parallel batch conversion
//!
//! Workers pull paths from a shared queue, run extract -> emit on their own
//! IR values and report back over a channel. Workers share only the output
//! directory. Outputs mirror each input's directory below the glob's literal
//! base, and each output path is claimed once; a second input resolving to
//! the same path fails instead of overwriting.

use crate::codec::{contract, CodecRegistry, ExtractOptions};
use crate::commands::{output_file_name, Dispatcher};
use crate::ignore::IgnoreFilter;
use crate::ir::persist;
use crate::loss::LossClass;
use crate::ui::{ProgressMessage, ProgressPhase};
use crate::{BatchMessage, Error, FileStatus, IoContext, Result};
use crossbeam::channel::{unbounded, Sender};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// What to convert and where
#[derive(Debug, Clone)]
pub struct BatchJob {
    /// Glob selecting input files
    pub pattern: String,
    /// Codec for reading inputs; detected per file when absent
    pub source_format: Option<String>,
    /// Codec for writing; each corpus's own source format when absent
    pub target_format: Option<String>,
    pub output_dir: PathBuf,
    pub workers: usize,
    pub exclude: Vec<String>,
    /// Also persist the intermediate IR next to each output
    pub keep_ir: bool,
    pub pretty_ir: bool,
}

impl BatchJob {
    pub fn new(pattern: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            pattern: pattern.into(),
            source_format: None,
            target_format: None,
            output_dir: output_dir.into(),
            workers: default_workers(),
            exclude: Vec::new(),
            keep_ir: false,
            pretty_ir: false,
        }
    }

    pub fn with_source_format(mut self, format: Option<String>) -> Self {
        self.source_format = format;
        self
    }

    pub fn with_target_format(mut self, format: Option<String>) -> Self {
        self.target_format = format;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_exclude(mut self, exclude: Vec<String>) -> Self {
        self.exclude = exclude;
        self
    }

    pub fn with_ir(mut self, keep_ir: bool, pretty: bool) -> Self {
        self.keep_ir = keep_ir;
        self.pretty_ir = pretty;
        self
    }
}

pub fn default_workers() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
}

/// Totals for a finished batch
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub converted: usize,
    pub replayed: usize,
    pub skipped: Vec<(String, String)>,
    pub failed: Vec<(String, String)>,
    pub by_class: BTreeMap<LossClass, usize>,
    pub duration: Duration,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.converted + self.replayed + self.skipped.len() + self.failed.len()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    fn record(&mut self, message: BatchMessage) {
        match message {
            BatchMessage::Converted { loss_class, status, .. } => {
                *self.by_class.entry(loss_class).or_default() += 1;
                match status {
                    FileStatus::Converted => self.converted += 1,
                    FileStatus::Replayed => self.replayed += 1,
                }
            }
            BatchMessage::Skipped { relative_path, reason } => self.skipped.push((relative_path, reason)),
            BatchMessage::Error(path, message) => self.failed.push((path, message)),
        }
    }
}

/// Expand the job's glob into files, minus ignored paths
pub fn collect_inputs(pattern: &str, exclude: &[String]) -> Result<Vec<PathBuf>> {
    let paths = glob::glob(pattern)
        .map_err(|e| Error::InvalidArgument(format!("invalid glob '{}': {}", pattern, e)))?;
    let filter = IgnoreFilter::new(Path::new("."), Some(exclude));

    let mut inputs = Vec::new();
    for entry in paths {
        match entry {
            Ok(path) if path.is_file() => {
                let relative = path.strip_prefix(".").unwrap_or(&path);
                if filter.is_ignored(relative, false) {
                    tracing::debug!("Skipping ignored {}", path.display());
                    continue;
                }
                inputs.push(path);
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Unreadable glob match: {}", e),
        }
    }
    inputs.sort();
    inputs.dedup();
    Ok(inputs)
}

/// Convert every matched file in parallel
pub fn run_batch(
    registry: &CodecRegistry,
    job: &BatchJob,
    progress: Option<&Sender<ProgressMessage>>,
) -> Result<BatchSummary> {
    let start = Instant::now();
    notify(progress, ProgressMessage::Started { phase: ProgressPhase::Scanning, total: 0 });
    let inputs = collect_inputs(&job.pattern, &job.exclude)?;
    notify(progress, ProgressMessage::Finished { phase: ProgressPhase::Scanning });
    std::fs::create_dir_all(&job.output_dir)
        .with_context(|| format!("creating output directory {}", job.output_dir.display()))?;

    tracing::info!("Converting {} files with {} workers", inputs.len(), job.workers);
    notify(progress, ProgressMessage::Started { phase: ProgressPhase::Converting, total: inputs.len() });

    let (work_tx, work_rx) = unbounded::<PathBuf>();
    let (result_tx, result_rx) = unbounded::<BatchMessage>();
    for path in &inputs {
        // Receiver outlives this loop
        let _ = work_tx.send(path.clone());
    }
    drop(work_tx);

    let base = glob_base(&job.pattern);
    let claims = OutputClaims::default();
    let mut summary = BatchSummary::default();
    std::thread::scope(|scope| {
        for _ in 0..job.workers.max(1) {
            let work_rx = work_rx.clone();
            let result_tx = result_tx.clone();
            let (base, claims) = (&base, &claims);
            scope.spawn(move || {
                for path in work_rx {
                    let message = convert_one(registry, job, base, claims, &path);
                    if result_tx.send(message).is_err() {
                        break;
                    }
                }
            });
        }
        drop(result_tx);

        for (current, message) in result_rx.iter().enumerate() {
            let file = match &message {
                BatchMessage::Converted { relative_path, .. }
                | BatchMessage::Skipped { relative_path, .. }
                | BatchMessage::Error(relative_path, _) => relative_path.clone(),
            };
            notify(
                progress,
                ProgressMessage::Progress {
                    phase: ProgressPhase::Converting,
                    current: current + 1,
                    file: Some(file),
                },
            );
            summary.record(message);
        }
    });

    notify(progress, ProgressMessage::Finished { phase: ProgressPhase::Converting });
    summary.duration = start.elapsed();
    tracing::info!(
        "Batch finished: {} converted, {} replayed, {} skipped, {} failed",
        summary.converted,
        summary.replayed,
        summary.skipped.len(),
        summary.failed.len()
    );
    Ok(summary)
}

fn notify(progress: Option<&Sender<ProgressMessage>>, message: ProgressMessage) {
    if let Some(tx) = progress {
        let _ = tx.send(message);
    }
}

/// Leading pattern components without glob metacharacters
pub fn glob_base(pattern: &str) -> PathBuf {
    Path::new(pattern)
        .components()
        .take_while(|c| !c.as_os_str().to_string_lossy().contains(['*', '?', '[']))
        .collect()
}

/// Input path below the glob base, refused if it climbs out with `..`
fn relative_input(base: &Path, path: &Path) -> Result<PathBuf> {
    let relative = match path.strip_prefix(base) {
        Ok(relative) => relative.to_path_buf(),
        Err(_) => path.file_name().map(PathBuf::from).unwrap_or_else(|| path.to_path_buf()),
    };
    let relative: PathBuf = relative.components().filter(|c| !matches!(c, Component::CurDir)).collect();
    if relative.components().any(|c| !matches!(c, Component::Normal(_))) {
        return Err(Error::InvalidArgument(format!(
            "{} would place its output outside the output directory",
            path.display()
        )));
    }
    Ok(relative)
}

/// Output paths taken so far, with the input that took each
#[derive(Default)]
struct OutputClaims(Mutex<BTreeMap<PathBuf, String>>);

impl OutputClaims {
    fn claim(&self, output: &Path, input: &str) -> Result<()> {
        let mut claims = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(owner) = claims.get(output) {
            return Err(Error::InvalidArgument(format!(
                "{} is already written for {}",
                output.display(),
                owner
            )));
        }
        claims.insert(output.to_path_buf(), input.to_string());
        Ok(())
    }
}

fn convert_one(registry: &CodecRegistry, job: &BatchJob, base: &Path, claims: &OutputClaims, path: &Path) -> BatchMessage {
    let relative = match relative_input(base, path) {
        Ok(relative) => relative,
        Err(e) => return BatchMessage::Error(path.display().to_string(), e.to_string()),
    };
    let relative_path = relative.display().to_string();
    let dispatcher = Dispatcher::new(registry).with_pretty_ir(job.pretty_ir);

    let codec = match dispatcher.codec_for_source(job.source_format.as_deref(), path) {
        Ok(codec) => codec,
        Err(Error::InvalidArgument(reason)) => return BatchMessage::Skipped { relative_path, reason },
        Err(e) => return BatchMessage::Error(relative_path, e.to_string()),
    };

    let result = (|| -> Result<BatchMessage> {
        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let extraction = contract::extract(codec, &bytes, &ExtractOptions::for_path(path))?;
        let corpus = extraction.corpus;

        let out_dir = match relative.parent() {
            Some(parent) => job.output_dir.join(parent),
            None => job.output_dir.clone(),
        };
        let target = registry.get(job.target_format.as_deref().unwrap_or(corpus.source_format.as_str()))?;
        claims.claim(&out_dir.join(output_file_name(&corpus.id, target)), &relative_path)?;

        if job.keep_ir {
            persist::write_ir(&out_dir.join(persist::ir_file_name(&corpus.id)), &corpus, job.pretty_ir)?;
        }

        let emitted = dispatcher.emit_native(Some(target.format_name()), &corpus, &out_dir)?;
        let status = if emitted.loss_class == LossClass::L0 {
            FileStatus::Replayed
        } else {
            FileStatus::Converted
        };
        Ok(BatchMessage::Converted {
            relative_path: relative_path.clone(),
            output_path: emitted.output_path,
            loss_class: emitted.loss_class,
            status,
        })
    })();

    match result {
        Ok(message) => message,
        Err(Error::Unsupported { reason, .. }) => BatchMessage::Skipped { relative_path, reason },
        Err(e) => {
            tracing::warn!("Failed to convert {}: {}", relative_path, e);
            BatchMessage::Error(relative_path, e.to_string())
        }
    }
}
