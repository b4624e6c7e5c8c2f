//! Palimpsest CLI - convert legacy text-encoding formats through one canonical IR

use anyhow::Context;
use clap::{Parser, Subcommand};
use palimpsest::batch::{self, BatchJob};
use palimpsest::codec::{contract, default_registry, verify_round_trip, CodecRegistry, ExtractOptions};
use palimpsest::commands::{Call, Dispatcher, Outcome, Request, Response};
use palimpsest::config::{self, PalimpsestConfig};
use palimpsest::ir::persist;
use palimpsest::ui::{self, Icons, ProgressManager, Spinner, TableBuilder};
use palimpsest::{LossClass, LossReport};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Long help; the loss scale lines are read from [`LossClass`]
fn long_about() -> String {
    let mut text = String::from(
        "Palimpsest extracts native document formats into one stand-off markup IR and\n\
         emits them back out, classifying every conversion on a five-level loss scale:\n",
    );
    for class in LossClass::all() {
        text.push_str(&format!("  {}  {}\n", class, class.description()));
    }
    text.push_str(
        "\nExample usage:\n\
         \x20 palimpsest detect kjv.osis\n\
         \x20 palimpsest extract-ir kjv.osis --output-dir build/ir\n\
         \x20 palimpsest convert kjv.bblx --to osis\n\
         \x20 palimpsest batch \"modules/**/*.vpl\" --to osis --workers 8\n\
         \x20 echo '{\"command\":\"detect\",\"path\":\"kjv.osis\"}' | palimpsest call\n",
    );
    text
}

#[derive(Parser)]
#[command(name = "palimpsest")]
#[command(version)]
#[command(about = "Convert legacy text-encoding formats through a canonical, loss-audited IR")]
#[command(long_about = long_about())]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print machine-readable JSON responses instead of human output
    #[arg(long, global = true)]
    json: bool,

    /// Path to the config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether a file is in a given (or any known) format
    Detect {
        path: PathBuf,

        /// Format to test for
        #[arg(short, long)]
        format: Option<String>,
    },

    /// Store a file's original bytes in the content-addressed blob store
    Ingest {
        path: PathBuf,

        /// Blob store root
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        #[arg(short, long)]
        format: Option<String>,
    },

    /// List the artifacts in a directory or container
    Enumerate {
        path: PathBuf,

        #[arg(short, long)]
        format: Option<String>,
    },

    /// Extract a native file into IR JSON
    ExtractIr {
        path: PathBuf,

        /// Source format (detected when omitted)
        #[arg(short, long)]
        format: Option<String>,

        /// Directory for `<id>.ir.json`
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Print the IR to stdout instead of writing a file
        #[arg(long)]
        stdout: bool,
    },

    /// Emit a native file from IR JSON
    EmitNative {
        /// IR file written by extract-ir
        ir_path: PathBuf,

        /// Target format (the corpus's source format when omitted)
        #[arg(short, long)]
        format: Option<String>,

        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Extract then emit in one step
    Convert {
        path: PathBuf,

        /// Target format
        #[arg(short, long)]
        to: Option<String>,

        /// Source format (detected when omitted)
        #[arg(long)]
        from: Option<String>,

        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Also write the intermediate IR
        #[arg(long)]
        keep_ir: bool,
    },

    /// Round-trip a file through its own codec and report what survived
    Verify {
        path: PathBuf,

        #[arg(short, long)]
        format: Option<String>,
    },

    /// Convert every file matching a glob, in parallel
    Batch {
        /// Glob pattern, e.g. "modules/**/*.bblx"
        pattern: String,

        #[arg(short, long)]
        to: Option<String>,

        #[arg(long)]
        from: Option<String>,

        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Worker threads (defaults to available parallelism)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Extra gitignore-style patterns to skip
        #[arg(short, long)]
        exclude: Vec<String>,

        #[arg(long)]
        keep_ir: bool,
    },

    /// List registered formats
    Formats,

    /// Read one JSON command from stdin and write the JSON response to stdout
    Call,

    /// Write a default palimpsest.toml
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays parseable
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);
    let cfg = config::load_config(Some(config_path.as_path()))?.unwrap_or_default();
    let registry = default_registry();
    let dispatcher = Dispatcher::new(&registry).with_pretty_ir(cfg.pretty_ir);

    match cli.command {
        Commands::Detect { path, format } => {
            let request = Request::Detect { path };
            respond(&dispatcher, format.as_deref(), request, cli.json)?;
        }

        Commands::Ingest { path, output_dir, format } => {
            let output_dir = output_dir.unwrap_or_else(|| cfg.output_dir().join("blobs"));
            let request = Request::Ingest { path, output_dir };
            respond(&dispatcher, format.as_deref(), request, cli.json)?;
        }

        Commands::Enumerate { path, format } => {
            let request = Request::Enumerate { path };
            respond(&dispatcher, format.as_deref(), request, cli.json)?;
        }

        Commands::ExtractIr { path, format, output_dir, stdout } => {
            if stdout {
                let outcome = dispatcher.extract_ir(format.as_deref(), &path, None)?;
                if let Some(report) = &outcome.loss_report {
                    log_report(report);
                }
                if let Some(corpus) = outcome.ir {
                    let json = if cfg.pretty_ir {
                        persist::to_json_pretty(&corpus)?
                    } else {
                        persist::to_json(&corpus)?
                    };
                    println!("{}", json);
                }
            } else {
                let output_dir = Some(output_dir.unwrap_or_else(|| cfg.output_dir()));
                let request = Request::ExtractIr { path, output_dir };
                respond(&dispatcher, format.as_deref(), request, cli.json)?;
            }
        }

        Commands::EmitNative { ir_path, format, output_dir } => {
            let output_dir = output_dir.unwrap_or_else(|| cfg.output_dir());
            let request = Request::EmitNative {
                ir_path: Some(ir_path),
                ir: None,
                output_dir,
            };
            respond(&dispatcher, format.as_deref(), request, cli.json)?;
        }

        Commands::Convert { path, to, from, output_dir, keep_ir } => {
            let output_dir = output_dir.unwrap_or_else(|| cfg.output_dir());
            let target = to.or_else(|| cfg.default_target.clone());
            convert(&dispatcher, &path, from.as_deref(), target.as_deref(), &output_dir, keep_ir, cli.json)?;
        }

        Commands::Verify { path, format } => {
            verify(&registry, &dispatcher, &path, format.as_deref(), cli.json)?;
        }

        Commands::Batch { pattern, to, from, output_dir, workers, exclude, keep_ir } => {
            let mut excludes = cfg.exclude.clone();
            excludes.extend(exclude);
            let job = BatchJob::new(pattern, output_dir.unwrap_or_else(|| cfg.output_dir()))
                .with_source_format(from)
                .with_target_format(to.or_else(|| cfg.default_target.clone()))
                .with_workers(workers.or(cfg.workers).unwrap_or_else(batch::default_workers))
                .with_exclude(excludes)
                .with_ir(keep_ir, cfg.pretty_ir);
            run_batch(&registry, &job, cli.json)?;
        }

        Commands::Formats => {
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&registry.list_formats())?);
            } else {
                ui::header("Registered formats");
                println!("{}", ui::formats_table(registry.codecs()));
            }
        }

        Commands::Call => {
            let mut input = String::new();
            std::io::stdin().read_to_string(&mut input).context("reading command from stdin")?;
            let response = match serde_json::from_str::<Call>(&input) {
                Ok(call) => dispatcher.dispatch(call),
                Err(e) => Response::from_result(Err(palimpsest::Error::InvalidArgument(format!(
                    "malformed command: {}",
                    e
                )))),
            };
            println!("{}", serde_json::to_string(&response)?);
            if !response.is_ok() {
                std::process::exit(1);
            }
        }

        Commands::Init { force } => {
            let defaults = PalimpsestConfig {
                output_dir: Some(config::default_output_dir().display().to_string()),
                ..PalimpsestConfig::default()
            };
            if let Some(parent) = config_path.parent() {
                config::ensure_dir(parent)?;
            }
            config::write_config(&config_path, &defaults, force)?;
            ui::success(&format!("Wrote {}", config_path.display()));
        }
    }

    Ok(())
}

/// Run one wire command and render its outcome
fn respond(dispatcher: &Dispatcher, format: Option<&str>, request: Request, json: bool) -> anyhow::Result<()> {
    let command = request.name();
    let result = dispatcher.run(format, request);

    if json {
        let response = Response::from_result(result);
        println!("{}", serde_json::to_string_pretty(&response)?);
        if !response.is_ok() {
            anyhow::bail!("{} failed", command);
        }
        return Ok(());
    }

    match result? {
        Outcome::Detect(detection) => {
            if detection.detected {
                ui::success(&format!("Detected {}", detection.format.as_deref().unwrap_or("unknown")));
            } else {
                ui::warn("Not recognized");
            }
            if let Some(reason) = &detection.reason {
                ui::info("Reason", reason);
            }
        }
        Outcome::Ingest(ingested) => {
            ui::success(&format!("Ingested {}", ingested.artifact_id));
            ui::info("Blob", &ingested.blob_hash);
            ui::info("Size", &ui::human_bytes(ingested.size_bytes));
            for (key, value) in &ingested.metadata {
                ui::summary_row(key, value);
            }
        }
        Outcome::Enumerate(listing) => {
            if listing.entries.is_empty() {
                ui::warn("No entries");
            }
            for entry in &listing.entries {
                let size = if entry.is_dir {
                    ui::dim("dir")
                } else {
                    ui::dim(&ui::human_bytes(entry.size_bytes))
                };
                println!("{} {} {}", Icons::FILE, entry.path, size);
            }
        }
        Outcome::ExtractIr(extracted) => {
            if let Some(path) = &extracted.ir_path {
                ui::success(&format!("Wrote {}", path.display()));
            }
            ui::info("Loss class", &ui::loss(extracted.loss_class));
            if let Some(report) = &extracted.loss_report {
                render_report(report);
            }
        }
        Outcome::EmitNative(emitted) => {
            ui::success(&format!("Wrote {}", emitted.output_path.display()));
            ui::info("Format", &emitted.format);
            ui::info("Loss class", &ui::loss(emitted.loss_class));
            if let Some(report) = &emitted.loss_report {
                render_report(report);
            }
        }
    }
    Ok(())
}

fn convert(
    dispatcher: &Dispatcher,
    path: &Path,
    from: Option<&str>,
    to: Option<&str>,
    output_dir: &Path,
    keep_ir: bool,
    json: bool,
) -> anyhow::Result<()> {
    let codec = dispatcher.codec_for_source(from, path)?;
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let extraction = contract::extract(codec, &bytes, &ExtractOptions::for_path(path))?;

    if keep_ir {
        let ir_path = output_dir.join(persist::ir_file_name(&extraction.corpus.id));
        persist::write_ir(&ir_path, &extraction.corpus, false)?;
        tracing::info!("Kept IR at {}", ir_path.display());
    }

    let emitted = dispatcher.emit_native(to, &extraction.corpus, output_dir)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&Response::Ok(Outcome::EmitNative(emitted)))?);
        return Ok(());
    }

    ui::success(&format!("Wrote {}", emitted.output_path.display()));
    ui::info("Extract", &ui::loss(extraction.loss_class));
    ui::info("Emit", &ui::loss(emitted.loss_class));
    if !extraction.report.is_clean() {
        render_report(&extraction.report);
    }
    if let Some(report) = &emitted.loss_report {
        render_report(report);
    }
    Ok(())
}

fn verify(
    registry: &CodecRegistry,
    dispatcher: &Dispatcher,
    path: &Path,
    format: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let codec = match format {
        Some(name) => registry.get(name)?,
        None => dispatcher.codec_for_source(None, path)?,
    };
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let round_trip = verify_round_trip(codec, &bytes, &ExtractOptions::for_path(path))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&round_trip)?);
    } else {
        let yes_no = |b: bool| if b { "yes" } else { "no" };
        println!(
            "{}",
            ui::stats_table(&[
                ("Format", round_trip.format.as_str()),
                ("Extract class", round_trip.extract_class.as_str()),
                ("Emit class", round_trip.emit_class.as_str()),
                ("Byte identical", yes_no(round_trip.byte_identical)),
                ("IR identical", yes_no(round_trip.ir_identical)),
            ])
        );
    }

    if !round_trip.holds() {
        anyhow::bail!("round trip through {} did not hold", round_trip.format);
    }
    if !json {
        ui::success("Round trip holds");
    }
    Ok(())
}

fn run_batch(registry: &CodecRegistry, job: &BatchJob, json: bool) -> anyhow::Result<()> {
    if json {
        let spinner = Spinner::new("Converting");
        let summary = batch::run_batch(registry, job, None)?;
        spinner.finish_and_clear();
        let report = serde_json::json!({
            "converted": summary.converted,
            "replayed": summary.replayed,
            "skipped": summary.skipped,
            "failed": summary.failed,
            "by_class": summary.by_class.iter().map(|(class, n)| (class.to_string(), *n)).collect::<std::collections::BTreeMap<_, _>>(),
            "duration_ms": summary.duration.as_millis() as u64,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        if !summary.is_success() {
            anyhow::bail!("{} files failed", summary.failed.len());
        }
        return Ok(());
    }

    ui::header(&format!("Batch converting {}", job.pattern));
    ui::info("Output", &job.output_dir.display().to_string());
    let (mut progress, tx) = ProgressManager::new();
    let result = batch::run_batch(registry, job, Some(&tx));
    drop(tx);
    let summary = match result {
        Ok(summary) => summary,
        Err(e) => {
            progress.join();
            return Err(e.into());
        }
    };
    progress.finish_with_summary(&summary);

    if !summary.skipped.is_empty() {
        ui::section("Skipped");
        for (path, reason) in &summary.skipped {
            ui::file_skipped(path, reason);
        }
    }
    if !summary.failed.is_empty() {
        ui::section("Failed");
        for (path, message) in &summary.failed {
            ui::file_failed(path, message);
        }
    }
    if !summary.by_class.is_empty() {
        ui::section("Loss classes");
        let mut table = TableBuilder::new();
        for (class, count) in &summary.by_class {
            table.add_row(&format!("{} ({})", class, class.description()), &count.to_string());
        }
        println!("{}", table.build());
    }
    ui::timing(&format!("{:.2?}", summary.duration));

    if !summary.is_success() {
        anyhow::bail!("{} of {} files failed", summary.failed.len(), summary.total());
    }
    Ok(())
}

fn render_report(report: &LossReport) {
    ui::section(&format!(" {} -> {} ", report.source_format, report.target_format));
    for element in &report.lost_elements {
        ui::summary_row("lost", element);
    }
    for warning in &report.warnings {
        ui::summary_row("warning", warning);
    }
}

fn log_report(report: &LossReport) {
    for element in &report.lost_elements {
        tracing::warn!("lost: {}", element);
    }
    for warning in &report.warnings {
        tracing::warn!("{}", warning);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_long_help_lists_every_loss_class() {
        let text = long_about();
        for class in LossClass::all() {
            assert!(text.contains(&format!("{}  {}", class, class.description())), "{} missing", class);
        }
        assert!(!text.contains("presentation loss"));
    }
}
