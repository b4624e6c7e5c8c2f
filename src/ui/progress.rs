use crate::batch::BatchSummary;
use crate::ui::progress_message::{ProgressMessage, ProgressPhase};
use crate::ui::theme;
use crate::ui::Icons;
use indicatif::{HumanDuration, MultiProgress, ProgressBar};
use owo_colors::OwoColorize;
use std::thread;
use std::time::Duration;

pub struct ProgressManager {
    mp: MultiProgress,
    converting: ProgressBar,
    handle: Option<thread::JoinHandle<()>>,
}

impl ProgressManager {
    pub fn new() -> (Self, crossbeam::channel::Sender<ProgressMessage>) {
        let (tx, rx) = crossbeam::channel::unbounded::<ProgressMessage>();

        let mp = MultiProgress::new();
        let converting = mp.add(ProgressBar::new(0).with_message("Converting files"));
        let converting = if console::Term::stderr().is_term() {
            converting
        } else {
            ProgressBar::hidden()
        };

        let converting_clone = converting.clone();
        let handle = thread::spawn(move || {
            for msg in rx {
                match msg {
                    ProgressMessage::Started {
                        phase: ProgressPhase::Scanning,
                        ..
                    } => {
                        converting_clone.set_message("Scanning inputs");
                        converting_clone.enable_steady_tick(Duration::from_millis(100));
                    }
                    ProgressMessage::Started {
                        phase: ProgressPhase::Converting,
                        total,
                    } => {
                        converting_clone.set_length(total as u64);
                        converting_clone.set_message("Converting files");
                    }
                    ProgressMessage::Progress {
                        phase: ProgressPhase::Converting,
                        current,
                        file,
                    } => {
                        converting_clone.set_position(current as u64);
                        if let Some(ref f) = file {
                            converting_clone.set_message(format!("Converted: {}", f));
                        }
                    }
                    ProgressMessage::Finished {
                        phase: ProgressPhase::Converting,
                    } => {
                        converting_clone.finish_with_message("Done");
                    }
                    _ => {}
                }
            }
        });

        (
            Self {
                mp,
                converting,
                handle: Some(handle),
            },
            tx,
        )
    }

    pub fn clear(&self) {
        self.mp.clear().ok();
    }

    /// Wait for the progress thread to drain; every sender must be dropped first
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        self.converting.finish_and_clear();
    }

    pub fn finish_with_summary(&mut self, summary: &BatchSummary) {
        self.join();
        self.clear();
        println!();
        let (icon, style) = if summary.is_success() {
            (Icons::CHECK, theme().success.clone())
        } else {
            (Icons::WARN, theme().warn.clone())
        };
        println!(
            "{} {}",
            icon,
            format!("Complete in {}", HumanDuration(summary.duration)).style(style)
        );
        println!(
            "  {} {} converted  {} {} replayed  {} skipped  {} failed",
            Icons::FILE.style(theme().info.clone()),
            summary.converted,
            Icons::REPLAY.style(theme().info.clone()),
            summary.replayed,
            summary.skipped.len(),
            summary.failed.len()
        );
    }
}

pub struct Spinner {
    pb: ProgressBar,
}

impl Spinner {
    pub fn new(message: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_message(message.to_string());
        if console::Term::stderr().is_term() {
            pb.enable_steady_tick(Duration::from_millis(100));
        } else {
            pb.set_draw_target(indicatif::ProgressDrawTarget::hidden());
        }
        Self { pb }
    }

    pub fn finish_and_clear(&self) {
        self.pb.finish_and_clear();
    }
}
