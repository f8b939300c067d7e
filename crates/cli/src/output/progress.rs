//! Progress display for a sync pass
//!
//! A spinner covers scanning, listing and planning; once transfer starts it
//! turns into a byte bar over uploads and skips together.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use sync_core::{FileOutcome, ProgressSink, Stage};

use super::OutputConfig;

/// [`ProgressSink`] drawing to stderr with indicatif
///
/// Hidden in quiet, JSON and `--no-progress` modes.
#[derive(Debug)]
pub struct SyncProgress {
    bar: Option<ProgressBar>,
}

impl SyncProgress {
    pub fn new(config: &OutputConfig) -> Self {
        let bar = config.shows_progress().then(|| {
            let bar = ProgressBar::new_spinner();
            bar.set_style(spinner_style());
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        });
        Self { bar }
    }

    /// Check if progress bar is visible
    pub fn is_visible(&self) -> bool {
        self.bar.is_some()
    }

    /// Show a message next to the spinner or bar
    pub fn set_message(&self, message: &str) {
        if let Some(bar) = &self.bar {
            bar.set_message(message.to_string());
        }
    }

    /// Finish and clear the progress bar
    pub fn finish_and_clear(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

impl ProgressSink for SyncProgress {
    fn stage(&self, stage: Stage) {
        let Some(bar) = &self.bar else {
            return;
        };
        match stage {
            Stage::Scanning => bar.set_message("Scanning folder"),
            Stage::Listing => bar.set_message("Listing bucket"),
            Stage::Planning => bar.set_message("Comparing fingerprints"),
            Stage::Transferring { total_bytes } => {
                bar.set_style(bytes_style());
                bar.set_length(total_bytes);
                bar.set_position(0);
                bar.set_message("Uploading");
            }
        }
    }

    fn bytes_transferred(&self, bytes: u64) {
        if let Some(bar) = &self.bar {
            bar.inc(bytes);
        }
    }

    fn file_finished(&self, key: &str, outcome: FileOutcome) {
        if let (Some(bar), FileOutcome::Failed) = (&self.bar, outcome) {
            bar.set_message(format!("Failed: {key}"));
        }
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn bytes_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} {msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
        .map(|style| style.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}
