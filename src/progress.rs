// src/progress.rs

//! Download progress display
//!
//! Wraps indicatif's `MultiProgress` so concurrent suffix downloads each get
//! a bar. A hidden instance draws nothing, for tests and quiet runs.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Progress bars for concurrent downloads
pub struct DownloadProgress {
    multi: MultiProgress,
}

impl DownloadProgress {
    /// Progress drawn to stderr
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
        }
    }

    /// Progress that draws nothing
    pub fn hidden() -> Self {
        Self {
            multi: MultiProgress::with_draw_target(ProgressDrawTarget::hidden()),
        }
    }

    /// Create a bar for one download; length is set once the size is known
    pub fn add_download(&self, name: &str) -> ProgressBar {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{msg:>12} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})")
                .expect("Invalid progress bar template")
                .progress_chars("=>-"),
        );
        pb.set_message(name.to_string());
        self.multi.add(pb)
    }

    /// Mark a download as complete
    pub fn finish_download(pb: &ProgressBar, name: &str) {
        pb.finish_with_message(format!("{} [done]", name));
    }

    /// Mark a download as failed
    pub fn fail_download(pb: &ProgressBar, name: &str) {
        pb.abandon_with_message(format!("{} [FAILED]", name));
    }
}

impl Default for DownloadProgress {
    fn default() -> Self {
        Self::new()
    }
}
