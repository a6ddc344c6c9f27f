use std::path::Path;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::{global_multi_progress, style};

/// Abstraction over progress reporting so callers can hook into their own UI.
pub trait ProgressHandler: Send + Sync {
    /// Adds a progress bar to the underlying renderer, returning the wrapped bar.
    fn add_progress_bar(&self, bar: ProgressBar) -> ProgressBar;

    /// Returns the style to use for a transfer of `len` bytes, if known.
    fn bytes_style(&self, len: Option<u64>) -> ProgressStyle {
        match len {
            Some(_) => style::default_bytes_style(),
            None => style::unknown_length_style(),
        }
    }

    /// Called for every entry of `source` that was written to disk.
    fn on_entry(&self, _source: &str, _path: &Path) {}
}

/// Draws nothing.
#[derive(Clone, Default)]
pub struct NoProgressHandler;

impl ProgressHandler for NoProgressHandler {
    fn add_progress_bar(&self, bar: ProgressBar) -> ProgressBar {
        bar.set_draw_target(ProgressDrawTarget::hidden());
        bar
    }
}

/// Stacks the bars of every transfer on a [`MultiProgress`].
#[derive(Clone)]
pub struct MultiProgressHandler {
    multi_progress: MultiProgress,
}

impl MultiProgressHandler {
    pub fn new(multi_progress: MultiProgress) -> Self {
        Self { multi_progress }
    }
}

impl Default for MultiProgressHandler {
    fn default() -> Self {
        Self::new(global_multi_progress())
    }
}

impl ProgressHandler for MultiProgressHandler {
    fn add_progress_bar(&self, bar: ProgressBar) -> ProgressBar {
        self.multi_progress.add(bar)
    }
}
