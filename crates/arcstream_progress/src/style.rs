//! Styles for the transfer progress bars.
use std::fmt::Write;

use indicatif::{HumanBytes, ProgressState, ProgressStyle};

/// The characters to use to show progress in the progress bar.
const DEFAULT_PROGRESS_CHARS: &str = "━━╾─";

/// Returns the style of a transfer with a known size.
pub fn default_bytes_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "  {spinner:.dim} {prefix:20!} [{elapsed_precise}] [{bar:20!.bright.yellow/dim.white}] {bytes:>8} @ {smoothed_bytes_per_sec:8}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars(DEFAULT_PROGRESS_CHARS)
    .with_key("smoothed_bytes_per_sec", smoothed_bytes_per_sec)
}

/// Returns the style of a transfer whose size is not known up front.
pub fn unknown_length_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "  {spinner:.dim} {prefix:20!} [{elapsed_precise}] {bytes:>8} @ {smoothed_bytes_per_sec:8}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_spinner())
    .with_key("smoothed_bytes_per_sec", smoothed_bytes_per_sec)
}

fn smoothed_bytes_per_sec(state: &ProgressState, w: &mut dyn Write) {
    // Formatting errors only truncate the rendered line.
    let _ = match (state.pos(), state.elapsed().as_millis()) {
        (pos, elapsed_ms) if elapsed_ms > 0 => write!(
            w,
            "{}/s",
            HumanBytes((pos as f64 * 1000_f64 / elapsed_ms as f64) as u64)
        ),
        _ => write!(w, "-"),
    };
}
