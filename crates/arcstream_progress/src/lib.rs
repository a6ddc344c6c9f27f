//! Progress reporting for concurrently running transfers.
mod handler;
pub mod style;
mod writer;

use std::sync::LazyLock;

use indicatif::{MultiProgress, ProgressDrawTarget};

pub use handler::{MultiProgressHandler, NoProgressHandler, ProgressHandler};
pub use writer::IndicatifWriter;

/// Returns the process wide [`MultiProgress`].
///
/// Log output is routed through the same instance by [`IndicatifWriter`], so
/// bars added here are suspended while a log line is printed.
pub fn global_multi_progress() -> MultiProgress {
    static GLOBAL_MP: LazyLock<MultiProgress> = LazyLock::new(|| {
        let mp = MultiProgress::new();
        mp.set_draw_target(ProgressDrawTarget::stderr_with_hz(20));
        mp
    });
    GLOBAL_MP.clone()
}
