use std::{
    io::{self, Write},
    path::Path,
};

use arcstream_progress::{MultiProgressHandler, ProgressHandler, global_multi_progress};
use indicatif::{MultiProgress, ProgressBar};

/// Draws the transfer bars and prints every extracted path to stdout.
pub struct ConsoleReporter {
    bars: MultiProgressHandler,
    multi_progress: MultiProgress,
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        let multi_progress = global_multi_progress();
        Self {
            bars: MultiProgressHandler::new(multi_progress.clone()),
            multi_progress,
        }
    }
}

impl ProgressHandler for ConsoleReporter {
    fn add_progress_bar(&self, bar: ProgressBar) -> ProgressBar {
        self.bars.add_progress_bar(bar)
    }

    fn on_entry(&self, _source: &str, path: &Path) {
        self.multi_progress.suspend(|| {
            // A closed stdout must not abort the extraction.
            let _ = writeln!(io::stdout().lock(), "{}", path.display());
        });
    }
}
