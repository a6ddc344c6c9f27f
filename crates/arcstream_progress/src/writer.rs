use std::io::{self, Write};

use indicatif::MultiProgress;
use tracing_subscriber::fmt::MakeWriter;

use crate::global_multi_progress;

/// Writes log lines to `stderr` without tearing the progress bars.
#[derive(Clone)]
pub struct IndicatifWriter {
    multi_progress: MultiProgress,
}

impl IndicatifWriter {
    pub fn new(multi_progress: MultiProgress) -> Self {
        Self { multi_progress }
    }

    /// Runs `f` with the bars cleared from the terminal, if any are drawn.
    fn suspended<R>(&self, f: impl FnOnce() -> R) -> R {
        if self.multi_progress.is_hidden() {
            f()
        } else {
            self.multi_progress.suspend(f)
        }
    }
}

impl Default for IndicatifWriter {
    fn default() -> Self {
        Self::new(global_multi_progress())
    }
}

impl Write for IndicatifWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.suspended(|| io::stderr().lock().write(buf))
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        // A log line is written in one piece so the bars are redrawn once.
        self.suspended(|| io::stderr().lock().write_all(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.suspended(|| io::stderr().flush())
    }
}

impl<'a> MakeWriter<'a> for IndicatifWriter {
    type Writer = IndicatifWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
