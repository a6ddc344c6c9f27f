use std::fmt;

use arcstream_transfer::SourceLocator;

use crate::error::WorkerError;

/// Counters of a worker that extracted its whole archive.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSummary {
    /// Entries written to disk.
    pub entries: usize,
    /// Entries the destination refused to create.
    pub skipped: usize,
    /// Bytes received from the source.
    pub bytes_transferred: u64,
    /// Payload bytes written to disk.
    pub bytes_written: u64,
}

/// The result of running a worker for one locator.
#[derive(Debug, Clone)]
pub struct WorkerReport {
    pub locator: SourceLocator,
    pub outcome: Result<WorkerSummary, WorkerError>,
}

impl WorkerReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

impl fmt::Display for WorkerReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            Ok(summary) => write!(
                f,
                "{}: extracted {} entries ({} skipped)",
                self.locator, summary.entries, summary.skipped
            ),
            Err(err) => write!(f, "{}: {err}", self.locator),
        }
    }
}
