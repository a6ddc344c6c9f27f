use std::{path::PathBuf, sync::Arc, time::Duration};

use arcstream_extract::{DiskSink, ExtractSummary, SinkOptions, extract_archive, open_archive};
use arcstream_progress::{NoProgressHandler, ProgressHandler};
use arcstream_transfer::{
    DEFAULT_POLL_INTERVAL, SourceLocator, StreamAdapter, TransferEngine, TransferSession,
};
use indicatif::ProgressBar;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, warn};

use crate::{
    error::WorkerError,
    report::{WorkerReport, WorkerSummary},
};

/// Settings shared by every worker of a run.
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    /// Directory the archives are extracted into.
    pub destination: PathBuf,
    pub sink: SinkOptions,
    /// Upper bound on a single wait for bytes from the transfer.
    pub poll_interval: Duration,
}

impl WorkerOptions {
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
            sink: SinkOptions::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Downloads one archive and extracts it while the bytes arrive.
///
/// The worker owns everything its archive needs. Resources are acquired in
/// the order session, adapter (with its buffer), decoder, sink and released
/// in reverse, whichever way the run ends.
pub struct Worker<E> {
    engine: Arc<E>,
    locator: SourceLocator,
    options: WorkerOptions,
    progress: Arc<dyn ProgressHandler>,
    cancellation: CancellationToken,
}

impl<E: TransferEngine> Worker<E> {
    pub fn new(engine: Arc<E>, locator: SourceLocator, options: WorkerOptions) -> Self {
        Self {
            engine,
            locator,
            options,
            progress: Arc::new(NoProgressHandler),
            cancellation: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressHandler>) -> Self {
        self.progress = progress;
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Runs the worker to completion on the current thread.
    ///
    /// Blocks while waiting for the transfer, so it must not be called from
    /// an async context.
    #[instrument(skip_all, fields(locator = %self.locator))]
    pub fn run(self) -> WorkerReport {
        let outcome = self.download_and_extract();
        match &outcome {
            Ok(summary) => debug!(
                entries = summary.entries,
                skipped = summary.skipped,
                bytes = summary.bytes_transferred,
                "finished"
            ),
            Err(err) if err.is_cancelled() => warn!("cancelled"),
            Err(err) => error!("{err}"),
        }
        WorkerReport {
            locator: self.locator,
            outcome,
        }
    }

    fn download_and_extract(&self) -> Result<WorkerSummary, WorkerError> {
        let session = self.engine.open(&self.locator)?;
        let content_length = session.content_length();
        let bar = self.progress_bar(content_length);

        let mut adapter = StreamAdapter::new(session)
            .with_poll_interval(self.options.poll_interval)
            .with_cancellation(self.cancellation.clone())
            .with_progress(bar.clone());
        let extracted = self.extract_from(&mut adapter);
        bar.finish_and_clear();

        let extracted = extracted?;
        Ok(WorkerSummary {
            entries: extracted.entries,
            skipped: extracted.skipped,
            bytes_transferred: adapter.bytes_transferred(),
            bytes_written: extracted.bytes_written,
        })
    }

    fn extract_from<S: TransferSession>(
        &self,
        adapter: &mut StreamAdapter<S>,
    ) -> Result<ExtractSummary, WorkerError> {
        let mut archive = open_archive(adapter)?;
        debug!(format = archive.format(), "archive opened");
        let mut sink = DiskSink::new(&self.options.destination, self.options.sink)?;

        let source = self.locator.as_str();
        let extracted = extract_archive(&mut archive, &mut sink, &mut |header| {
            self.progress.on_entry(source, &header.path)
        });
        drop(archive);

        let closed = sink.close();
        let extracted = extracted?;
        closed?;
        Ok(extracted)
    }

    fn progress_bar(&self, content_length: Option<u64>) -> ProgressBar {
        let bar = match content_length {
            Some(len) => ProgressBar::new(len),
            None => ProgressBar::no_length(),
        };
        let bar = bar
            .with_style(self.progress.bytes_style(content_length))
            .with_prefix(self.locator.file_name());
        self.progress.add_progress_bar(bar)
    }
}
