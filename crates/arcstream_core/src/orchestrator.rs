use std::{any::Any, sync::Arc};

use arcstream_progress::{NoProgressHandler, ProgressHandler};
use arcstream_transfer::{SourceLocator, TransferEngine};
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    error::{OrchestratorError, WorkerError},
    report::WorkerReport,
    worker::{Worker, WorkerOptions},
};

/// Runs one [`Worker`] per source locator and waits for all of them.
///
/// Workers share nothing but the engine, which stays alive until the last
/// worker has finished.
pub struct Orchestrator<E> {
    engine: Arc<E>,
    options: WorkerOptions,
    progress: Arc<dyn ProgressHandler>,
    cancellation: CancellationToken,
}

impl<E> Orchestrator<E>
where
    E: TransferEngine + 'static,
{
    pub fn new(engine: Arc<E>, options: WorkerOptions) -> Self {
        Self {
            engine,
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

    /// Cancels every running worker once `cancellation` is triggered.
    #[must_use]
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Starts a worker for every locator and returns their reports in the
    /// order of `locators`.
    pub async fn run(
        &self,
        locators: Vec<SourceLocator>,
    ) -> Result<Vec<WorkerReport>, OrchestratorError> {
        if locators.is_empty() {
            return Err(OrchestratorError::NoLocators);
        }
        debug!("starting {} workers", locators.len());

        let workers = locators.into_iter().map(|locator| {
            let worker = Worker::new(self.engine.clone(), locator.clone(), self.options.clone())
                .with_progress(self.progress.clone())
                .with_cancellation(self.cancellation.clone());
            let handle = tokio::task::spawn_blocking(move || worker.run());
            async move {
                match handle.await {
                    Ok(report) => report,
                    Err(err) => WorkerReport {
                        locator,
                        outcome: Err(WorkerError::Panicked(if err.is_panic() {
                            panic_message(err.into_panic())
                        } else {
                            err.to_string()
                        })),
                    },
                }
            }
        });
        let reports = join_all(workers).await;

        let failed = reports.iter().filter(|report| !report.is_success()).count();
        info!(
            "{} of {} archives extracted",
            reports.len() - failed,
            reports.len()
        );
        Ok(reports)
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => payload
            .downcast_ref::<&str>()
            .map_or_else(|| "unknown panic".to_string(), |message| message.to_string()),
    }
}
