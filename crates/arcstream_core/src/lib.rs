//! Downloads archives and extracts them while they stream in.
//!
//! Every source locator gets its own [`Worker`] that owns the whole pipeline
//! for that archive: transfer session, stream adapter, decoder and disk sink.
//! The [`Orchestrator`] runs one worker per locator on the blocking thread
//! pool and collects a [`WorkerReport`] from each.

mod error;
mod orchestrator;
mod report;
mod worker;

pub use error::{OrchestratorError, WorkerError};
pub use orchestrator::Orchestrator;
pub use report::{WorkerReport, WorkerSummary};
pub use worker::{Worker, WorkerOptions};
