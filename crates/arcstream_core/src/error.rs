use arcstream_extract::{ExtractError, OpenError, SinkError};
use arcstream_transfer::TransferError;
use thiserror::Error;

/// Reasons a worker stopped before the whole archive was extracted.
#[derive(Debug, Clone, Error)]
pub enum WorkerError {
    #[error("failed to start the transfer")]
    Transfer(#[from] TransferError),

    #[error("failed to open the archive")]
    Open(#[from] OpenError),

    #[error("failed to write to the destination")]
    Sink(#[from] SinkError),

    #[error("failed to extract the archive")]
    Extract(#[from] ExtractError),

    #[error("the worker panicked: {0}")]
    Panicked(String),
}

impl WorkerError {
    /// The transfer failure behind this error, at whatever stage it surfaced.
    pub fn transfer_error(&self) -> Option<&TransferError> {
        use arcstream_extract::DecodeError;

        match self {
            WorkerError::Transfer(err)
            | WorkerError::Open(OpenError::Decode(DecodeError::Transfer(err)))
            | WorkerError::Extract(ExtractError::Decode(DecodeError::Transfer(err))) => Some(err),
            _ => None,
        }
    }

    /// True if the worker stopped because its transfer was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.transfer_error(), Some(TransferError::Cancelled))
    }
}

/// Errors that prevent the orchestrator from starting any worker.
#[derive(Debug, Clone, Error)]
pub enum OrchestratorError {
    #[error("no source locators were given")]
    NoLocators,
}
