use std::time::Duration;

use bytes::Bytes;

use crate::{error::TransferError, locator::SourceLocator};

/// Result of asking a session to make progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferPoll {
    /// A chunk of bytes arrived.
    Data(Bytes),
    /// The transfer is still active but nothing arrived within the wait.
    Idle,
    /// The transfer completed, no more bytes will arrive.
    Finished,
}

/// A single in-progress transfer.
pub trait TransferSession: Send {
    /// Advances the transfer, waiting at most `wait` for the next chunk.
    ///
    /// A zero `wait` only collects bytes that are already available.
    fn poll_chunk(&mut self, wait: Duration) -> Result<TransferPoll, TransferError>;

    /// The total size of the transfer if the source announced it.
    fn content_length(&self) -> Option<u64> {
        None
    }
}

impl<S: TransferSession + ?Sized> TransferSession for Box<S> {
    fn poll_chunk(&mut self, wait: Duration) -> Result<TransferPoll, TransferError> {
        (**self).poll_chunk(wait)
    }

    fn content_length(&self) -> Option<u64> {
        (**self).content_length()
    }
}

/// Process-wide transfer state that opens sessions for locators.
pub trait TransferEngine: Send + Sync {
    type Session: TransferSession;

    /// Registers a transfer for `locator`.
    fn open(&self, locator: &SourceLocator) -> Result<Self::Session, TransferError>;
}
