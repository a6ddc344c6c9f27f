use std::{error::Error as StdError, io, sync::Arc};

use reqwest::StatusCode;
use thiserror::Error;
use url::Url;

/// Errors that can occur while moving bytes from a source locator.
#[derive(Debug, Clone, Error)]
pub enum TransferError {
    #[error(transparent)]
    Io(Arc<io::Error>),

    #[error("invalid source locator `{locator}`: {reason}")]
    InvalidLocator { locator: String, reason: String },

    #[error("unsupported scheme `{scheme}` for {url}")]
    UnsupportedScheme { url: Url, scheme: String },

    #[error("failed to download {url}: {status}")]
    HttpStatus { url: Url, status: StatusCode },

    #[error(transparent)]
    Reqwest(Arc<reqwest::Error>),

    #[error("transfer was cancelled")]
    Cancelled,
}

impl TransferError {
    /// Looks for a [`TransferError`] carried inside an [`io::Error`].
    ///
    /// Decoders only see [`io::Error`]s coming out of the stream adapter and
    /// frequently wrap them again with their own context, so the whole source
    /// chain is searched.
    pub fn find_in(err: &io::Error) -> Option<&TransferError> {
        let mut current: Option<&(dyn StdError + 'static)> =
            err.get_ref().map(|inner| inner as &(dyn StdError + 'static));
        while let Some(candidate) = current {
            if let Some(transfer) = candidate.downcast_ref::<TransferError>() {
                return Some(transfer);
            }
            current = match candidate.downcast_ref::<io::Error>() {
                Some(io_err) => io_err
                    .get_ref()
                    .map(|inner| inner as &(dyn StdError + 'static)),
                None => candidate.source(),
            };
        }
        None
    }
}

impl From<io::Error> for TransferError {
    fn from(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

impl From<reqwest::Error> for TransferError {
    fn from(err: reqwest::Error) -> Self {
        Self::Reqwest(Arc::new(err))
    }
}

impl From<TransferError> for io::Error {
    fn from(err: TransferError) -> Self {
        // `Interrupted` is retried by std readers, never report it.
        let kind = match &err {
            TransferError::Io(inner) if inner.kind() != io::ErrorKind::Interrupted => inner.kind(),
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}
