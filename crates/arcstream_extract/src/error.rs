use std::{io, path::PathBuf, sync::Arc};

use arcstream_transfer::TransferError;
use thiserror::Error;

/// Errors raised while opening an archive stream.
#[derive(Debug, Clone, Error)]
pub enum OpenError {
    #[error("the source did not yield any bytes")]
    EmptyStream,

    #[error("the stream is not a tar archive")]
    NotAnArchive,

    #[error("archive format `{0}` is currently unsupported")]
    UnsupportedFormat(&'static str),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Errors produced by the decoder while reading the archive stream.
///
/// Any of these leaves the stream position unknown, the rest of the archive
/// cannot be trusted afterwards.
#[derive(Debug, Clone, Error)]
pub enum DecodeError {
    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error("corrupt archive stream: {0}")]
    Corrupt(Arc<io::Error>),
}

impl From<io::Error> for DecodeError {
    fn from(err: io::Error) -> Self {
        match TransferError::find_in(&err) {
            Some(transfer) => Self::Transfer(transfer.clone()),
            None => Self::Corrupt(Arc::new(err)),
        }
    }
}

impl From<zip::result::ZipError> for DecodeError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(err) => err.into(),
            err => Self::Corrupt(Arc::new(io::Error::other(err))),
        }
    }
}

/// Errors raised by an entry sink.
#[derive(Debug, Clone, Error)]
pub enum SinkError {
    #[error(transparent)]
    Io(Arc<io::Error>),

    #[error("refusing to write `{}` outside of the destination", .0.display())]
    UnsafePath(PathBuf),

    #[error("cannot extract `{}`: {kind} entries are not supported", path.display())]
    UnsupportedEntry { path: PathBuf, kind: &'static str },

    #[error("received data for `{}` which is not a regular file", .0.display())]
    NotAFile(PathBuf),

    #[error("received data without an entry header")]
    NoOpenEntry,
}

impl From<io::Error> for SinkError {
    fn from(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

/// Errors that stop the extraction of an archive.
#[derive(Debug, Clone, Error)]
pub enum ExtractError {
    #[error("failed to decode the archive")]
    Decode(#[from] DecodeError),

    #[error("failed to write `{}`", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: SinkError,
    },
}
