//! Moves archive bytes from a source locator to a pull-based decoder.
//!
//! Transfers are poll driven: a [`TransferSession`] hands out chunks as they
//! arrive. Decoders want to block on [`std::io::Read`]. The
//! [`StreamAdapter`] sits in between, buffering whatever the session
//! delivered and waiting on the session only when the decoder ran dry.

mod adapter;
mod buffer;
mod engine;
mod error;
mod locator;
mod session;

pub use adapter::{DEFAULT_DRAIN_LIMIT, StreamAdapter};
pub use buffer::TransferBuffer;
pub use engine::{
    DEFAULT_FILE_CHUNK_SIZE, DEFAULT_POLL_INTERVAL, FileSession, HttpEngine, HttpSession,
    RemoteSession, TransferConfig,
};
pub use error::TransferError;
pub use locator::SourceLocator;
pub use session::{TransferEngine, TransferPoll, TransferSession};
