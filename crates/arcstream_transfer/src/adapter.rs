use std::{
    io::{self, BufRead, Read},
    time::Duration,
};

use indicatif::ProgressBar;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::{
    buffer::TransferBuffer,
    engine::DEFAULT_POLL_INTERVAL,
    error::TransferError,
    session::{TransferPoll, TransferSession},
};

/// Upper bound on the bytes collected by a single pull once data is flowing.
pub const DEFAULT_DRAIN_LIMIT: usize = 256 * 1024;

/// Adapts a poll-driven [`TransferSession`] to the blocking, pull-based
/// [`Read`] and [`BufRead`] interfaces decoders expect.
///
/// The adapter owns the session and the buffer of one transfer. Fields drop
/// in declaration order, so the session is closed before the buffer is freed.
pub struct StreamAdapter<S> {
    session: S,
    buffer: TransferBuffer,
    poll_interval: Duration,
    drain_limit: usize,
    finished: bool,
    deferred: Option<TransferError>,
    cancellation: CancellationToken,
    progress: Option<ProgressBar>,
}

impl<S: TransferSession> StreamAdapter<S> {
    pub fn new(session: S) -> Self {
        Self {
            session,
            buffer: TransferBuffer::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            drain_limit: DEFAULT_DRAIN_LIMIT,
            finished: false,
            deferred: None,
            cancellation: CancellationToken::new(),
            progress: None,
        }
    }

    /// Sets the longest time a single wait on the session may block.
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Sets how many bytes a pull collects before handing them out, when more
    /// chunks are ready without waiting.
    #[must_use]
    pub fn with_drain_limit(mut self, drain_limit: usize) -> Self {
        self.drain_limit = drain_limit.max(1);
        self
    }

    /// Fails pending and future pulls once `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Advances `bar` by every byte received.
    #[must_use]
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.progress = Some(bar);
        self
    }

    /// Pulls the next batch of bytes from the transfer.
    ///
    /// Blocks until at least one new byte arrived or the transfer finished.
    /// Returns exactly the bytes appended during this call; an empty slice
    /// signals the end of the stream. A failure that happens after some bytes
    /// of a batch arrived is reported by the next pull.
    pub fn pull(&mut self) -> Result<&[u8], TransferError> {
        if let Some(err) = self.deferred.take() {
            return Err(err);
        }
        let start = self.buffer.pending_len();
        while !self.finished {
            if self.cancellation.is_cancelled() {
                return Err(TransferError::Cancelled);
            }

            let received = self.buffer.pending_len() - start;
            if received >= self.drain_limit {
                break;
            }
            let wait = if received > 0 {
                Duration::ZERO
            } else {
                self.poll_interval
            };

            let poll = match self.session.poll_chunk(wait) {
                Ok(poll) => poll,
                Err(err) if received > 0 => {
                    self.deferred = Some(err);
                    break;
                }
                Err(err) => return Err(err),
            };
            match poll {
                TransferPoll::Data(chunk) => {
                    let appended = self.buffer.append(&chunk);
                    if let Some(progress) = &self.progress {
                        progress.inc(appended as u64);
                    }
                }
                TransferPoll::Idle if received > 0 => break,
                TransferPoll::Idle => trace!("no bytes within {:?}", self.poll_interval),
                TransferPoll::Finished => {
                    trace!(total = self.buffer.total_appended(), "transfer finished");
                    self.finished = true;
                }
            }
        }
        Ok(&self.buffer.pending()[start..])
    }

    /// True once the session reported the end of the transfer.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Number of bytes received from the session so far.
    pub fn bytes_transferred(&self) -> u64 {
        self.buffer.total_appended()
    }

    pub fn session(&self) -> &S {
        &self.session
    }
}

impl<S: TransferSession> BufRead for StreamAdapter<S> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.buffer.pending_len() == 0 {
            self.pull()?;
        }
        Ok(self.buffer.pending())
    }

    fn consume(&mut self, amt: usize) {
        self.buffer.consume(amt);
    }
}

impl<S: TransferSession> Read for StreamAdapter<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.fill_buf()?;
        let len = available.len().min(buf.len());
        buf[..len].copy_from_slice(&available[..len]);
        self.consume(len);
        Ok(len)
    }
}
