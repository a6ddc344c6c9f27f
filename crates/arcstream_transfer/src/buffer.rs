use bytes::{Buf, BytesMut};

/// Bytes received from a transfer that the decoder has not consumed yet.
///
/// Consumed bytes are dropped from the front of the buffer and the storage is
/// reused for later appends, so the buffer never grows past the largest batch
/// that was pending at one time.
#[derive(Debug, Default)]
pub struct TransferBuffer {
    pending: BytesMut,
    total: u64,
}

impl TransferBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pending: BytesMut::with_capacity(capacity),
            total: 0,
        }
    }

    /// Appends a chunk delivered by the transfer, returning the number of
    /// bytes appended.
    pub fn append(&mut self, chunk: &[u8]) -> usize {
        if chunk.is_empty() {
            return 0;
        }
        self.pending.extend_from_slice(chunk);
        self.total += chunk.len() as u64;
        chunk.len()
    }

    /// The bytes that have not been consumed yet.
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Marks `amt` pending bytes as consumed and releases them.
    pub fn consume(&mut self, amt: usize) {
        let amt = amt.min(self.pending.len());
        self.pending.advance(amt);
    }

    /// Total number of bytes ever appended.
    pub fn total_appended(&self) -> u64 {
        self.total
    }

    /// Size of the allocation currently backing the buffer.
    pub fn capacity(&self) -> usize {
        self.pending.capacity()
    }
}
