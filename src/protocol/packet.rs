//! Fixed-capacity frame buffers shared between the bus interrupt and the main loop

use crate::config::{INBOUND_CAPACITY, REPLY_CAPACITY};

/// Bytes of the write transaction in progress, checksum included.
pub struct InboundFrame {
    buffer: [u8; INBOUND_CAPACITY],
    length: usize,
    available: bool,
}

impl InboundFrame {
    pub const fn new() -> Self {
        Self {
            buffer: [0; INBOUND_CAPACITY],
            length: 0,
            available: false,
        }
    }

    /// Rewinds the cursor for a new transaction.
    pub fn restart(&mut self) {
        self.length = 0;
        self.available = true;
    }

    /// Appends one byte. Once the buffer is full it stops accepting until the
    /// next `restart`, so an oversized frame keeps only its first bytes.
    pub fn push(&mut self, byte: u8) -> bool {
        if self.length == INBOUND_CAPACITY {
            self.available = false;
        }
        if !self.available {
            return false;
        }
        self.buffer[self.length] = byte;
        self.length += 1;
        true
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer[..self.length]
    }
}

impl Default for InboundFrame {
    fn default() -> Self {
        Self::new()
    }
}

/// Reply drained by the next read transaction.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ReplyFrame {
    buffer: [u8; REPLY_CAPACITY],
    length: usize,
}

impl ReplyFrame {
    pub const fn empty() -> Self {
        Self {
            buffer: [0; REPLY_CAPACITY],
            length: 0,
        }
    }

    /// Copies at most `REPLY_CAPACITY` bytes of `bytes`.
    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut reply = Self::empty();
        for &byte in bytes {
            reply.push(byte);
        }
        reply
    }

    /// Appends a byte, silently dropping it when full.
    pub fn push(&mut self, byte: u8) -> &mut Self {
        if self.length < REPLY_CAPACITY {
            self.buffer[self.length] = byte;
            self.length += 1;
        }
        self
    }

    pub fn get(&self, index: usize) -> Option<u8> {
        self.as_bytes().get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer[..self.length]
    }
}

impl Default for ReplyFrame {
    fn default() -> Self {
        Self::empty()
    }
}
