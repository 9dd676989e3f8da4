//! Batches of requests sent with a single `send`.

use super::builder::MessageBuilder;
use super::error::{Error, Result};
use super::message::{MessageIter, nlmsg_align};

/// Several netlink messages laid out back to back in one buffer.
///
/// A message that does not fit is rejected with [`Error::BufferFull`] and
/// leaves the batch unchanged, so the caller can send what is there,
/// [`reset`](Self::reset), and retry.
#[derive(Debug)]
pub struct Batch<'buf> {
    buf: &'buf mut [u8],
    len: usize,
    count: usize,
}

impl<'buf> Batch<'buf> {
    /// Start an empty batch in `buf`.
    pub fn new(buf: &'buf mut [u8]) -> Self {
        Self {
            buf,
            len: 0,
            count: 0,
        }
    }

    /// Build the next message in place.
    ///
    /// If `build` fails the message is discarded.
    pub fn push<F>(&mut self, build: F) -> Result<()>
    where
        F: FnOnce(&mut MessageBuilder<'_>) -> Result<()>,
    {
        let mut builder = MessageBuilder::new(&mut self.buf[self.len..])?;
        build(&mut builder)?;
        let len = builder.len();
        self.len += len;
        self.count += 1;
        Ok(())
    }

    /// Copy an already built message into the batch.
    pub fn push_raw(&mut self, msg: &[u8]) -> Result<()> {
        let size = nlmsg_align(msg.len());
        let end = self.len + size;
        if end > self.buf.len() {
            return Err(Error::BufferFull {
                needed: end,
                capacity: self.buf.len(),
            });
        }
        self.buf[self.len..self.len + msg.len()].copy_from_slice(msg);
        self.buf[self.len + msg.len()..end].fill(0);
        self.len = end;
        self.count += 1;
        Ok(())
    }

    /// The batched messages, ready to send.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Iterate the batched messages.
    pub fn messages(&self) -> MessageIter<'_> {
        MessageIter::new(self.as_bytes())
    }

    /// Bytes used so far.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if no message has been added.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Number of messages in the batch.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Bytes still free.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.len
    }

    /// Drop every message and start over.
    pub fn reset(&mut self) {
        self.len = 0;
        self.count = 0;
    }
}
