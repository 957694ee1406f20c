//! Channel receiver with a put-back buffer
//!
//! [`Receiver`] wraps a `crossbeam_channel::Receiver<ChannelMessage<T>>`
//! with a put-back buffer, providing `recv`, `peek`, `put_back`, and
//! `drain_before`. It unwraps `ChannelMessage` transparently and remembers
//! end-of-stream, so later calls return `Shutdown` once the buffer is empty.

use crossbeam_channel::Receiver as CrossbeamReceiver;
use std::collections::VecDeque;
use std::time::Duration;

use super::errors::{WorkError, WorkResult};
use super::sender::ChannelMessage;

/// A crossbeam receiver with a put-back buffer and sticky end-of-stream
pub struct Receiver<T> {
    receiver: CrossbeamReceiver<ChannelMessage<T>>,
    buffer: VecDeque<T>,
    eos: bool,
}

impl<T> Receiver<T> {
    pub fn new(receiver: CrossbeamReceiver<ChannelMessage<T>>) -> Self {
        Self {
            receiver,
            buffer: VecDeque::new(),
            eos: false,
        }
    }

    /// Blocking receive. Returns from the put-back buffer first, then
    /// falls through to the underlying channel.
    ///
    /// Returns `Err(WorkError::Shutdown)` once the buffer is empty and
    /// end-of-stream has been seen (now or earlier) or all senders are gone.
    pub fn recv(&mut self) -> WorkResult<T> {
        if let Some(item) = self.buffer.pop_front() {
            return Ok(item);
        }
        if self.eos {
            return Err(WorkError::Shutdown);
        }

        match self.receiver.recv() {
            Ok(ChannelMessage::Sample(item)) => Ok(item),
            Ok(ChannelMessage::EndOfStream) => {
                self.eos = true;
                tracing::debug!("Receiver::recv() - EndOfStream received");
                Err(WorkError::Shutdown)
            }
            Err(_) => {
                self.eos = true;
                tracing::debug!("Receiver::recv() - channel disconnected, returning Shutdown");
                Err(WorkError::Shutdown)
            }
        }
    }

    /// Peek at the front item, blocking on the channel if the buffer is empty.
    pub fn peek(&mut self) -> WorkResult<&T> {
        if self.buffer.is_empty() {
            let item = self.recv()?;
            self.buffer.push_back(item);
        }
        self.buffer.front().ok_or(WorkError::Shutdown)
    }

    /// Receive without blocking. `Disconnected` after end-of-stream.
    pub fn try_recv(&mut self) -> Result<T, crossbeam_channel::TryRecvError> {
        if let Some(item) = self.buffer.pop_front() {
            return Ok(item);
        }
        if self.eos {
            return Err(crossbeam_channel::TryRecvError::Disconnected);
        }

        match self.receiver.try_recv() {
            Ok(ChannelMessage::Sample(item)) => Ok(item),
            Ok(ChannelMessage::EndOfStream) => {
                self.eos = true;
                Err(crossbeam_channel::TryRecvError::Disconnected)
            }
            Err(e) => Err(e),
        }
    }

    /// Receive with a timeout. Buffered items are returned immediately.
    pub fn recv_timeout(
        &mut self,
        timeout: Duration,
    ) -> Result<T, crossbeam_channel::RecvTimeoutError> {
        if let Some(item) = self.buffer.pop_front() {
            return Ok(item);
        }
        if self.eos {
            return Err(crossbeam_channel::RecvTimeoutError::Disconnected);
        }

        match self.receiver.recv_timeout(timeout) {
            Ok(ChannelMessage::Sample(item)) => Ok(item),
            Ok(ChannelMessage::EndOfStream) => {
                self.eos = true;
                Err(crossbeam_channel::RecvTimeoutError::Disconnected)
            }
            Err(e) => Err(e),
        }
    }

    /// Push an item back so the next `recv()` returns it.
    pub fn put_back(&mut self, item: T) {
        self.buffer.push_front(item);
    }

    /// Check if there are any buffered items.
    pub fn has_buffered(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// Whether end-of-stream has been observed on the channel
    pub fn is_closed(&self) -> bool {
        self.eos
    }

    /// Discard every item that ends at or before `before`.
    ///
    /// Items are run-length encoded: each is valid from its start until the
    /// next item's start, so the item covering `before` is kept. The last
    /// item of a closed stream extends to infinity and is always kept.
    pub fn drain_before(
        &mut self,
        before: u64,
        start_fn: impl Fn(&T) -> u64,
    ) -> WorkResult<()> {
        loop {
            let current = self.recv()?;
            let next_start = match self.peek() {
                Ok(next) => start_fn(next),
                Err(WorkError::Shutdown) => {
                    self.put_back(current);
                    return Ok(());
                }
                Err(e) => return Err(e),
            };
            if next_start > before {
                self.put_back(current);
                return Ok(());
            }
        }
    }
}
