use std::time::{Duration, Instant};

use spinel_transport::ByteTransport;
use tracing::{debug, trace};

use crate::codec::Message;
use crate::error::{FrameError, Result};
use crate::framer::{FramerConfig, FramerEvent, StreamFramer};

/// Reads frames from a [`ByteTransport`], one byte per poll.
///
/// Partial-frame state lives in the framer and survives read timeouts, so a
/// caller may interleave polls with other work.
pub struct FrameReader<T> {
    inner: T,
    framer: StreamFramer,
}

impl<T: ByteTransport> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FramerConfig::default())
    }

    /// Create a new frame reader with explicit framer configuration.
    pub fn with_config(inner: T, config: FramerConfig) -> Self {
        Self {
            inner,
            framer: StreamFramer::with_config(config),
        }
    }

    /// Read at most one byte and feed it to the framer.
    ///
    /// Returns `Ok(None)` on a read timeout or when the byte completed nothing.
    pub fn poll_event(&mut self) -> Result<Option<FramerEvent>> {
        match self.inner.read_byte()? {
            Some(byte) => Ok(self.framer.push(byte)),
            None => Ok(None),
        }
    }

    /// Read until a valid frame arrives.
    ///
    /// Skipped bytes, bad headers and discarded frames are logged and passed
    /// over. With a `timeout`, fails with [`FrameError::Timeout`] once it
    /// elapses; without one, blocks until a frame or a transport error.
    pub fn read_message(&mut self, timeout: Option<Duration>) -> Result<Message> {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            if let (Some(deadline), Some(timeout)) = (deadline, timeout) {
                if Instant::now() >= deadline {
                    return Err(FrameError::Timeout(timeout));
                }
            }

            match self.poll_event()? {
                Some(FramerEvent::Frame(message)) => return Ok(message),
                Some(FramerEvent::Skipped(byte)) => trace!(byte, "noise"),
                Some(FramerEvent::BadHeader(header)) => debug!(?header, "resynchronized"),
                Some(FramerEvent::Discarded { error, .. }) => debug!(%error, "frame dropped"),
                None => {}
            }
        }
    }

    /// The framer driving this reader.
    pub fn framer(&self) -> &StreamFramer {
        &self.framer
    }

    /// Borrow the underlying transport.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying transport.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner transport.
    ///
    /// Any partial frame is dropped.
    pub fn into_inner(self) -> T {
        self.inner
    }
}
