use bytes::BytesMut;
use spinel_transport::ByteTransport;
use tracing::trace;

use crate::codec::{encode_message, Message};
use crate::error::Result;

const INITIAL_BUFFER_CAPACITY: usize = 256;

/// Writes complete frames to a [`ByteTransport`].
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: ByteTransport> FrameWriter<T> {
    /// Create a new frame writer.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Encode and write one message, then flush.
    ///
    /// Nothing is written if the message cannot be encoded.
    pub fn send(&mut self, message: &Message) -> Result<()> {
        self.buf.clear();
        encode_message(message, &mut self.buf)?;
        trace!(%message, len = self.buf.len(), "writing frame");

        self.inner.write_all(&self.buf)?;
        self.inner.flush()?;
        Ok(())
    }

    /// Borrow the underlying transport.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying transport.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner transport.
    pub fn into_inner(self) -> T {
        self.inner
    }
}
