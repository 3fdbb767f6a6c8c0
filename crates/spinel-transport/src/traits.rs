use std::io::{self, ErrorKind, Read, Write};
use std::thread;
use std::time::Duration;

use crate::error::{Result, TransportError};

/// A byte-oriented duplex link.
///
/// Reads are deliberately one byte at a time: the stream framer never
/// assumes more buffering than "one byte available or a timeout signal".
pub trait ByteTransport {
    /// Write every byte of `data`, retrying short and interrupted writes.
    fn write_all(&mut self, data: &[u8]) -> Result<()>;

    /// Flush any buffered output.
    fn flush(&mut self) -> Result<()>;

    /// Read at most one byte.
    ///
    /// Returns `Ok(None)` when the read timed out with nothing available.
    /// A timeout is not an error; callers simply poll again.
    fn read_byte(&mut self) -> Result<Option<u8>>;

    /// Change how long [`read_byte`](Self::read_byte) blocks before
    /// reporting a timeout.
    ///
    /// Links without an adjustable timeout return an `Unsupported` I/O error.
    fn set_read_timeout(&mut self, timeout: Duration) -> Result<()> {
        let _ = timeout;
        Err(TransportError::Io(io::Error::new(
            ErrorKind::Unsupported,
            "read timeout is not adjustable on this transport",
        )))
    }

    /// Drop any received bytes not yet read.
    ///
    /// The default does nothing, for links with no receive buffer of their own.
    fn discard_input(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<T: ByteTransport + ?Sized> ByteTransport for Box<T> {
    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        (**self).write_all(data)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn read_byte(&mut self) -> Result<Option<u8>> {
        (**self).read_byte()
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> Result<()> {
        (**self).set_read_timeout(timeout)
    }

    fn discard_input(&mut self) -> Result<()> {
        (**self).discard_input()
    }
}

impl<T: ByteTransport + ?Sized> ByteTransport for &mut T {
    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        (**self).write_all(data)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn read_byte(&mut self) -> Result<Option<u8>> {
        (**self).read_byte()
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> Result<()> {
        (**self).set_read_timeout(timeout)
    }

    fn discard_input(&mut self) -> Result<()> {
        (**self).discard_input()
    }
}

/// Adapts any blocking `Read + Write` stream to [`ByteTransport`].
///
/// Read timeouts (`TimedOut` / `WouldBlock`) surface as `Ok(None)`; EOF
/// surfaces as [`TransportError::Closed`].
#[derive(Debug)]
pub struct IoTransport<T> {
    inner: T,
}

impl<T> IoTransport<T> {
    /// Wrap a stream.
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the transport and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Read + Write> ByteTransport for IoTransport<T> {
    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        write_all_retrying(&mut self.inner, data)
    }

    fn flush(&mut self) -> Result<()> {
        flush_retrying(&mut self.inner)
    }

    fn read_byte(&mut self) -> Result<Option<u8>> {
        read_byte_mapped(&mut self.inner)
    }
}

// Pause before retrying a write the OS refused with `WouldBlock`.
const WOULD_BLOCK_BACKOFF: Duration = Duration::from_millis(1);

pub(crate) fn write_all_retrying<W: Write + ?Sized>(inner: &mut W, data: &[u8]) -> Result<()> {
    let mut offset = 0usize;
    while offset < data.len() {
        match inner.write(&data[offset..]) {
            Ok(0) => return Err(TransportError::Closed),
            Ok(n) => offset += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == ErrorKind::WouldBlock => {
                thread::sleep(WOULD_BLOCK_BACKOFF)
            }
            Err(err) => return Err(TransportError::Io(err)),
        }
    }
    Ok(())
}

pub(crate) fn flush_retrying<W: Write + ?Sized>(inner: &mut W) -> Result<()> {
    loop {
        match inner.flush() {
            Ok(()) => return Ok(()),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == ErrorKind::WouldBlock => {
                thread::sleep(WOULD_BLOCK_BACKOFF)
            }
            Err(err) => return Err(TransportError::Io(err)),
        }
    }
}

pub(crate) fn read_byte_mapped<R: Read + ?Sized>(inner: &mut R) -> Result<Option<u8>> {
    let mut byte = [0u8; 1];
    loop {
        match inner.read(&mut byte) {
            Ok(0) => return Err(TransportError::Closed),
            Ok(_) => return Ok(Some(byte[0])),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                return Ok(None)
            }
            Err(err) => return Err(TransportError::Io(err)),
        }
    }
}
