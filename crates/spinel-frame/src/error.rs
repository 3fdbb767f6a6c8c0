use std::time::Duration;

use spinel_transport::TransportError;

use crate::ack::DeviceError;

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Fewer bytes than the smallest possible frame.
    #[error("frame too short ({len} bytes)")]
    FrameTooShort { len: usize },

    /// The first byte is not the prefix marker.
    #[error("invalid frame prefix 0x{0:02x} (expected 0x2a '*')")]
    BadPrefix(u8),

    /// The second byte is not the protocol format byte.
    #[error("invalid frame format 0x{0:02x} (expected 0x61)")]
    BadFormat(u8),

    /// The length field disagrees with the number of bytes received.
    #[error("length field is {declared}, frame carries {actual} bytes after the header")]
    LengthMismatch { declared: usize, actual: usize },

    /// The final byte is not the terminator.
    #[error("invalid frame terminator 0x{0:02x} (expected 0x0d)")]
    BadTerminator(u8),

    /// The checksum byte does not match the frame contents.
    #[error("checksum mismatch (frame has 0x{actual:02x}, computed 0x{expected:02x})")]
    ChecksumMismatch { expected: u8, actual: u8 },

    /// The payload does not fit the 16-bit length field.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The device answered with an error response code.
    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    /// The response code is outside the known taxonomy.
    #[error("invalid response code 0x{0:02x}")]
    InvalidResponseCode(u8),

    /// A measurement payload is not a whole number of records.
    #[error("truncated measurement record ({len} bytes is not a multiple of {record_size})")]
    TruncatedRecord { len: usize, record_size: usize },

    /// No complete frame arrived before the deadline.
    #[error("no frame received within {0:?}")]
    Timeout(Duration),

    /// The underlying transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification used to pick a recovery strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Garbage on the wire; drop the frame and keep reading.
    Structural,
    /// Well-formed frame carrying a device-reported error.
    Device,
    /// Well-formed frame with a response code outside the taxonomy.
    InvalidCode,
    /// Nothing arrived in time.
    Timeout,
    /// The link itself failed.
    Transport,
}

impl FrameError {
    /// Classify this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            FrameError::FrameTooShort { .. }
            | FrameError::BadPrefix(_)
            | FrameError::BadFormat(_)
            | FrameError::LengthMismatch { .. }
            | FrameError::BadTerminator(_)
            | FrameError::ChecksumMismatch { .. }
            | FrameError::PayloadTooLarge { .. }
            | FrameError::TruncatedRecord { .. } => ErrorClass::Structural,
            FrameError::Device(_) => ErrorClass::Device,
            FrameError::InvalidResponseCode(_) => ErrorClass::InvalidCode,
            FrameError::Timeout(_) => ErrorClass::Timeout,
            FrameError::Transport(_) | FrameError::Io(_) => ErrorClass::Transport,
        }
    }

    /// Returns true for malformed frames and records.
    pub fn is_structural(&self) -> bool {
        self.class() == ErrorClass::Structural
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
