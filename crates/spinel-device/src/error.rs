use std::time::Duration;

use spinel_frame::{DeviceError, Message};

/// Errors that can occur in device session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] spinel_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] spinel_frame::FrameError),

    /// The device answered with an error response code.
    #[error("device rejected request: {error}")]
    Device { error: DeviceError, reply: Message },

    /// No reply arrived in time.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The session reader has stopped.
    #[error("session closed")]
    Closed,

    /// A reply arrived but its payload has the wrong shape.
    #[error("unexpected reply to 0x{instruction:02x}: {reason}")]
    UnexpectedReply { instruction: u8, reason: String },
}

impl SessionError {
    /// Returns true if retrying the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SessionError::Timeout(_)
                | SessionError::Device {
                    error: DeviceError::Unspecified | DeviceError::DeviceFault | DeviceError::NoData,
                    ..
                }
        )
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
