//! Response code taxonomy.
//!
//! Incoming frames carry a one-byte response code in the slot outgoing
//! frames use for the instruction. The mapping is fixed:
//!
//! | code        | outcome                                   |
//! |-------------|-------------------------------------------|
//! | `0x00`      | success                                   |
//! | `0x01-0x06` | device-reported error ([`DeviceError`])   |
//! | `0x0A-0x0F` | unsolicited device-originated message     |
//! | other       | invalid                                   |

use std::ops::RangeInclusive;

use crate::error::{FrameError, Result};

/// Response code for a successful reply.
pub const ACK_OK: u8 = 0x00;

/// Response codes marking unsolicited device-originated messages.
pub const UNSOLICITED_CODES: RangeInclusive<u8> = 0x0A..=0x0F;

/// Errors a device can report in a well-formed reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
#[repr(u8)]
pub enum DeviceError {
    #[error("unspecified error (0x01)")]
    Unspecified = 0x01,
    #[error("unrecognized instruction (0x02)")]
    UnrecognizedInstruction = 0x02,
    #[error("malformed data (0x03)")]
    MalformedData = 0x03,
    #[error("not permitted (0x04)")]
    NotPermitted = 0x04,
    #[error("device error (0x05)")]
    DeviceFault = 0x05,
    #[error("no data (0x06)")]
    NoData = 0x06,
}

impl DeviceError {
    /// Map a response code to a device error, if it is one.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::Unspecified),
            0x02 => Some(Self::UnrecognizedInstruction),
            0x03 => Some(Self::MalformedData),
            0x04 => Some(Self::NotPermitted),
            0x05 => Some(Self::DeviceFault),
            0x06 => Some(Self::NoData),
            _ => None,
        }
    }

    /// The wire code for this error.
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Classified response code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ack {
    /// Success, no error.
    Ok,
    /// Device-originated message that answers no request.
    Unsolicited(u8),
    /// The device reported an error.
    Error(DeviceError),
}

impl Ack {
    /// Classify a response code.
    ///
    /// Fails with [`FrameError::InvalidResponseCode`] for codes outside the
    /// taxonomy. Device errors classify successfully as [`Ack::Error`].
    pub fn classify(code: u8) -> Result<Self> {
        if code == ACK_OK {
            return Ok(Self::Ok);
        }
        if UNSOLICITED_CODES.contains(&code) {
            return Ok(Self::Unsolicited(code));
        }
        DeviceError::from_code(code)
            .map(Self::Error)
            .ok_or(FrameError::InvalidResponseCode(code))
    }

    /// The wire code.
    pub fn code(self) -> u8 {
        match self {
            Self::Ok => ACK_OK,
            Self::Unsolicited(code) => code,
            Self::Error(err) => err.code(),
        }
    }

    pub fn is_unsolicited(self) -> bool {
        matches!(self, Self::Unsolicited(_))
    }

    pub fn is_error(self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// Check a response code the way `decode_message` does.
///
/// Success and unsolicited codes pass; device errors fail with
/// [`FrameError::Device`]; unknown codes fail with
/// [`FrameError::InvalidResponseCode`].
pub fn check_response_code(code: u8) -> Result<Ack> {
    match Ack::classify(code)? {
        Ack::Error(err) => Err(FrameError::Device(err)),
        ack => Ok(ack),
    }
}

/// Returns true if `code` marks an unsolicited message.
pub fn is_unsolicited(code: u8) -> bool {
    UNSOLICITED_CODES.contains(&code)
}
