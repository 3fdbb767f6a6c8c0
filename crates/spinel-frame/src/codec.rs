use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::ack::{self, Ack};
use crate::constants::{
    FIXED_OVERHEAD, FORMAT, HEADER_SIZE, MAX_PAYLOAD, MIN_FRAME_SIZE, PAYLOAD_OFFSET, PREFIX,
    TERMINATOR, UNICAST_ADDRESS,
};
use crate::error::{FrameError, Result};

/// A protocol message.
///
/// On outgoing messages `instruction` is the command code. On decoded
/// incoming messages the same wire slot carries the response code, and
/// `instruction` holds that instead; see [`Message::ack`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Sender/session tag, opaque to the protocol.
    pub signature: u8,
    /// Command code (outgoing) or response code (incoming).
    pub instruction: u8,
    /// Target or source device address.
    pub address: u8,
    /// Message payload.
    pub payload: Bytes,
}

impl Message {
    /// Create a message to the default unicast address with an empty payload.
    pub fn new(signature: u8, instruction: u8) -> Self {
        Self {
            signature,
            instruction,
            address: UNICAST_ADDRESS,
            payload: Bytes::new(),
        }
    }

    /// Set the device address.
    pub fn with_address(mut self, address: u8) -> Self {
        self.address = address;
        self
    }

    /// Set the payload.
    pub fn with_payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.payload = payload.into();
        self
    }

    /// The response code of a decoded message.
    pub fn response_code(&self) -> u8 {
        self.instruction
    }

    /// Classify the response code of a decoded message.
    pub fn ack(&self) -> Result<Ack> {
        Ack::classify(self.instruction)
    }

    /// Returns true if the message is addressed to every device.
    pub fn is_broadcast(&self) -> bool {
        crate::constants::is_broadcast(self.address)
    }

    /// The total wire size of this message once framed.
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + FIXED_OVERHEAD + self.payload.len()
    }

    /// Encode into a freshly allocated buffer.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut dst = BytesMut::with_capacity(self.wire_size());
        encode_message(self, &mut dst)?;
        Ok(dst.freeze())
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Message(sig=0x{:02x}, code=0x{:02x}, addr=0x{:02x}, payload={} bytes)",
            self.signature,
            self.instruction,
            self.address,
            self.payload.len()
        )
    }
}

/// Checksum over the covered bytes of a frame.
///
/// `(255 - sum) mod 256`, where the sum runs over prefix, format, both
/// length bytes, address, signature, code and every payload byte.
pub fn checksum(covered: &[u8]) -> u8 {
    let sum = covered.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    0xFFu8.wrapping_sub(sum)
}

/// Encode a message into the wire format, appending to `dst`.
///
/// Wire format (multi-byte fields big-endian):
/// ```text
/// ┌────────┬────────┬─────────┬──────┬─────┬──────┬─────────┬─────┬──────┐
/// │ Prefix │ Format │ Length  │ Addr │ Sig │ Code │ Payload │ Sum │ Term │
/// │ '*'    │ 97     │ (2B BE) │ (1B) │(1B) │ (1B) │ (N B)   │(1B) │ CR   │
/// └────────┴────────┴─────────┴──────┴─────┴──────┴─────────┴─────┴──────┘
/// Length = 5 + N
/// ```
pub fn encode_message(message: &Message, dst: &mut BytesMut) -> Result<()> {
    let payload_len = message.payload.len();
    if payload_len > MAX_PAYLOAD {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: MAX_PAYLOAD,
        });
    }

    let start = dst.len();
    dst.reserve(message.wire_size());
    dst.put_u8(PREFIX);
    dst.put_u8(FORMAT);
    dst.put_u16((FIXED_OVERHEAD + payload_len) as u16);
    dst.put_u8(message.address);
    dst.put_u8(message.signature);
    dst.put_u8(message.instruction);
    dst.put_slice(&message.payload);
    let sum = checksum(&dst[start..]);
    dst.put_u8(sum);
    dst.put_u8(TERMINATOR);
    Ok(())
}

/// Decode one complete frame.
///
/// All structural checks (size, prefix, format, length, checksum,
/// terminator) run before the response code is looked at. With
/// `check_response_code` the code must classify as success or unsolicited;
/// without it any code is accepted.
pub fn decode_message(src: &[u8], check_response_code: bool) -> Result<Message> {
    if src.len() < MIN_FRAME_SIZE {
        return Err(FrameError::FrameTooShort { len: src.len() });
    }
    if src[0] != PREFIX {
        return Err(FrameError::BadPrefix(src[0]));
    }
    if src[1] != FORMAT {
        return Err(FrameError::BadFormat(src[1]));
    }

    let declared = u16::from_be_bytes([src[2], src[3]]) as usize;
    let actual = src.len() - HEADER_SIZE;
    if declared != actual {
        return Err(FrameError::LengthMismatch { declared, actual });
    }
    // Consistent length, but too small to hold address/signature/code/sum/terminator.
    if declared < FIXED_OVERHEAD {
        return Err(FrameError::FrameTooShort { len: src.len() });
    }

    let sum_at = src.len() - 2;
    let expected = checksum(&src[..sum_at]);
    if src[sum_at] != expected {
        return Err(FrameError::ChecksumMismatch {
            expected,
            actual: src[sum_at],
        });
    }

    let terminator = src[src.len() - 1];
    if terminator != TERMINATOR {
        return Err(FrameError::BadTerminator(terminator));
    }

    let code = src[6];
    if check_response_code {
        ack::check_response_code(code)?;
    }

    Ok(Message {
        address: src[4],
        signature: src[5],
        instruction: code,
        payload: Bytes::copy_from_slice(&src[PAYLOAD_OFFSET..sum_at]),
    })
}

/// A complete frame candidate as cut from the byte stream.
///
/// Nothing about the contents is validated until [`RawFrame::decode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    bytes: Bytes,
}

impl RawFrame {
    /// Wrap raw frame bytes.
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    /// The raw bytes, prefix through terminator.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the frame and return its bytes.
    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The big-endian length field, if the header is present.
    pub fn declared_length(&self) -> Option<u16> {
        match self.bytes.get(2..HEADER_SIZE) {
            Some(&[hi, lo]) => Some(u16::from_be_bytes([hi, lo])),
            _ => None,
        }
    }

    /// The checksum byte (second to last).
    pub fn checksum_byte(&self) -> Option<u8> {
        self.bytes.len().checked_sub(2).map(|i| self.bytes[i])
    }

    /// The final byte.
    pub fn terminator(&self) -> Option<u8> {
        self.bytes.last().copied()
    }

    /// Returns true if the final byte is the terminator.
    pub fn has_terminator(&self) -> bool {
        self.terminator() == Some(TERMINATOR)
    }

    /// Decode and validate.
    pub fn decode(&self, check_response_code: bool) -> Result<Message> {
        decode_message(&self.bytes, check_response_code)
    }
}

impl AsRef<[u8]> for RawFrame {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}
