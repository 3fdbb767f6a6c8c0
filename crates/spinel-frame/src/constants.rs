//! Fixed protocol parameters.
//!
//! These are not configurable per message or per link.

/// Start-of-frame marker, ASCII `*`.
pub const PREFIX: u8 = b'*';

/// Protocol format byte (97 decimal).
pub const FORMAT: u8 = 97;

/// End-of-frame marker, ASCII CR.
pub const TERMINATOR: u8 = 0x0D;

/// Address every device on the bus listens to.
pub const BROADCAST_ADDRESS: u8 = 0xFF;

/// Default address for point-to-point messages.
pub const UNICAST_ADDRESS: u8 = 0xFE;

/// Prefix, format and the big-endian length field.
pub const HEADER_SIZE: usize = 4;

/// Bytes counted by the length field besides the payload:
/// address, signature, code, checksum, terminator.
pub const FIXED_OVERHEAD: usize = 5;

/// Offset of the first payload byte.
pub const PAYLOAD_OFFSET: usize = 7;

/// Smallest input `decode_message` will look at.
pub const MIN_FRAME_SIZE: usize = 7;

/// Largest value of the length field.
pub const MAX_LENGTH: usize = 0xFFFF;

/// Largest payload that fits the length field.
pub const MAX_PAYLOAD: usize = MAX_LENGTH - FIXED_OVERHEAD;

/// Returns true if `address` is the broadcast address.
pub fn is_broadcast(address: u8) -> bool {
    address == BROADCAST_ADDRESS
}
