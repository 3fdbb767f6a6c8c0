//! Checksummed frame codec and resynchronizing stream framer.
//!
//! This is the core of spinel. Every message is framed as:
//! - A `*` prefix and a protocol format byte (97)
//! - A 2-byte big-endian length (5 + payload length)
//! - Address, signature and instruction/response code bytes
//! - The payload, a one-byte checksum and a CR terminator
//!
//! [`StreamFramer`] recovers frames from a noisy byte-at-a-time stream,
//! [`measurement`] decodes the per-channel temperature report payload.

pub mod ack;
#[cfg(feature = "async")]
pub mod async_codec;
pub mod codec;
pub mod constants;
pub mod error;
pub mod framer;
pub mod measurement;
pub mod reader;
pub mod writer;

pub use ack::{check_response_code, is_unsolicited, Ack, DeviceError, ACK_OK, UNSOLICITED_CODES};
#[cfg(feature = "async")]
pub use async_codec::SpinelCodec;
pub use codec::{checksum, decode_message, encode_message, Message, RawFrame};
pub use constants::{
    BROADCAST_ADDRESS, FORMAT, HEADER_SIZE, MAX_PAYLOAD, PREFIX, TERMINATOR, UNICAST_ADDRESS,
};
pub use error::{ErrorClass, FrameError, Result};
pub use framer::{FramerConfig, FramerEvent, FramerState, FramerStats, StreamFramer};
pub use measurement::{decode_points, points, Point, PointIter, Temperature, RECORD_SIZE};
pub use reader::FrameReader;
pub use writer::FrameWriter;
