//! Resynchronizing stream framer.
//!
//! Consumes an unbounded byte stream one byte at a time and cuts it into
//! frames. The stream may start mid-frame, drop bytes or carry noise; the
//! framer discards what it cannot use and keeps going.
//!
//! ```text
//! SeekingPrefix ──'*'──▶ ReadingHeader ──4 bytes ok──▶ ReadingBody ──length bytes──▶ (emit)
//!       ▲                      │ bad header                                            │
//!       └──────────────────────┴───────────────────────────────────────────────────────┘
//! ```
//!
//! Resynchronization only ever moves forward: bytes discarded with a bad
//! header are never re-scanned for a prefix, so each input byte costs O(1).

use bytes::{BufMut, BytesMut};
use tracing::{debug, trace, warn};

use crate::codec::{Message, RawFrame};
use crate::constants::{FIXED_OVERHEAD, FORMAT, HEADER_SIZE, PREFIX};
use crate::error::FrameError;

const INITIAL_BUFFER_CAPACITY: usize = 256;

/// Where the framer is within the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramerState {
    /// Discarding bytes until a prefix shows up.
    SeekingPrefix,
    /// Accumulating prefix, format and the length field.
    ReadingHeader,
    /// Accumulating the bytes announced by the length field.
    ReadingBody,
}

/// Outcome of feeding one byte.
#[derive(Debug)]
pub enum FramerEvent {
    /// A complete, validated frame.
    Frame(Message),
    /// A byte outside any frame was dropped.
    Skipped(u8),
    /// The accumulated header was not a valid frame start and was dropped.
    BadHeader([u8; HEADER_SIZE]),
    /// A complete frame candidate failed validation.
    Discarded { frame: RawFrame, error: FrameError },
}

impl FramerEvent {
    /// The decoded message, if this event carries one.
    pub fn into_message(self) -> Option<Message> {
        match self {
            FramerEvent::Frame(message) => Some(message),
            _ => None,
        }
    }
}

/// Framer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramerConfig {
    /// Reject frames whose response code is a device error or invalid.
    pub check_response_code: bool,
}

impl Default for FramerConfig {
    fn default() -> Self {
        Self {
            check_response_code: true,
        }
    }
}

/// Running counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FramerStats {
    pub bytes: u64,
    pub frames: u64,
    pub skipped: u64,
    pub bad_headers: u64,
    pub discarded: u64,
    pub missing_terminators: u64,
}

/// Byte-at-a-time frame state machine.
///
/// Single owner, single reader: bind one instance to one connection.
/// Dropping it discards any partial frame.
#[derive(Debug)]
pub struct StreamFramer {
    state: FramerState,
    buf: BytesMut,
    remaining: usize,
    config: FramerConfig,
    stats: FramerStats,
}

impl Default for StreamFramer {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamFramer {
    /// Create a framer with default configuration.
    pub fn new() -> Self {
        Self::with_config(FramerConfig::default())
    }

    /// Create a framer with explicit configuration.
    pub fn with_config(config: FramerConfig) -> Self {
        Self {
            state: FramerState::SeekingPrefix,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            remaining: 0,
            config,
            stats: FramerStats::default(),
        }
    }

    /// Feed one byte.
    pub fn push(&mut self, byte: u8) -> Option<FramerEvent> {
        self.stats.bytes += 1;
        match self.state {
            FramerState::SeekingPrefix => {
                if byte != PREFIX {
                    self.stats.skipped += 1;
                    trace!(byte, "skipping byte outside frame");
                    return Some(FramerEvent::Skipped(byte));
                }
                self.buf.put_u8(byte);
                self.state = FramerState::ReadingHeader;
                None
            }
            FramerState::ReadingHeader => {
                self.buf.put_u8(byte);
                if self.buf.len() < HEADER_SIZE {
                    return None;
                }
                self.finish_header()
            }
            FramerState::ReadingBody => {
                self.buf.put_u8(byte);
                self.remaining -= 1;
                if self.remaining > 0 {
                    return None;
                }
                Some(self.finish_frame())
            }
        }
    }

    /// Feed a run of bytes, collecting every event.
    pub fn extend(&mut self, bytes: &[u8]) -> Vec<FramerEvent> {
        bytes.iter().filter_map(|b| self.push(*b)).collect()
    }

    /// Drop any partial frame and start seeking again.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.remaining = 0;
        self.state = FramerState::SeekingPrefix;
    }

    pub fn state(&self) -> FramerState {
        self.state
    }

    /// Bytes accumulated for the current frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Body bytes still expected for the current frame.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn stats(&self) -> FramerStats {
        self.stats
    }

    pub fn config(&self) -> &FramerConfig {
        &self.config
    }

    fn finish_header(&mut self) -> Option<FramerEvent> {
        let mut header = [0u8; HEADER_SIZE];
        header.copy_from_slice(&self.buf[..HEADER_SIZE]);
        let length = u16::from_be_bytes([header[2], header[3]]) as usize;

        // A length below the fixed overhead cannot describe any frame.
        if header[0] != PREFIX || header[1] != FORMAT || length < FIXED_OVERHEAD {
            self.stats.bad_headers += 1;
            warn!(?header, "bad frame header, resynchronizing");
            self.reset();
            return Some(FramerEvent::BadHeader(header));
        }

        self.remaining = length;
        self.state = FramerState::ReadingBody;
        None
    }

    fn finish_frame(&mut self) -> FramerEvent {
        let frame = RawFrame::new(self.buf.split().freeze());
        self.reset();

        if !frame.has_terminator() {
            self.stats.missing_terminators += 1;
            warn!(
                len = frame.len(),
                last = ?frame.terminator(),
                "frame does not end with terminator, decoding anyway"
            );
        }

        match frame.decode(self.config.check_response_code) {
            Ok(message) => {
                self.stats.frames += 1;
                debug!(%message, "frame received");
                FramerEvent::Frame(message)
            }
            Err(error) => {
                self.stats.discarded += 1;
                warn!(%error, len = frame.len(), "discarding frame");
                FramerEvent::Discarded { frame, error }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ack::DeviceError;
    use crate::constants::TERMINATOR;

    fn wire(message: &Message) -> Vec<u8> {
        message.to_bytes().unwrap().to_vec()
    }

    fn sample() -> Message {
        Message::new(0x02, 0x00)
            .with_address(0x31)
            .with_payload(vec![0x01, 0x00, 0x00, 0x64, 0x00, 0x00, 0x00])
    }

    fn frames(events: Vec<FramerEvent>) -> Vec<Message> {
        events.into_iter().filter_map(FramerEvent::into_message).collect()
    }

    #[test]
    fn clean_frame() {
        let mut framer = StreamFramer::new();
        let events = framer.extend(&wire(&sample()));

        assert_eq!(events.len(), 1);
        assert_eq!(frames(events), vec![sample()]);
        assert_eq!(framer.state(), FramerState::SeekingPrefix);
        assert_eq!(framer.buffered(), 0);
        assert_eq!(framer.stats().frames, 1);
    }

    #[test]
    fn leading_noise_is_skipped() {
        let mut framer = StreamFramer::new();
        let mut stream = vec![0x00, 0x00];
        stream.extend_from_slice(&wire(&sample()));

        let events = framer.extend(&stream);
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], FramerEvent::Skipped(0x00)));
        assert!(matches!(events[1], FramerEvent::Skipped(0x00)));
        assert!(matches!(&events[2], FramerEvent::Frame(m) if *m == sample()));
        assert_eq!(framer.stats().skipped, 2);
    }

    #[test]
    fn bad_header_is_not_rescanned() {
        let mut framer = StreamFramer::new();
        let frame = wire(&sample());
        // Corrupt header '*' 0x00 swallows the next frame's prefix and format.
        let mut stream = vec![PREFIX, 0x00];
        stream.extend_from_slice(&frame);

        let events = framer.extend(&stream);
        assert!(matches!(
            events[0],
            FramerEvent::BadHeader([PREFIX, 0x00, PREFIX, FORMAT])
        ));
        assert!(frames(events).is_empty());
        assert_eq!(framer.stats().bad_headers, 1);

        // The next intact frame is picked up normally.
        let events = framer.extend(&frame);
        assert_eq!(frames(events), vec![sample()]);
    }

    #[test]
    fn undersized_length_is_a_bad_header() {
        let mut framer = StreamFramer::new();
        let events = framer.extend(&[PREFIX, FORMAT, 0x00, 0x04]);
        assert!(matches!(events[0], FramerEvent::BadHeader(_)));
        assert_eq!(framer.state(), FramerState::SeekingPrefix);
    }

    #[test]
    fn partial_state_survives_between_calls() {
        let mut framer = StreamFramer::new();
        let frame = wire(&sample());

        assert!(framer.extend(&frame[..3]).is_empty());
        assert_eq!(framer.state(), FramerState::ReadingHeader);
        assert_eq!(framer.buffered(), 3);

        assert!(framer.extend(&frame[3..6]).is_empty());
        assert_eq!(framer.state(), FramerState::ReadingBody);
        assert_eq!(framer.remaining(), frame.len() - 6);

        assert_eq!(frames(framer.extend(&frame[6..])), vec![sample()]);
    }

    #[test]
    fn corrupt_frame_is_discarded_and_stream_continues() {
        let mut framer = StreamFramer::new();
        let mut corrupt = wire(&sample());
        corrupt[8] ^= 0xFF;
        let mut stream = corrupt;
        stream.extend_from_slice(&wire(&sample()));

        let events = framer.extend(&stream);
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            FramerEvent::Discarded {
                error: FrameError::ChecksumMismatch { .. },
                ..
            }
        ));
        assert!(matches!(&events[1], FramerEvent::Frame(m) if *m == sample()));
        assert_eq!(framer.stats().discarded, 1);
    }

    #[test]
    fn missing_terminator_still_attempts_decode() {
        let mut framer = StreamFramer::new();
        let mut frame = wire(&sample());
        let last = frame.len() - 1;
        frame[last] = 0x0A;

        let events = framer.extend(&frame);
        assert_eq!(framer.stats().missing_terminators, 1);
        match &events[0] {
            FramerEvent::Discarded { frame, error } => {
                assert_eq!(frame.terminator(), Some(0x0A));
                assert!(matches!(error, FrameError::BadTerminator(0x0A)));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_ne!(TERMINATOR, 0x0A);
    }

    #[test]
    fn device_error_frames_follow_config() {
        let reply = Message::new(0x02, 0x05).with_address(0x31);

        let mut checking = StreamFramer::new();
        let events = checking.extend(&wire(&reply));
        assert!(matches!(
            &events[0],
            FramerEvent::Discarded {
                error: FrameError::Device(DeviceError::DeviceFault),
                ..
            }
        ));

        let mut permissive = StreamFramer::with_config(FramerConfig {
            check_response_code: false,
        });
        assert_eq!(frames(permissive.extend(&wire(&reply))), vec![reply]);
    }

    #[test]
    fn back_to_back_frames() {
        let mut framer = StreamFramer::new();
        let first = Message::new(1, 0x0A).with_payload(vec![1, 2, 3]);
        let second = Message::new(2, 0x00);
        let mut stream = wire(&first);
        stream.extend_from_slice(&wire(&second));

        assert_eq!(frames(framer.extend(&stream)), vec![first, second]);
    }

    #[test]
    fn reset_drops_partial_frame() {
        let mut framer = StreamFramer::new();
        framer.extend(&wire(&sample())[..5]);
        framer.reset();

        assert_eq!(framer.state(), FramerState::SeekingPrefix);
        assert_eq!(framer.buffered(), 0);
        assert_eq!(frames(framer.extend(&wire(&sample()))), vec![sample()]);
    }
}
