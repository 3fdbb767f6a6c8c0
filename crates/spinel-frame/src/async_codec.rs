//! Tokio codec over the stream framer.
//!
//! Lets a spinel link run inside `tokio_util::codec::Framed`. Decoding
//! yields only valid frames; noise and rejected frames are logged and
//! dropped exactly as the blocking reader does.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, trace};

use crate::codec::{encode_message, Message};
use crate::error::FrameError;
use crate::framer::{FramerConfig, FramerEvent, StreamFramer};

/// `Decoder`/`Encoder` for spinel frames.
#[derive(Debug, Default)]
pub struct SpinelCodec {
    framer: StreamFramer,
}

impl SpinelCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FramerConfig) -> Self {
        Self {
            framer: StreamFramer::with_config(config),
        }
    }

    /// The framer backing this codec.
    pub fn framer(&self) -> &StreamFramer {
        &self.framer
    }
}

impl Decoder for SpinelCodec {
    type Item = Message;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>, FrameError> {
        while src.has_remaining() {
            match self.framer.push(src.get_u8()) {
                Some(FramerEvent::Frame(message)) => return Ok(Some(message)),
                Some(FramerEvent::Skipped(byte)) => trace!(byte, "noise"),
                Some(FramerEvent::BadHeader(header)) => debug!(?header, "resynchronized"),
                Some(FramerEvent::Discarded { error, .. }) => debug!(%error, "frame dropped"),
                None => {}
            }
        }
        Ok(None)
    }
}

impl Encoder<&Message> for SpinelCodec {
    type Error = FrameError;

    fn encode(&mut self, item: &Message, dst: &mut BytesMut) -> Result<(), FrameError> {
        encode_message(item, dst)
    }
}

impl Encoder<Message> for SpinelCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), FrameError> {
        encode_message(&item, dst)
    }
}
