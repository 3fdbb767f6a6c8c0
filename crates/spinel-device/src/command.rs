//! Instruction codes and typed wrappers for the device command set.

use std::fmt;

use bytes::Bytes;
use serde::{Serialize, Serializer};
use spinel_transport::ByteTransport;
use tracing::info;

use crate::error::Result;
use crate::session::DeviceSession;

/// Enable or disable one input channel. Payload `[channel, enable]`.
pub const SET_INPUT: u8 = 0x40;
/// Query the state of every input channel.
pub const GET_INPUTS: u8 = 0x41;
/// Start (`[0x01]`) or stop (`[0x00]`) periodic measurement.
pub const MEASURE: u8 = 0x45;
/// Query the device identification string.
pub const IDENTIFY: u8 = 0xF3;

/// State of one input channel as reported by [`GET_INPUTS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputState {
    Off,
    On,
    /// Enabled but no probe attached.
    Disconnected,
    Unknown(u8),
}

impl InputState {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0 => Self::Off,
            1 => Self::On,
            2 => Self::Disconnected,
            other => Self::Unknown(other),
        }
    }

    /// Returns true if the channel is switched on.
    pub fn is_enabled(self) -> bool {
        matches!(self, Self::On | Self::Disconnected)
    }
}

impl fmt::Display for InputState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => f.write_str("off"),
            Self::On => f.write_str("on"),
            Self::Disconnected => f.write_str("disconnected"),
            Self::Unknown(byte) => write!(f, "unknown(0x{byte:02x})"),
        }
    }
}

/// Device identification bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceId(Bytes);

impl DeviceId {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = String::from_utf8_lossy(&self.0);
        f.write_str(text.trim_end_matches('\0').trim())
    }
}

impl Serialize for DeviceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

pub fn set_input_payload(channel: u8, enable: bool) -> [u8; 2] {
    [channel, u8::from(enable)]
}

pub fn measure_payload(start: bool) -> [u8; 1] {
    [u8::from(start)]
}

/// Channel states, indexed by channel number.
pub fn parse_inputs(payload: &[u8]) -> Vec<InputState> {
    payload.iter().copied().map(InputState::from_byte).collect()
}

impl<W: ByteTransport> DeviceSession<W> {
    /// Read the device identification string.
    pub fn identify(&mut self) -> Result<DeviceId> {
        let reply = self.request(IDENTIFY, Bytes::new())?;
        let id = DeviceId::new(reply.payload);
        info!(%id, "device identified");
        Ok(id)
    }

    pub fn set_input(&mut self, channel: u8, enable: bool) -> Result<()> {
        let payload = set_input_payload(channel, enable);
        self.request(SET_INPUT, Bytes::copy_from_slice(&payload))?;
        Ok(())
    }

    pub fn enable_input(&mut self, channel: u8) -> Result<()> {
        self.set_input(channel, true)
    }

    pub fn disable_input(&mut self, channel: u8) -> Result<()> {
        self.set_input(channel, false)
    }

    /// Query the state of every input channel.
    pub fn inputs(&mut self) -> Result<Vec<InputState>> {
        let reply = self.request(GET_INPUTS, Bytes::new())?;
        Ok(parse_inputs(&reply.payload))
    }

    /// Start periodic measurement. Reports arrive as unsolicited messages.
    pub fn start_measuring(&mut self) -> Result<()> {
        self.request(MEASURE, Bytes::copy_from_slice(&measure_payload(true)))?;
        Ok(())
    }

    pub fn stop_measuring(&mut self) -> Result<()> {
        self.request(MEASURE, Bytes::copy_from_slice(&measure_payload(false)))?;
        Ok(())
    }
}
