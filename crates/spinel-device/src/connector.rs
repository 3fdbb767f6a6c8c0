use spinel_transport::{SerialConfig, SerialTransport};

use crate::error::Result;
use crate::session::{DeviceSession, SessionConfig};

/// Open a serial port and start a session with default settings.
pub fn open(serial: &SerialConfig) -> Result<DeviceSession<SerialTransport>> {
    open_with_config(serial, SessionConfig::default())
}

/// Open a serial port and start a session with explicit settings.
///
/// The port handle is cloned so the reader thread owns its own half.
pub fn open_with_config(
    serial: &SerialConfig,
    config: SessionConfig,
) -> Result<DeviceSession<SerialTransport>> {
    let port = SerialTransport::open(serial)?;
    let reader = port.try_clone()?;
    DeviceSession::new(reader, port, config)
}
