//! Serial port transport.
//!
//! Spinel devices sit behind a USB/TTL serial adapter. The port is opened
//! 8N1 without flow control and with a short read timeout so the framer can
//! poll byte by byte.

use std::collections::HashMap;
#[cfg(target_os = "linux")]
use std::fs;
use std::time::Duration;

use serialport::{
    ClearBuffer, DataBits, FlowControl, Parity, SerialPort, SerialPortInfo, SerialPortType,
    StopBits,
};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::{flush_retrying, read_byte_mapped, write_all_retrying, ByteTransport};

/// Default line rate for spinel instrumentation adapters.
pub const DEFAULT_BAUD_RATE: u32 = 460_800;

/// Default per-byte read timeout.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Serial link configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    /// Device path (e.g. `/dev/ttyUSB0` or `COM3`).
    pub path: String,
    /// Line rate in baud.
    pub baud_rate: u32,
    /// How long a single-byte read may block before reporting a timeout.
    pub read_timeout: Duration,
}

impl SerialConfig {
    /// Configuration for `path` with default baud rate and timeout.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    /// Override the baud rate.
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Override the read timeout.
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }
}

/// A serial port implementing [`ByteTransport`].
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    path: String,
}

impl SerialTransport {
    /// Open and configure a serial port (8N1, no flow control).
    pub fn open(config: &SerialConfig) -> Result<Self> {
        let port = serialport::new(config.path.as_str(), config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(config.read_timeout)
            .open()
            .map_err(|source| TransportError::Open {
                path: config.path.clone(),
                source,
            })?;

        info!(path = %config.path, baud = config.baud_rate, "opened serial port");

        Ok(Self {
            port,
            path: config.path.clone(),
        })
    }

    /// Clone the port handle so reads and writes can happen on different threads.
    pub fn try_clone(&self) -> Result<Self> {
        let port = self.port.try_clone()?;
        debug!(path = %self.path, "cloned serial port handle");
        Ok(Self {
            port,
            path: self.path.clone(),
        })
    }

    /// The device path this transport was opened on.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl ByteTransport for SerialTransport {
    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        write_all_retrying(&mut *self.port, data)
    }

    fn flush(&mut self) -> Result<()> {
        flush_retrying(&mut *self.port)
    }

    fn read_byte(&mut self) -> Result<Option<u8>> {
        read_byte_mapped(&mut *self.port)
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.port.set_timeout(timeout)?;
        debug!(path = %self.path, ?timeout, "serial read timeout changed");
        Ok(())
    }

    fn discard_input(&mut self) -> Result<()> {
        self.port.clear(ClearBuffer::Input)?;
        debug!(path = %self.path, "discarded pending serial input");
        Ok(())
    }
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("path", &self.path)
            .finish()
    }
}

/// Information about an available serial port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Port name (e.g., "/dev/ttyUSB0" or "COM3")
    pub name: String,
    /// USB vendor ID (if USB device)
    pub vid: Option<u16>,
    /// USB product ID (if USB device)
    pub pid: Option<u16>,
    /// Manufacturer name (if available)
    pub manufacturer: Option<String>,
    /// Product name (if available)
    pub product: Option<String>,
    /// Serial number (if available)
    pub serial_number: Option<String>,
}

impl PortInfo {
    fn bare(name: String) -> Self {
        Self {
            name,
            vid: None,
            pid: None,
            manufacturer: None,
            product: None,
            serial_number: None,
        }
    }
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        match info.port_type {
            SerialPortType::UsbPort(usb) => Self {
                name: info.port_name,
                vid: Some(usb.vid),
                pid: Some(usb.pid),
                manufacturer: usb.manufacturer,
                product: usb.product,
                serial_number: usb.serial_number,
            },
            _ => Self::bare(info.port_name),
        }
    }
}

// USB adapters first (ttyUSB*, then ttyACM*), numerically by suffix, then the rest by name.
fn port_sort_key(name: &str) -> (u8, usize, String) {
    let basename = name.rsplit('/').next().unwrap_or(name);
    if let Some(rest) = basename.strip_prefix("ttyUSB") {
        return (0, rest.parse().unwrap_or(usize::MAX), basename.to_string());
    }
    if let Some(rest) = basename.strip_prefix("ttyACM") {
        return (1, rest.parse().unwrap_or(usize::MAX), basename.to_string());
    }
    (2, 0, basename.to_string())
}

/// List available serial ports in a deterministic order.
pub fn list_ports() -> Vec<PortInfo> {
    let mut map: HashMap<String, PortInfo> = HashMap::new();
    for info in serialport::available_ports().unwrap_or_default() {
        let port = PortInfo::from(info);
        map.entry(port.name.clone()).or_insert(port);
    }

    // udev may not report adapters that are present but unclaimed.
    #[cfg(target_os = "linux")]
    if let Ok(entries) = fs::read_dir("/dev") {
        for entry in entries.flatten() {
            if let Some(fname) = entry.file_name().to_str() {
                if fname.starts_with("ttyUSB") || fname.starts_with("ttyACM") {
                    let full = format!("/dev/{fname}");
                    map.entry(full.clone()).or_insert_with(|| PortInfo::bare(full));
                }
            }
        }
    }

    let mut ports: Vec<PortInfo> = map.into_values().collect();
    ports.sort_by_key(|p| port_sort_key(&p.name));
    ports
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = SerialConfig::new("/dev/ttyUSB0");
        assert_eq!(config.baud_rate, DEFAULT_BAUD_RATE);
        assert_eq!(config.read_timeout, DEFAULT_READ_TIMEOUT);

        let config = config
            .with_baud_rate(115_200)
            .with_read_timeout(Duration::from_secs(2));
        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.read_timeout, Duration::from_secs(2));
    }

    #[test]
    fn list_ports_does_not_panic() {
        let _ = list_ports();
    }

    #[test]
    fn port_sorting() {
        let mut ports: Vec<PortInfo> = [
            "/dev/ttyACM1",
            "/dev/ttyUSB10",
            "/dev/ttyUSB1",
            "/dev/someport",
            "/dev/ttyACM0",
            "/dev/ttyUSB0",
        ]
        .into_iter()
        .map(|n| PortInfo::bare(n.to_string()))
        .collect();

        ports.sort_by_key(|p| port_sort_key(&p.name));
        let ordered: Vec<String> = ports.into_iter().map(|p| p.name).collect();

        assert_eq!(
            ordered,
            vec![
                "/dev/ttyUSB0",
                "/dev/ttyUSB1",
                "/dev/ttyUSB10",
                "/dev/ttyACM0",
                "/dev/ttyACM1",
                "/dev/someport",
            ]
        );
    }

    #[test]
    fn open_missing_device_fails_with_path() {
        let config = SerialConfig::new("/dev/spinel-does-not-exist");
        let err = SerialTransport::open(&config).unwrap_err();
        match err {
            TransportError::Open { path, .. } => assert_eq!(path, "/dev/spinel-does-not-exist"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
