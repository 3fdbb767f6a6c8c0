//! Byte-oriented duplex transports for the spinel protocol.
//!
//! The framing layer only ever needs two things from a link: write a run of
//! bytes, and read at most one byte within a timeout. [`ByteTransport`]
//! captures exactly that contract, with implementations for:
//! - Serial ports via the `serialport` crate ([`SerialTransport`])
//! - Any blocking `Read + Write` stream ([`IoTransport`])
//!
//! Baud rate and device path are transport configuration; nothing above this
//! layer depends on them.

pub mod error;
pub mod serial;
pub mod traits;

pub use error::{Result, TransportError};
pub use serial::{list_ports, PortInfo, SerialConfig, SerialTransport, DEFAULT_BAUD_RATE};
pub use traits::{ByteTransport, IoTransport};
