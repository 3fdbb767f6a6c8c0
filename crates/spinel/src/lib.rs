//! Framing, measurement decoding and device sessions for the spinel serial
//! protocol (format byte `0x61`).
//!
//! # Crate Structure
//!
//! - [`transport`]: byte transports (serial ports, generic streams)
//! - [`frame`]: frame codec, resynchronizing stream framer, measurement records
//! - [`device`]: request/response sessions and the command set (behind `device` feature)

/// Re-export transport types.
pub mod transport {
    pub use spinel_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use spinel_frame::*;
}

/// Re-export device session types (requires `device` feature).
#[cfg(feature = "device")]
pub mod device {
    pub use spinel_device::*;
}
