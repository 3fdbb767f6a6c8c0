//! Device sessions for spinel instruments.
//!
//! A [`DeviceSession`] pairs a frame writer with a background reader thread,
//! correlates replies to requests by signature and queues unsolicited
//! measurement reports. The [`command`] module adds the typed instruction
//! set on top.

pub mod command;
pub mod connector;
pub mod error;
pub mod session;

pub use command::{DeviceId, InputState, GET_INPUTS, IDENTIFY, MEASURE, SET_INPUT};
pub use connector::{open, open_with_config};
pub use error::{Result, SessionError};
pub use session::{
    DeviceSession, SessionConfig, DEFAULT_TIMEOUT, DEFAULT_UNSOLICITED_CAPACITY,
};
