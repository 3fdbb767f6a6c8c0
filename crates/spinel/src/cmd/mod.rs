use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use spinel_device::{DeviceSession, SessionConfig};
use spinel_transport::{SerialConfig, SerialTransport, DEFAULT_BAUD_RATE};

use crate::exit::{session_error, CliError, CliResult};
use crate::output::OutputFormat;

pub mod decode;
pub mod device;
pub mod encode;
pub mod monitor;
pub mod points;
pub mod ports;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build a frame and print it.
    Encode(EncodeArgs),
    /// Parse a hex-encoded frame.
    Decode(DecodeArgs),
    /// Decode a measurement payload into per-channel points.
    Points(PointsArgs),
    /// List serial ports.
    Ports,
    /// Query the device identification string.
    Identify(DeviceArgs),
    /// Show the state of every input channel.
    Inputs(DeviceArgs),
    /// Enable one input channel.
    Enable(InputArgs),
    /// Disable one input channel.
    Disable(InputArgs),
    /// Start or stop periodic measurement.
    Measure(MeasureArgs),
    /// Print frames read from a port until interrupted.
    Monitor(MonitorArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Encode(args) => encode::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Points(args) => points::run(args, format),
        Command::Ports => ports::run(format),
        Command::Identify(args) => device::identify(args, format),
        Command::Inputs(args) => device::inputs(args, format),
        Command::Enable(args) => device::set_input(args, true, format),
        Command::Disable(args) => device::set_input(args, false, format),
        Command::Measure(args) => device::measure(args, format),
        Command::Monitor(args) => monitor::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Instruction (request) or response code byte.
    #[arg(long, short = 'c', value_parser = parse_byte)]
    pub code: u8,
    /// Request signature echoed back in the reply.
    #[arg(long, short = 's', default_value = "0", value_parser = parse_byte)]
    pub signature: u8,
    /// Device address.
    #[arg(long, short = 'a', default_value = "0xfe", value_parser = parse_byte)]
    pub address: u8,
    /// Payload bytes as hex.
    #[arg(long, short = 'p', default_value = "")]
    pub payload: String,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Frame bytes as hex (whitespace and ':' separators allowed).
    pub frame: String,
    /// Accept device error and unknown response codes.
    #[arg(long)]
    pub no_check: bool,
}

#[derive(Args, Debug)]
pub struct PointsArgs {
    /// Measurement payload as hex.
    pub payload: String,
    /// Treat the input as a whole frame and decode its payload.
    #[arg(long)]
    pub frame: bool,
}

#[derive(Args, Debug, Clone)]
pub struct DeviceArgs {
    /// Serial port path.
    #[arg(long, short = 'P', env = "SPINEL_PORT")]
    pub port: String,
    /// Baud rate.
    #[arg(long, env = "SPINEL_BAUD", default_value_t = DEFAULT_BAUD_RATE)]
    pub baud: u32,
    /// Device address.
    #[arg(long, short = 'a', default_value = "0xfe", value_parser = parse_byte)]
    pub address: u8,
    /// Reply timeout (e.g. 2s, 500ms).
    #[arg(long, default_value = "2s", value_parser = parse_duration)]
    pub timeout: Duration,
}

impl DeviceArgs {
    pub fn serial_config(&self) -> SerialConfig {
        SerialConfig::new(&self.port).with_baud_rate(self.baud)
    }

    pub fn open_session(&self) -> CliResult<DeviceSession<SerialTransport>> {
        let config = SessionConfig {
            address: self.address,
            timeout: self.timeout,
            ..SessionConfig::default()
        };
        spinel_device::open_with_config(&self.serial_config(), config)
            .map_err(|err| session_error("open failed", err))
    }
}

#[derive(Args, Debug)]
pub struct InputArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
    /// Input channel number.
    pub channel: u8,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum MeasureAction {
    Start,
    Stop,
}

#[derive(Args, Debug)]
pub struct MeasureArgs {
    pub action: MeasureAction,
    #[command(flatten)]
    pub device: DeviceArgs,
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
    /// Exit after printing N frames.
    #[arg(long)]
    pub count: Option<usize>,
    /// Also decode unsolicited reports as measurement points.
    #[arg(long)]
    pub points: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse a byte given as decimal or `0x`-prefixed hex.
pub fn parse_byte(input: &str) -> Result<u8, String> {
    let input = input.trim();
    let parsed = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(digits) => u8::from_str_radix(digits, 16),
        None => input.parse(),
    };
    parsed.map_err(|_| format!("invalid byte value: {input} (expected 0-255 or 0x00-0xff)"))
}

pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("duration must not be empty".to_string());
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| format!("invalid duration value: {input}"))?;
    if value == 0 {
        return Err("duration must be greater than zero".to_string());
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

/// Decode hex text, ignoring whitespace, ':' separators and a leading `0x`.
pub fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let trimmed = input.trim();
    let body = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let digits: String = body
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    hex::decode(&digits).map_err(|err| CliError::usage(format!("invalid hex input: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_byte_decimal_and_hex() {
        assert_eq!(parse_byte("49").unwrap(), 49);
        assert_eq!(parse_byte("0x31").unwrap(), 0x31);
        assert_eq!(parse_byte("0XFE").unwrap(), 0xFE);
        assert!(parse_byte("256").is_err());
        assert!(parse_byte("0x1ff").is_err());
        assert!(parse_byte("x").is_err());
    }

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn parse_hex_tolerates_separators() {
        assert_eq!(parse_hex("2a 61 00").unwrap(), vec![0x2a, 0x61, 0x00]);
        assert_eq!(parse_hex("2a:61:00").unwrap(), vec![0x2a, 0x61, 0x00]);
        assert_eq!(parse_hex("0x2A6100").unwrap(), vec![0x2a, 0x61, 0x00]);
        assert_eq!(parse_hex("").unwrap(), Vec::<u8>::new());
        assert!(parse_hex("2a6").is_err());
        assert!(parse_hex("zz").is_err());
    }
}
