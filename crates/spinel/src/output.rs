use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use spinel_frame::{Ack, Message, Point};
use spinel_transport::PortInfo;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    /// Bare bytes on stdout (frames and payloads only).
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
pub struct MessageOutput {
    pub signature: u8,
    pub instruction: u8,
    pub address: u8,
    pub status: String,
    pub payload_size: usize,
    pub payload: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_ms: Option<u128>,
}

impl MessageOutput {
    pub fn new(message: &Message) -> Self {
        Self {
            signature: message.signature,
            instruction: message.instruction,
            address: message.address,
            status: response_status(message.instruction),
            payload_size: message.payload.len(),
            payload: hex::encode(&message.payload),
            timestamp_ms: None,
        }
    }

    pub fn stamped(mut self) -> Self {
        self.timestamp_ms = Some(now_unix_millis());
        self
    }
}

#[derive(Serialize)]
struct EncodedOutput<'a> {
    frame: String,
    frame_size: usize,
    #[serde(flatten)]
    message: &'a MessageOutput,
}

#[derive(Serialize)]
struct PortOutput<'a> {
    name: &'a str,
    vid: Option<String>,
    pid: Option<String>,
    manufacturer: Option<&'a str>,
    product: Option<&'a str>,
    serial_number: Option<&'a str>,
}

/// Human label for the code byte when read as a response code.
pub fn response_status(code: u8) -> String {
    match Ack::classify(code) {
        Ok(Ack::Ok) => "ok".to_string(),
        Ok(Ack::Unsolicited(_)) => "unsolicited".to_string(),
        Ok(Ack::Error(error)) => format!("device error: {error}"),
        Err(_) => "invalid".to_string(),
    }
}

pub fn print_message(message: &Message, format: OutputFormat) {
    let out = MessageOutput::new(message);
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => {
            let mut table = new_table(vec!["SIG", "CODE", "ADDR", "STATUS", "SIZE", "PAYLOAD"]);
            table.add_row(message_row(&out));
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{}", message_line(&out)),
        OutputFormat::Raw => print_raw(&message.payload),
    }
}

/// Print one message of a stream; JSON output is one object per line.
pub fn print_stream_message(message: &Message, format: OutputFormat) {
    let out = MessageOutput::new(message).stamped();
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table | OutputFormat::Pretty => println!("{}", message_line(&out)),
        OutputFormat::Raw => print_raw(&message.payload),
    }
}

pub fn print_encoded(frame: &[u8], message: &Message, format: OutputFormat) {
    let out = MessageOutput::new(message);
    match format {
        OutputFormat::Json => print_json(&EncodedOutput {
            frame: hex::encode(frame),
            frame_size: frame.len(),
            message: &out,
        }),
        OutputFormat::Table => {
            let mut table = new_table(vec!["FRAME", "SIZE"]);
            table.add_row(vec![spaced_hex(frame), frame.len().to_string()]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{}", spaced_hex(frame)),
        OutputFormat::Raw => print_raw(frame),
    }
}

pub fn print_points(points: &[Point], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&points),
        OutputFormat::Table => {
            let mut table = new_table(vec!["CHANNEL", "TEMPERATURE", "POWER", "STATE"]);
            for point in points {
                table.add_row(vec![
                    point.channel.to_string(),
                    point.temperature.to_string(),
                    flag_label(point.has_power_fault(), "fault"),
                    flag_label(point.is_disconnected(), "disconnected"),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for point in points {
                let mut line = format!("ch{:02} {:>9}", point.channel, point.temperature);
                if point.has_power_fault() {
                    line.push_str(" power-fault");
                }
                if point.is_disconnected() {
                    line.push_str(" disconnected");
                }
                println!("{line}");
            }
        }
    }
}

pub fn print_ports(ports: &[PortInfo], format: OutputFormat) {
    let rows: Vec<PortOutput<'_>> = ports
        .iter()
        .map(|port| PortOutput {
            name: &port.name,
            vid: port.vid.map(|v| format!("{v:04x}")),
            pid: port.pid.map(|p| format!("{p:04x}")),
            manufacturer: port.manufacturer.as_deref(),
            product: port.product.as_deref(),
            serial_number: port.serial_number.as_deref(),
        })
        .collect();

    match format {
        OutputFormat::Json => print_json(&rows),
        OutputFormat::Table => {
            let mut table = new_table(vec!["PORT", "VID:PID", "MANUFACTURER", "PRODUCT", "SERIAL"]);
            for row in &rows {
                let ids = match (&row.vid, &row.pid) {
                    (Some(vid), Some(pid)) => format!("{vid}:{pid}"),
                    _ => "-".to_string(),
                };
                table.add_row(vec![
                    row.name.to_string(),
                    ids,
                    row.manufacturer.unwrap_or("-").to_string(),
                    row.product.unwrap_or("-").to_string(),
                    row.serial_number.unwrap_or("-").to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for row in &rows {
                println!("{}", row.name);
            }
        }
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

pub fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

/// Hex bytes separated by spaces, as printed by most serial tools.
pub fn spaced_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn message_row(out: &MessageOutput) -> Vec<String> {
    vec![
        format!("0x{:02x}", out.signature),
        format!("0x{:02x}", out.instruction),
        format!("0x{:02x}", out.address),
        out.status.clone(),
        out.payload_size.to_string(),
        out.payload.clone(),
    ]
}

fn message_line(out: &MessageOutput) -> String {
    format!(
        "sig=0x{:02x} code=0x{:02x} addr=0x{:02x} status={} size={} payload={}",
        out.signature, out.instruction, out.address, out.status, out.payload_size, out.payload
    )
}

fn flag_label(set: bool, label: &str) -> String {
    if set {
        label.to_string()
    } else {
        "ok".to_string()
    }
}

fn now_unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}
