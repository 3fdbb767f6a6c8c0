use serde::Serialize;
use spinel_device::{DeviceId, InputState};

use crate::cmd::{DeviceArgs, InputArgs, MeasureAction, MeasureArgs};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{new_table, print_json, OutputFormat};

#[derive(Serialize)]
struct IdentifyOutput<'a> {
    port: &'a str,
    address: u8,
    id: &'a DeviceId,
}

#[derive(Serialize)]
struct InputOutput {
    channel: usize,
    state: InputState,
    enabled: bool,
}

#[derive(Serialize)]
struct AckOutput<'a> {
    port: &'a str,
    action: &'a str,
    channel: Option<u8>,
    ok: bool,
}

pub fn identify(args: DeviceArgs, format: OutputFormat) -> CliResult<i32> {
    let mut session = args.open_session()?;
    let id = session
        .identify()
        .map_err(|err| session_error("identify failed", err))?;
    session.close();

    match format {
        OutputFormat::Json => print_json(&IdentifyOutput {
            port: &args.port,
            address: args.address,
            id: &id,
        }),
        OutputFormat::Table => {
            let mut table = new_table(vec!["PORT", "ADDRESS", "DEVICE"]);
            table.add_row(vec![
                args.port.clone(),
                format!("0x{:02x}", args.address),
                id.to_string(),
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{id}"),
        OutputFormat::Raw => crate::output::print_raw(id.as_bytes()),
    }
    Ok(SUCCESS)
}

pub fn inputs(args: DeviceArgs, format: OutputFormat) -> CliResult<i32> {
    let mut session = args.open_session()?;
    let states = session
        .inputs()
        .map_err(|err| session_error("input query failed", err))?;
    session.close();

    let rows: Vec<InputOutput> = states
        .into_iter()
        .enumerate()
        .map(|(channel, state)| InputOutput {
            channel,
            state,
            enabled: state.is_enabled(),
        })
        .collect();

    match format {
        OutputFormat::Json => print_json(&rows),
        OutputFormat::Table => {
            let mut table = new_table(vec!["CHANNEL", "STATE"]);
            for row in &rows {
                table.add_row(vec![row.channel.to_string(), row.state.to_string()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for row in &rows {
                println!("ch{:02} {}", row.channel, row.state);
            }
        }
    }
    Ok(SUCCESS)
}

pub fn set_input(args: InputArgs, enable: bool, format: OutputFormat) -> CliResult<i32> {
    let mut session = args.device.open_session()?;
    let action = if enable { "enable" } else { "disable" };
    session
        .set_input(args.channel, enable)
        .map_err(|err| session_error(&format!("{action} failed"), err))?;
    session.close();

    print_ack(&args.device.port, action, Some(args.channel), format);
    Ok(SUCCESS)
}

pub fn measure(args: MeasureArgs, format: OutputFormat) -> CliResult<i32> {
    let mut session = args.device.open_session()?;
    let (result, action) = match args.action {
        MeasureAction::Start => (session.start_measuring(), "measure start"),
        MeasureAction::Stop => (session.stop_measuring(), "measure stop"),
    };
    result.map_err(|err| session_error(&format!("{action} failed"), err))?;
    session.close();

    print_ack(&args.device.port, action, None, format);
    Ok(SUCCESS)
}

fn print_ack(port: &str, action: &str, channel: Option<u8>, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&AckOutput {
            port,
            action,
            channel,
            ok: true,
        }),
        _ => match channel {
            Some(channel) => println!("{action} channel {channel}: ok"),
            None => println!("{action}: ok"),
        },
    }
}
