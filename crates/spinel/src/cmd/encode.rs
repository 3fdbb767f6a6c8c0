use spinel_frame::Message;

use crate::cmd::{parse_hex, EncodeArgs};
use crate::exit::{frame_error, CliResult, SUCCESS};
use crate::output::{print_encoded, OutputFormat};

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let payload = parse_hex(&args.payload)?;
    let message = Message::new(args.signature, args.code)
        .with_address(args.address)
        .with_payload(payload);

    let frame = message
        .to_bytes()
        .map_err(|err| frame_error("encode failed", err))?;
    print_encoded(&frame, &message, format);
    Ok(SUCCESS)
}
