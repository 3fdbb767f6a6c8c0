use spinel_frame::decode_message;

use crate::cmd::{parse_hex, DecodeArgs};
use crate::exit::{frame_error, CliResult, SUCCESS};
use crate::output::{print_message, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let bytes = parse_hex(&args.frame)?;
    let message =
        decode_message(&bytes, !args.no_check).map_err(|err| frame_error("decode failed", err))?;
    print_message(&message, format);
    Ok(SUCCESS)
}
