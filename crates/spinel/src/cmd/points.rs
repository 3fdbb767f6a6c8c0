use spinel_frame::{decode_message, decode_points};

use crate::cmd::{parse_hex, PointsArgs};
use crate::exit::{frame_error, CliResult, SUCCESS};
use crate::output::{print_points, OutputFormat};

pub fn run(args: PointsArgs, format: OutputFormat) -> CliResult<i32> {
    let bytes = parse_hex(&args.payload)?;
    let payload = if args.frame {
        decode_message(&bytes, false)
            .map_err(|err| frame_error("decode failed", err))?
            .payload
            .to_vec()
    } else {
        bytes
    };

    let points = decode_points(&payload).map_err(|err| frame_error("points failed", err))?;
    print_points(&points, format);
    Ok(SUCCESS)
}
