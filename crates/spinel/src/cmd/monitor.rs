use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use spinel_frame::{
    decode_points, is_unsolicited, FrameReader, FramerConfig, FramerEvent, Message, Point,
};
use spinel_transport::SerialTransport;
use tracing::{debug, info, warn};

use crate::cmd::MonitorArgs;
use crate::exit::{frame_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_points, print_stream_message, OutputFormat};

pub fn run(args: MonitorArgs, format: OutputFormat) -> CliResult<i32> {
    let port = SerialTransport::open(&args.device.serial_config())
        .map_err(|err| transport_error("open failed", err))?;
    let mut reader = FrameReader::with_config(
        port,
        FramerConfig {
            check_response_code: false,
        },
    );

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        let event = reader
            .poll_event()
            .map_err(|err| frame_error("read failed", err))?;

        match event {
            Some(FramerEvent::Frame(message)) => {
                print_stream_message(&message, format);
                if args.points {
                    match report_points(&message) {
                        Some(Ok(points)) => print_points(&points, format),
                        Some(Err(err)) => warn!(%err, %message, "report payload not decodable"),
                        None => {}
                    }
                }

                printed = printed.saturating_add(1);
                if args.count.is_some_and(|count| printed >= count) {
                    break;
                }
            }
            Some(FramerEvent::Discarded { error, frame }) => {
                debug!(%error, len = frame.len(), "frame dropped")
            }
            Some(FramerEvent::BadHeader(header)) => debug!(?header, "resynchronized"),
            Some(FramerEvent::Skipped(_)) | None => {}
        }
    }

    let stats = reader.framer().stats();
    info!(
        frames = stats.frames,
        skipped = stats.skipped,
        bad_headers = stats.bad_headers,
        discarded = stats.discarded,
        "monitor stopped"
    );
    Ok(SUCCESS)
}

/// Decoded records of an unsolicited report; `None` for any other frame.
fn report_points(message: &Message) -> Option<spinel_frame::Result<Vec<Point>>> {
    is_unsolicited(message.instruction).then(|| decode_points(&message.payload))
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
