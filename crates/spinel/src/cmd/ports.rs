use spinel_transport::list_ports;
use tracing::debug;

use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_ports, OutputFormat};

pub fn run(format: OutputFormat) -> CliResult<i32> {
    let ports = list_ports();
    debug!(count = ports.len(), "serial ports found");
    print_ports(&ports, format);
    Ok(SUCCESS)
}
