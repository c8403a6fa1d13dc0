use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::debug;

use crate::error::ConnectError;

/// Read/write timeout on serial ports. Serial has no out-of-band close,
/// so blocked operations must surface periodically for the stream status
/// check that implements cooperative cancellation.
pub(crate) const IO_TIMEOUT: Duration = Duration::from_millis(100);

/// Open a radio-serial device at the given baud rate, 8N1, no flow control.
pub(crate) fn open(
    id: &str,
    device: &str,
    baud: u32,
) -> Result<Box<dyn SerialPort>, ConnectError> {
    let port = serialport::new(device, baud)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(IO_TIMEOUT)
        .open()
        .map_err(|source| ConnectError::Serial {
            id: id.to_string(),
            device: device.to_string(),
            source,
        })?;

    debug!(id, device, baud, "serial stream opened");
    Ok(port)
}
