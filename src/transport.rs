// Byte transport over the shared half-duplex line
//
// The driver never talks to a serial port directly; it goes through the
// Transport trait so node sessions can share one physical line and tests
// can script the bus. SerialTransport is the hardware-backed implementation.

use std::io::{Read, Write};
use std::time::Duration;

use serialport::{ClearBuffer, DataBits, Parity, SerialPort, StopBits};
use tracing::trace;

use crate::protocol::{Result, Tmc2226Error};

/// Fixed line rate of the chip's UART interface.
pub const BAUD_RATE: u32 = 9600;

/// Default bound on each blocking receive.
pub const DEFAULT_TIMEOUT_MS: u64 = 100;

/// Blocking byte I/O on the shared line.
///
/// The line is half-duplex single-wire: every transmitted byte loops back
/// into the receiver, which is why sessions need `discard_input` and an
/// echo drain around each read transaction.
pub trait Transport {
    /// Transmit all bytes.
    fn transmit(&mut self, bytes: &[u8]) -> Result<()>;

    /// Receive exactly `buf.len()` bytes within the transport's timeout.
    fn receive(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Drop any bytes already sitting in the receive buffer.
    fn discard_input(&mut self) -> Result<()>;
}

/// Serial port transport: 9600 bit/s, 8 data bits, no parity, 1 stop bit.
///
/// The single-wire wiring itself (TX/RX tied through the usual 1k resistor,
/// or an adapter's half-duplex mode) is outside software control.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Open the line with the default receive timeout.
    pub fn open(port_name: &str) -> Result<Self> {
        Self::open_with_timeout(port_name, Duration::from_millis(DEFAULT_TIMEOUT_MS))
    }

    /// Open the line with a caller-supplied receive timeout.
    pub fn open_with_timeout(port_name: &str, timeout: Duration) -> Result<Self> {
        let port = serialport::new(port_name, BAUD_RATE)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(timeout)
            .open()?;

        Ok(Self { port })
    }
}

impl Transport for SerialTransport {
    fn transmit(&mut self, bytes: &[u8]) -> Result<()> {
        trace!("tx {:02X?}", bytes);
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(())
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<()> {
        self.port.read_exact(buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::TimedOut {
                Tmc2226Error::Timeout {
                    expected: buf.len(),
                }
            } else {
                Tmc2226Error::Io(e)
            }
        })?;
        trace!("rx {:02X?}", buf);
        Ok(())
    }

    fn discard_input(&mut self) -> Result<()> {
        self.port.clear(ClearBuffer::Input)?;
        Ok(())
    }
}
