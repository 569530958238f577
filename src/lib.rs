// TMC2226 UART driver
//
// Host-side driver for TMC2226 stepper drivers controlled over their
// single-wire UART interface. Up to four chips share one line, selected
// by a 2-bit address strapped on the MS1/MS2 pins.
//
// Provides:
// - Datagram codec with the chip's reflected CRC-8 (protocol)
// - Read/write register catalog with per-register bit masks (registers)
// - Blocking byte transport abstraction + serialport backend (transport)
// - Per-node session with init sequence and rpm speed control (driver)

pub mod driver;
pub mod protocol;
pub mod registers;
pub mod transport;

pub use driver::{MotionConfig, Tmc2226Node};
pub use protocol::{Result, Tmc2226Error};
pub use registers::{NodeAddress, ReadRegister, WriteRegister};
pub use transport::{SerialTransport, Transport};
