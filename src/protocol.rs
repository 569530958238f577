// TMC2226 UART datagram codec
//
// Wire format (all shapes end in a CRC of the preceding bytes):
//   read request:  [0x05, node, reg,        crc]                 4 bytes
//   write request: [0x05, node, reg | 0x80, data_be(4), crc]     8 bytes
//   read reply:    [0x05, 0xFF, reg,        data_be(4), crc]     8 bytes
//
// The reply address byte is the fixed master address (0xFF), not the node
// address, so parsing checks the CRC and the echoed register but not byte 1.

use crate::registers::{NodeAddress, ReadRegister, WriteRegister};

/// Sync nibble + reserved bits, first byte of every datagram.
pub const SYNC: u8 = 0x05;

/// Top bit of the register byte selects write access.
pub const WRITE_FLAG: u8 = 0x80;

pub const READ_REQUEST_LEN: usize = 4;
pub const WRITE_REQUEST_LEN: usize = 8;
pub const READ_REPLY_LEN: usize = 8;

/// Error types for TMC2226 communication
#[derive(Debug, thiserror::Error)]
pub enum Tmc2226Error {
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("timed out waiting for {expected} bytes from the bus")]
    Timeout { expected: usize },

    #[error("reply checksum mismatch: computed 0x{computed:02X}, received 0x{received:02X}")]
    ChecksumMismatch { computed: u8, received: u8 },

    #[error("reply register mismatch: requested 0x{requested:02X}, echoed 0x{echoed:02X}")]
    RegisterMismatch { requested: u8, echoed: u8 },
}

pub type Result<T> = std::result::Result<T, Tmc2226Error>;

/// CRC-8 used by the chip: reflected input, polynomial 0x07, init 0.
///
/// Bits of each byte are fed LSB first, per the datasheet reference code.
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = 0u8;
    for &byte in data {
        let mut byte = byte;
        for _ in 0..8 {
            if (crc >> 7) ^ (byte & 0x01) != 0 {
                crc = (crc << 1) ^ 0x07;
            } else {
                crc <<= 1;
            }
            byte >>= 1;
        }
    }
    crc
}

/// Encoded 4-byte read request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRequest {
    bytes: [u8; READ_REQUEST_LEN],
}

impl ReadRequest {
    pub fn new(node: NodeAddress, register: ReadRegister) -> Self {
        let mut bytes = [SYNC, node as u8, register.addr(), 0];
        bytes[3] = crc8(&bytes[..3]);
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Encoded 8-byte write request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteRequest {
    bytes: [u8; WRITE_REQUEST_LEN],
}

impl WriteRequest {
    pub fn new(node: NodeAddress, register: WriteRegister, value: u32) -> Self {
        let mut bytes = [0u8; WRITE_REQUEST_LEN];
        bytes[0] = SYNC;
        bytes[1] = node as u8;
        bytes[2] = register.addr() | WRITE_FLAG;
        bytes[3..7].copy_from_slice(&value.to_be_bytes());
        bytes[7] = crc8(&bytes[..7]);
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Validate an 8-byte read reply and extract the masked register value.
///
/// Checks the trailing CRC and that the echoed register byte matches the
/// requested register; reserved payload bits are cleared via the register's
/// mask before the value is returned.
pub fn parse_read_reply(reply: &[u8; READ_REPLY_LEN], register: ReadRegister) -> Result<u32> {
    let computed = crc8(&reply[..7]);
    if computed != reply[7] {
        return Err(Tmc2226Error::ChecksumMismatch {
            computed,
            received: reply[7],
        });
    }

    let echoed = reply[2] & !WRITE_FLAG;
    if echoed != register.addr() {
        return Err(Tmc2226Error::RegisterMismatch {
            requested: register.addr(),
            echoed,
        });
    }

    let raw = u32::from_be_bytes([reply[3], reply[4], reply[5], reply[6]]);
    Ok(raw & register.mask())
}
