// Per-node session and motion helpers
//
// A Tmc2226Node owns the node address and the configuration state the
// driver itself wrote, but not the line: every transaction borrows the
// transport, so up to four sessions can share one half-duplex bus.

use tracing::{debug, info};

use crate::protocol::{
    parse_read_reply, ReadRequest, Result, WriteRequest, READ_REPLY_LEN, READ_REQUEST_LEN,
};
use crate::registers::{NodeAddress, ReadRegister, WriteRegister};
use crate::transport::Transport;

/// NODECONF with SENDDELAY = 2: a queried node waits 3 byte-times before
/// replying, which keeps multiple nodes from colliding on the shared line.
pub const NODECONF_MULTI_NODE: u32 = 0x02 << 8;

/// GCONF value written at init:
///   bit 0 I_scale_analog   = 1  VREF is the current reference
///   bit 1 internal_Rsense  = 0  external sense resistors
///   bit 2 en_SpreadCycle   = 0
///   bit 3 shaft            = 0
///   bit 4 index_otpw       = 0
///   bit 5 index_step       = 1
///   bit 6 pdn_disable      = 1  UART control on the PDN pin
///   bit 7 mstep_reg_select = 1  microstep resolution from CHOPCONF.MRES
///   bit 8 multistep_filt   = 1
///   bit 9 test_mode        = 0  never set
pub const GCONF_UART_CONTROL: u32 = 0b01_1110_0001;

/// Motion constants used to turn an rpm request into a VACTUAL value.
#[derive(Debug, Clone, Copy)]
pub struct MotionConfig {
    /// Full steps per motor revolution, typically 200.
    pub steps_per_rev: u16,
    /// CHOPCONF MRES exponent: microsteps per full step = 2^(8 - mres),
    /// so 0 means 256 microstepping and 8 means full steps.
    pub mres: u8,
    /// Scale factor of the chip's internal clock, 0.715 per the datasheet.
    pub clock_scale: f32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            steps_per_rev: 200,
            mres: 8,
            clock_scale: 0.715,
        }
    }
}

impl MotionConfig {
    /// Convert a speed in rpm to the chip's signed VACTUAL unit.
    ///
    /// Truncates toward zero; the sign selects the direction and 0 stops
    /// the motor. No clamping against the chip's velocity ceiling is done
    /// here, out-of-range requests are the caller's problem.
    pub fn vactual_from_rpm(&self, rpm: f32) -> i32 {
        let usteps_per_rev = self.steps_per_rev as f32 * (1u32 << (8 - self.mres.min(8))) as f32;
        (rpm * usteps_per_rev / self.clock_scale) as i32
    }
}

/// Session for one TMC2226 on the shared bus.
pub struct Tmc2226Node {
    addr: NodeAddress,
    gconf: u32,
    nodeconf: u32,
    motion: MotionConfig,
}

impl Tmc2226Node {
    /// Session object without any bus traffic, for read-only diagnostics.
    ///
    /// The configuration caches start at zero; use [`Tmc2226Node::init`]
    /// before driving a motor.
    pub fn new(addr: NodeAddress, motion: MotionConfig) -> Self {
        Self {
            addr,
            gconf: 0,
            nodeconf: 0,
            motion,
        }
    }

    /// Create a session and bring the chip into UART-controlled mode.
    ///
    /// NODECONF is written first so the node's reply timing is safe for
    /// multi-node operation before any further traffic, then GCONF enables
    /// register-based control.
    pub fn init<T: Transport>(bus: &mut T, addr: NodeAddress, motion: MotionConfig) -> Result<Self> {
        info!("initializing TMC2226 node {:?}", addr);
        let mut node = Self::new(addr, motion);
        node.write_register(bus, WriteRegister::Nodeconf, NODECONF_MULTI_NODE)?;
        node.write_register(bus, WriteRegister::Gconf, GCONF_UART_CONTROL)?;
        Ok(node)
    }

    pub fn node_address(&self) -> NodeAddress {
        self.addr
    }

    /// Last GCONF value written by this session.
    pub fn gconf(&self) -> u32 {
        self.gconf
    }

    /// Last NODECONF value written by this session.
    pub fn nodeconf(&self) -> u32 {
        self.nodeconf
    }

    /// Read a register, one blocking round trip on the bus.
    ///
    /// The single-wire line loops our own transmission back into the
    /// receiver, so after sending the request the full 4-byte echo is
    /// drained before the 8-byte reply is read. Stale input (e.g. echoes
    /// of earlier fire-and-forget writes) is discarded up front. Fails on
    /// timeout or a bad reply; no retry at this layer.
    pub fn read_register<T: Transport>(&self, bus: &mut T, register: ReadRegister) -> Result<u32> {
        let request = ReadRequest::new(self.addr, register);

        bus.discard_input()?;
        bus.transmit(request.as_bytes())?;

        let mut echo = [0u8; READ_REQUEST_LEN];
        bus.receive(&mut echo)?;

        let mut reply = [0u8; READ_REPLY_LEN];
        bus.receive(&mut reply)?;

        let value = parse_read_reply(&reply, register)?;
        debug!("node {:?}: read {:?} = 0x{:08X}", self.addr, register, value);
        Ok(value)
    }

    /// Write a register, fire-and-forget.
    ///
    /// The protocol has no write acknowledgment; a silent failure is only
    /// detectable by reading IFCNT afterwards. GCONF/NODECONF writes update
    /// the session's cached copies.
    pub fn write_register<T: Transport>(
        &mut self,
        bus: &mut T,
        register: WriteRegister,
        value: u32,
    ) -> Result<()> {
        let request = WriteRequest::new(self.addr, register, value);
        debug!("node {:?}: write {:?} = 0x{:08X}", self.addr, register, value);
        bus.transmit(request.as_bytes())?;

        match register {
            WriteRegister::Gconf => self.gconf = value,
            WriteRegister::Nodeconf => self.nodeconf = value,
            _ => {}
        }
        Ok(())
    }

    /// Run the motor at the requested speed via VACTUAL.
    ///
    /// Negative rpm reverses direction, 0 stops. The i32 two's-complement
    /// bit pattern goes on the wire.
    pub fn set_speed_rpm<T: Transport>(&mut self, bus: &mut T, rpm: f32) -> Result<()> {
        let vactual = self.motion.vactual_from_rpm(rpm);
        debug!("node {:?}: {} rpm -> VACTUAL {}", self.addr, rpm, vactual);
        self.write_register(bus, WriteRegister::Vactual, vactual as u32)
    }

    /// Stop the motor.
    pub fn stop<T: Transport>(&mut self, bus: &mut T) -> Result<()> {
        self.set_speed_rpm(bus, 0.0)
    }

    /// Hook for driver stage enable. The EN input is a hardware pin outside
    /// the UART link on this board, so this performs no register access.
    pub fn enable_driver<T: Transport>(&mut self, _bus: &mut T) -> Result<()> {
        Ok(())
    }

    /// Hook for driver stage disable, see [`Tmc2226Node::enable_driver`].
    pub fn disable_driver<T: Transport>(&mut self, _bus: &mut T) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{crc8, Tmc2226Error, SYNC};
    use std::collections::VecDeque;

    /// Scripted bus. Echoes every transmission back into the receive
    /// buffer like the single-wire line does; scripted replies follow the
    /// echo of the request that triggered them.
    struct MockTransport {
        sent: Vec<u8>,
        pending: VecDeque<u8>,
        scripted: VecDeque<u8>,
        echo_enabled: bool,
        discards: usize,
    }

    impl MockTransport {
        fn new() -> Self {
            Self {
                sent: Vec::new(),
                pending: VecDeque::new(),
                scripted: VecDeque::new(),
                echo_enabled: true,
                discards: 0,
            }
        }

        fn queue_reply(&mut self, register: ReadRegister, raw: u32) {
            let mut reply = [0u8; READ_REPLY_LEN];
            reply[0] = SYNC;
            reply[1] = 0xFF; // master address echo
            reply[2] = register.addr();
            reply[3..7].copy_from_slice(&raw.to_be_bytes());
            reply[7] = crc8(&reply[..7]);
            self.scripted.extend(reply);
        }
    }

    impl Transport for MockTransport {
        fn transmit(&mut self, bytes: &[u8]) -> Result<()> {
            self.sent.extend_from_slice(bytes);
            if self.echo_enabled {
                self.pending.extend(bytes);
            }
            // The node answers only after it has seen the request.
            self.pending.append(&mut self.scripted);
            Ok(())
        }

        fn receive(&mut self, buf: &mut [u8]) -> Result<()> {
            if self.pending.len() < buf.len() {
                return Err(Tmc2226Error::Timeout {
                    expected: buf.len(),
                });
            }
            for slot in buf.iter_mut() {
                *slot = self.pending.pop_front().unwrap();
            }
            Ok(())
        }

        fn discard_input(&mut self) -> Result<()> {
            self.discards += self.pending.len();
            self.pending.clear();
            Ok(())
        }
    }

    #[test]
    fn test_init_writes_nodeconf_then_gconf() {
        let mut bus = MockTransport::new();
        let node =
            Tmc2226Node::init(&mut bus, NodeAddress::Node0, MotionConfig::default()).unwrap();

        assert_eq!(
            bus.sent,
            vec![
                // NODECONF = 0x0200 (SENDDELAY 2)
                0x05, 0x00, 0x83, 0x00, 0x00, 0x02, 0x00, 0x4D,
                // GCONF = 0b0111100001
                0x05, 0x00, 0x80, 0x00, 0x00, 0x01, 0xE1, 0x63,
            ]
        );
        assert_eq!(node.nodeconf(), NODECONF_MULTI_NODE);
        assert_eq!(node.gconf(), GCONF_UART_CONTROL);
    }

    #[test]
    fn test_read_drains_echo_before_reply() {
        let mut bus = MockTransport::new();
        bus.queue_reply(ReadRegister::Gconf, 0x0000_01E1);

        let node = Tmc2226Node::new(NodeAddress::Node2, MotionConfig::default());
        let value = node.read_register(&mut bus, ReadRegister::Gconf).unwrap();

        assert_eq!(value, 0x1E1);
        assert_eq!(bus.sent, vec![0x05, 0x02, 0x00, 0x13]);
        // Echo and reply fully consumed, nothing left on the line.
        assert!(bus.pending.is_empty());
    }

    #[test]
    fn test_read_discards_stale_input_first() {
        let mut bus = MockTransport::new();
        let node = Tmc2226Node::new(NodeAddress::Node1, MotionConfig::default());

        // A prior write's loop-back is still sitting in the receive buffer.
        bus.pending.extend([0xAA; 8]);
        bus.queue_reply(ReadRegister::Ifcnt, 0x0000_0007);

        // Without the discard the stale bytes would be mistaken for the
        // echo and the read would parse garbage.
        let value = node.read_register(&mut bus, ReadRegister::Ifcnt).unwrap();
        assert_eq!(value, 0x07);
        assert_eq!(bus.discards, 8);
    }

    #[test]
    fn test_read_surfaces_checksum_failure() {
        let mut bus = MockTransport::new();
        bus.queue_reply(ReadRegister::DrvStatus, 0x8000_00C0);
        // Corrupt the payload after the CRC was computed.
        let idx = bus.scripted.len() - 3;
        bus.scripted[idx] ^= 0x01;

        let node = Tmc2226Node::new(NodeAddress::Node0, MotionConfig::default());
        let err = node
            .read_register(&mut bus, ReadRegister::DrvStatus)
            .unwrap_err();
        assert!(matches!(err, Tmc2226Error::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_read_timeout_propagates() {
        let mut bus = MockTransport::new();
        bus.echo_enabled = false; // nothing comes back at all

        let node = Tmc2226Node::new(NodeAddress::Node3, MotionConfig::default());
        let err = node.read_register(&mut bus, ReadRegister::Gstat).unwrap_err();
        assert!(matches!(err, Tmc2226Error::Timeout { expected: 4 }));
    }

    #[test]
    fn test_write_sends_single_datagram_and_caches_config() {
        let mut bus = MockTransport::new();
        let mut node = Tmc2226Node::new(NodeAddress::Node1, MotionConfig::default());

        node.write_register(&mut bus, WriteRegister::Gconf, 0x1C1).unwrap();
        assert_eq!(bus.sent.len(), 8);
        assert_eq!(node.gconf(), 0x1C1);

        // Non-config writes leave the caches alone.
        node.write_register(&mut bus, WriteRegister::Sgthrs, 0x40).unwrap();
        assert_eq!(node.gconf(), 0x1C1);
        assert_eq!(node.nodeconf(), 0);
    }

    #[test]
    fn test_vactual_conversion() {
        let motion = MotionConfig::default();
        assert_eq!(motion.vactual_from_rpm(0.0), 0);

        // 200 steps/rev, full step, clock scale 0.715
        assert_eq!(motion.vactual_from_rpm(-10.0), -2797);
        assert!(motion.vactual_from_rpm(10.0) > 0);

        // Doubling rpm doubles the value up to truncation.
        let v1 = motion.vactual_from_rpm(1.0);
        let v2 = motion.vactual_from_rpm(2.0);
        assert!((v2 - 2 * v1).abs() <= 1, "v1={v1} v2={v2}");
    }

    #[test]
    fn test_vactual_scales_with_microstepping() {
        let full = MotionConfig::default();
        let sixteenth = MotionConfig {
            mres: 4,
            ..MotionConfig::default()
        };
        // 2^(8-4) = 16 microsteps per full step.
        assert_eq!(
            sixteenth.vactual_from_rpm(1.0),
            full.vactual_from_rpm(16.0)
        );
    }

    #[test]
    fn test_set_speed_writes_vactual_big_endian() {
        let mut bus = MockTransport::new();
        let mut node = Tmc2226Node::new(NodeAddress::Node0, MotionConfig::default());

        node.set_speed_rpm(&mut bus, -10.0).unwrap();
        assert_eq!(bus.sent[2], 0x22 | 0x80);
        assert_eq!(&bus.sent[3..7], &(-2797i32).to_be_bytes());
        assert_eq!(bus.sent[7], crc8(&bus.sent[..7]));

        bus.sent.clear();
        node.stop(&mut bus).unwrap();
        assert_eq!(&bus.sent[3..7], &[0, 0, 0, 0]);
    }
}
