// TMC2226 register catalog
//
// The chip exposes separate read and write register maps that partially
// overlap numerically (e.g. 0x01 reads GSTAT but writing it clears flags),
// so the two directions are kept as distinct enums and never mix.

/// UART node address, strapped in hardware on the MS1/MS2 pins.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeAddress {
    Node0 = 0x00, // MS1 low,  MS2 low
    Node1 = 0x01, // MS1 high, MS2 low
    Node2 = 0x02, // MS1 low,  MS2 high
    Node3 = 0x03, // MS1 high, MS2 high
}

impl NodeAddress {
    /// Derive the address from the sampled MS1/MS2 strap levels.
    ///
    /// MS1 is the low bit of the address, MS2 the high bit. The pins are
    /// latched by the chip at power-up; read them once and keep the result.
    pub fn from_strap_pins(ms1_high: bool, ms2_high: bool) -> Self {
        match (ms1_high, ms2_high) {
            (false, false) => NodeAddress::Node0,
            (true, false) => NodeAddress::Node1,
            (false, true) => NodeAddress::Node2,
            (true, true) => NodeAddress::Node3,
        }
    }
}

/// Registers readable over UART.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadRegister {
    // General configuration
    Gconf = 0x00,
    Gstat = 0x01,       // global status flags
    Ifcnt = 0x02,       // UART write access counter
    OtpRead = 0x05,
    Ioin = 0x06,        // pin states + chip version
    FactoryConf = 0x07,
    // Velocity dependent control
    Tstep = 0x12,
    // StallGuard
    SgResult = 0x41,
    // Sequencer
    Mscnt = 0x6A,
    Mscuract = 0x6B,
    // Chopper control
    Chopconf = 0x6C,
    DrvStatus = 0x6F,
    Pwmconf = 0x70,
    PwmScale = 0x71,
    PwmAuto = 0x72,
}

/// Registers writable over UART.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteRegister {
    // General configuration
    Gconf = 0x00,
    Gstat = 0x01,       // write 1 bits to clear status flags
    Nodeconf = 0x03,    // SENDDELAY reply timing
    OtpProg = 0x04,
    FactoryConf = 0x07,
    // Velocity dependent control
    IholdIrun = 0x10,
    Tpowerdown = 0x11,
    Tpwmthrs = 0x13,
    // StallGuard
    Tcoolthrs = 0x14,
    Sgthrs = 0x40,
    Coolconf = 0x42,
    // Direct velocity mode
    Vactual = 0x22,
    // Chopper control
    Chopconf = 0x6C,
    Pwmconf = 0x70,
}

impl ReadRegister {
    /// Wire address byte (read direction, top bit clear).
    pub fn addr(self) -> u8 {
        self as u8
    }

    /// Bits of the 32-bit payload that carry defined meaning.
    ///
    /// Registers without a documented narrower width report all bits valid.
    pub fn mask(self) -> u32 {
        match self {
            ReadRegister::Gconf => 0x3FF,
            ReadRegister::Gstat => 0b111,
            ReadRegister::Ifcnt => 0xFF,
            ReadRegister::OtpRead => 0xFF_FFFF,
            ReadRegister::Ioin => 0xFF00_03FF,
            ReadRegister::FactoryConf => 0x31F,
            _ => 0xFFFF_FFFF,
        }
    }
}

impl WriteRegister {
    /// Wire address byte before the write flag is applied.
    pub fn addr(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strap_pin_addresses() {
        assert_eq!(NodeAddress::from_strap_pins(false, false), NodeAddress::Node0);
        assert_eq!(NodeAddress::from_strap_pins(true, false), NodeAddress::Node1);
        assert_eq!(NodeAddress::from_strap_pins(false, true), NodeAddress::Node2);
        assert_eq!(NodeAddress::from_strap_pins(true, true), NodeAddress::Node3);
    }

    #[test]
    fn test_known_masks() {
        assert_eq!(ReadRegister::Gconf.mask(), 0x3FF);
        assert_eq!(ReadRegister::Gstat.mask(), 0b111);
        assert_eq!(ReadRegister::Ifcnt.mask(), 0xFF);
        assert_eq!(ReadRegister::Ioin.mask(), 0xFF00_03FF);
        assert_eq!(ReadRegister::FactoryConf.mask(), 0b11_0001_1111);
    }

    #[test]
    fn test_default_mask_is_full_width() {
        assert_eq!(ReadRegister::DrvStatus.mask(), 0xFFFF_FFFF);
        assert_eq!(ReadRegister::SgResult.mask(), 0xFFFF_FFFF);
        assert_eq!(ReadRegister::Tstep.mask(), 0xFFFF_FFFF);
    }

    #[test]
    fn test_directions_are_distinct_types() {
        // Same wire address, different meaning per direction.
        assert_eq!(ReadRegister::Gstat.addr(), WriteRegister::Gstat.addr());
        // Write-only register has no readable counterpart at that address.
        assert_eq!(WriteRegister::Vactual.addr(), 0x22);
        assert_eq!(ReadRegister::Mscuract.addr(), 0x6B);
    }
}
