// Licensed under the Apache-2.0 license

//! Register access layer.
//!
//! The engine reads and writes named fields only. How those fields map onto the
//! silicon (register offsets, bit positions) is data held in a [`RegisterLayout`],
//! so the same engine runs on the classic PXA2xx map and on the PXA3xx/MMP map.
//!
//! Registers used:
//!
//! | name | role                                   |
//! |------|----------------------------------------|
//! | IBMR | bus monitor, live SCL/SDA levels       |
//! | IDBR | data buffer                            |
//! | ICR  | control                                |
//! | ISR  | status, write-one-to-clear             |
//! | ISAR | own slave address                      |
//! | IRCR | reset cycle count (forced-clock reset) |

use core::ptr::NonNull;

use tock_registers::fields::Field;
use tock_registers::interfaces::{Readable, Writeable};
use tock_registers::registers::ReadWrite;
use tock_registers::{register_bitfields, LocalRegisterCopy, RegisterLongName};

use crate::i2c::common::I2cSpeed;

/// Control register (ICR) fields.
///
/// `start`, `stop`, `acknak`, `tb` and `ma` are strobes for the next byte; the rest
/// are persistent mode bits.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Control {
    pub start: bool,
    pub stop: bool,
    /// Send NAK instead of ACK after the next received byte.
    pub acknak: bool,
    /// Transfer byte.
    pub tb: bool,
    /// Master abort.
    pub ma: bool,
    /// Drive SCL as master.
    pub scle: bool,
    /// Unit enable.
    pub iue: bool,
    /// General call disable.
    pub gcd: bool,
    pub ite_ie: bool,
    pub irf_ie: bool,
    pub be_ie: bool,
    pub ssd_ie: bool,
    pub ald_ie: bool,
    pub sad_ie: bool,
    /// Unit reset.
    pub ur: bool,
    pub speed: Speed,
    /// Pad hand-over used while sending the high-speed master code.
    pub gpio_en: bool,
    /// Forced-clock bus reset request, self-clearing.
    pub rst_req: bool,
}

/// Speed-mode bits carried in ICR.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Speed {
    #[default]
    Standard,
    Fast,
    High,
}

impl From<I2cSpeed> for Speed {
    fn from(speed: I2cSpeed) -> Self {
        match speed {
            I2cSpeed::Standard => Speed::Standard,
            I2cSpeed::Fast => Speed::Fast,
            I2cSpeed::HighSpeed => Speed::High,
        }
    }
}

impl Control {
    /// Same control word with every per-byte strobe cleared.
    #[must_use]
    pub fn without_strobes(self) -> Self {
        Self {
            start: false,
            stop: false,
            acknak: false,
            tb: false,
            ma: false,
            ..self
        }
    }

    /// Bits that must survive between transfers: unit enable, speed class and the
    /// interrupt enables. Used by the shadow check.
    #[must_use]
    pub fn mode_bits(self) -> Self {
        Self {
            iue: self.iue,
            gcd: self.gcd,
            ite_ie: self.ite_ie,
            irf_ie: self.irf_ie,
            be_ie: self.be_ie,
            ssd_ie: self.ssd_ie,
            sad_ie: self.sad_ie,
            speed: self.speed,
            ..Self::default()
        }
    }
}

/// Status register (ISR) fields.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Status {
    /// Read/write mode of the current transaction (set = read).
    pub rwm: bool,
    /// NAK received (master) or sent (slave).
    pub acknak: bool,
    /// Unit busy.
    pub ub: bool,
    /// Bus busy, driven by another unit.
    pub ibb: bool,
    /// Slave stop detected.
    pub ssd: bool,
    /// Arbitration lost.
    pub ald: bool,
    /// Transmit buffer empty.
    pub ite: bool,
    /// Receive buffer full.
    pub irf: bool,
    /// General call address detected.
    pub gcad: bool,
    /// Slave address detected.
    pub sad: bool,
    /// Bus error.
    pub bed: bool,
}

impl Status {
    /// Every write-one-to-clear event bit set.
    pub const ALL_EVENTS: Self = Self {
        rwm: false,
        acknak: false,
        ub: false,
        ibb: false,
        ssd: true,
        ald: true,
        ite: true,
        irf: true,
        gcad: true,
        sad: true,
        bed: true,
    };

    /// Event bits only; the level bits (`rwm`, `acknak`, `ub`, `ibb`) are dropped.
    #[must_use]
    pub fn events(self) -> Self {
        Self {
            ssd: self.ssd,
            ald: self.ald,
            ite: self.ite,
            irf: self.irf,
            gcad: self.gcad,
            sad: self.sad,
            bed: self.bed,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn has_event(self) -> bool {
        self.events() != Self::default()
    }

    /// Another master or our own unit still owns the bus.
    #[must_use]
    pub fn busy(self) -> bool {
        self.ub || self.ibb
    }
}

/// Live bus levels from IBMR.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BusLines {
    pub scl: bool,
    pub sda: bool,
}

impl BusLines {
    #[must_use]
    pub fn idle(self) -> bool {
        self.scl && self.sda
    }
}

/// Typed access to one controller instance.
///
/// Implemented by [`MmioRegisters`] on hardware and by simulators in tests.
pub trait I2cRegisters {
    fn read_control(&self) -> Control;
    fn write_control(&mut self, control: Control);
    fn read_status(&mut self) -> Status;
    /// Acknowledge the event bits set in `events`.
    fn clear_status(&mut self, events: Status);
    fn read_data(&mut self) -> u8;
    fn write_data(&mut self, byte: u8);
    fn read_own_address(&self) -> u8;
    fn write_own_address(&mut self, addr: u8);
    fn bus_lines(&mut self) -> BusLines;
    /// Clock pulses issued by a forced-clock reset.
    fn write_reset_cycles(&mut self, cycles: u8);

    fn modify_control<F: FnOnce(&mut Control)>(&mut self, f: F) {
        let mut control = self.read_control();
        f(&mut control);
        self.write_control(control);
    }
}

/// Byte offsets of each register from the controller base.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RegisterOffsets {
    pub ibmr: usize,
    pub idbr: usize,
    pub icr: usize,
    pub isr: usize,
    pub isar: usize,
    pub ircr: Option<usize>,
}

/// Bit positions of the ICR fields.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ControlBits {
    pub start: u8,
    pub stop: u8,
    pub acknak: u8,
    pub tb: u8,
    pub ma: u8,
    pub scle: u8,
    pub iue: u8,
    pub gcd: u8,
    pub ite_ie: u8,
    pub irf_ie: u8,
    pub be_ie: u8,
    pub ssd_ie: u8,
    pub ald_ie: u8,
    pub sad_ie: u8,
    pub ur: u8,
    pub fast: u8,
    pub high: Option<u8>,
    pub gpio_en: Option<u8>,
    pub rst_req: Option<u8>,
}

/// Bit positions of the ISR fields.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StatusBits {
    pub rwm: u8,
    pub acknak: u8,
    pub ub: u8,
    pub ibb: u8,
    pub ssd: u8,
    pub ald: u8,
    pub ite: u8,
    pub irf: u8,
    pub gcad: u8,
    pub sad: u8,
    pub bed: u8,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RegisterLayout {
    pub offsets: RegisterOffsets,
    pub control: ControlBits,
    pub status: StatusBits,
    pub ibmr_sda: u8,
    pub ibmr_scl: u8,
}

const PXA_CONTROL_BITS: ControlBits = ControlBits {
    start: 0,
    stop: 1,
    acknak: 2,
    tb: 3,
    ma: 4,
    scle: 5,
    iue: 6,
    gcd: 7,
    ite_ie: 8,
    irf_ie: 9,
    be_ie: 10,
    ssd_ie: 11,
    ald_ie: 12,
    sad_ie: 13,
    ur: 14,
    fast: 15,
    high: Some(16),
    gpio_en: Some(19),
    rst_req: Some(24),
};

const PXA_STATUS_BITS: StatusBits = StatusBits {
    rwm: 0,
    acknak: 1,
    ub: 2,
    ibb: 3,
    ssd: 4,
    ald: 5,
    ite: 6,
    irf: 7,
    gcad: 8,
    sad: 9,
    bed: 10,
};

impl RegisterLayout {
    /// PXA25x/27x register map (8-byte register stride).
    pub const PXA2XX: Self = Self {
        offsets: RegisterOffsets {
            ibmr: 0x00,
            idbr: 0x08,
            icr: 0x10,
            isr: 0x18,
            isar: 0x20,
            ircr: None,
        },
        control: ControlBits {
            high: None,
            gpio_en: None,
            rst_req: None,
            ..PXA_CONTROL_BITS
        },
        status: PXA_STATUS_BITS,
        ibmr_sda: 0,
        ibmr_scl: 1,
    };

    /// PXA3xx/MMP register map (4-byte stride, high-speed and bus-reset support).
    pub const PXA3XX: Self = Self {
        offsets: RegisterOffsets {
            ibmr: 0x00,
            idbr: 0x04,
            icr: 0x08,
            isr: 0x0c,
            isar: 0x10,
            ircr: Some(0x20),
        },
        control: PXA_CONTROL_BITS,
        status: PXA_STATUS_BITS,
        ibmr_sda: 0,
        ibmr_scl: 1,
    };
}

register_bitfields![u32,
    pub IDBR [
        DATA OFFSET(0) NUMBITS(8) []
    ],
    pub ISAR [
        ADDR OFFSET(0) NUMBITS(7) []
    ],
    pub IRCR [
        CYCLES OFFSET(0) NUMBITS(8) []
    ]
];

/// ICR, fields positioned by [`ControlBits`].
pub enum Icr {}
impl RegisterLongName for Icr {}

/// ISR, fields positioned by [`StatusBits`].
pub enum Isr {}
impl RegisterLongName for Isr {}

/// IBMR, fields positioned by [`RegisterLayout`].
pub enum Ibmr {}
impl RegisterLongName for Ibmr {}

/// One-bit field at a layout-supplied position.
fn flag<R: RegisterLongName>(pos: u8) -> Field<u32, R> {
    Field::new(1, usize::from(pos))
}

impl ControlBits {
    #[must_use]
    pub fn pack(&self, c: Control) -> u32 {
        let mut icr = LocalRegisterCopy::<u32, Icr>::new(0);
        for (pos, on) in [
            (self.start, c.start),
            (self.stop, c.stop),
            (self.acknak, c.acknak),
            (self.tb, c.tb),
            (self.ma, c.ma),
            (self.scle, c.scle),
            (self.iue, c.iue),
            (self.gcd, c.gcd),
            (self.ite_ie, c.ite_ie),
            (self.irf_ie, c.irf_ie),
            (self.be_ie, c.be_ie),
            (self.ssd_ie, c.ssd_ie),
            (self.ald_ie, c.ald_ie),
            (self.sad_ie, c.sad_ie),
            (self.ur, c.ur),
        ] {
            icr.modify(flag::<Icr>(pos).val(u32::from(on)));
        }
        let speed = match (c.speed, self.high) {
            (Speed::Fast, _) | (Speed::High, None) => Some(self.fast),
            (Speed::High, Some(high)) => Some(high),
            (Speed::Standard, _) => None,
        };
        let optional = [(speed, true), (self.gpio_en, c.gpio_en), (self.rst_req, c.rst_req)];
        for (pos, on) in optional {
            if let Some(pos) = pos {
                icr.modify(flag::<Icr>(pos).val(u32::from(on)));
            }
        }
        icr.get()
    }

    #[must_use]
    pub fn unpack(&self, w: u32) -> Control {
        let icr = LocalRegisterCopy::<u32, Icr>::new(w);
        let set = |pos: u8| icr.is_set(flag(pos));
        let high = self.high.is_some_and(set);
        let speed = if high {
            Speed::High
        } else if set(self.fast) {
            Speed::Fast
        } else {
            Speed::Standard
        };
        Control {
            start: set(self.start),
            stop: set(self.stop),
            acknak: set(self.acknak),
            tb: set(self.tb),
            ma: set(self.ma),
            scle: set(self.scle),
            iue: set(self.iue),
            gcd: set(self.gcd),
            ite_ie: set(self.ite_ie),
            irf_ie: set(self.irf_ie),
            be_ie: set(self.be_ie),
            ssd_ie: set(self.ssd_ie),
            ald_ie: set(self.ald_ie),
            sad_ie: set(self.sad_ie),
            ur: set(self.ur),
            speed,
            gpio_en: self.gpio_en.is_some_and(set),
            rst_req: self.rst_req.is_some_and(set),
        }
    }
}

impl StatusBits {
    #[must_use]
    pub fn pack(&self, s: Status) -> u32 {
        let mut isr = LocalRegisterCopy::<u32, Isr>::new(0);
        for (pos, on) in [
            (self.rwm, s.rwm),
            (self.acknak, s.acknak),
            (self.ub, s.ub),
            (self.ibb, s.ibb),
            (self.ssd, s.ssd),
            (self.ald, s.ald),
            (self.ite, s.ite),
            (self.irf, s.irf),
            (self.gcad, s.gcad),
            (self.sad, s.sad),
            (self.bed, s.bed),
        ] {
            isr.modify(flag::<Isr>(pos).val(u32::from(on)));
        }
        isr.get()
    }

    #[must_use]
    pub fn unpack(&self, w: u32) -> Status {
        let isr = LocalRegisterCopy::<u32, Isr>::new(w);
        let set = |pos: u8| isr.is_set(flag(pos));
        Status {
            rwm: set(self.rwm),
            acknak: set(self.acknak),
            ub: set(self.ub),
            ibb: set(self.ibb),
            ssd: set(self.ssd),
            ald: set(self.ald),
            ite: set(self.ite),
            irf: set(self.irf),
            gcad: set(self.gcad),
            sad: set(self.sad),
            bed: set(self.bed),
        }
    }
}

/// Memory-mapped controller.
pub struct MmioRegisters {
    base: NonNull<u8>,
    layout: RegisterLayout,
}

// SAFETY: the register block is only touched through `&mut self` / `&self` of the
// single owner; moving that owner between contexts is fine.
unsafe impl Send for MmioRegisters {}

impl MmioRegisters {
    /// # Safety
    ///
    /// `base` must point at the controller's register block, mapped for the
    /// lifetime of the returned value, and no other code may access it.
    #[must_use]
    pub const unsafe fn new(base: NonNull<u8>, layout: RegisterLayout) -> Self {
        Self { base, layout }
    }

    #[must_use]
    pub fn layout(&self) -> &RegisterLayout {
        &self.layout
    }

    fn reg<R: RegisterLongName>(&self, offset: usize) -> &ReadWrite<u32, R> {
        // SAFETY: offsets come from the layout of the block promised by `new`, and
        // `ReadWrite<u32, _>` is a transparent wrapper over one 32-bit cell.
        unsafe { &*self.base.as_ptr().add(offset).cast::<ReadWrite<u32, R>>() }
    }
}

impl I2cRegisters for MmioRegisters {
    fn read_control(&self) -> Control {
        let word = self.reg::<Icr>(self.layout.offsets.icr).get();
        self.layout.control.unpack(word)
    }

    fn write_control(&mut self, control: Control) {
        let word = self.layout.control.pack(control);
        self.reg::<Icr>(self.layout.offsets.icr).set(word);
    }

    fn read_status(&mut self) -> Status {
        let word = self.reg::<Isr>(self.layout.offsets.isr).get();
        self.layout.status.unpack(word)
    }

    fn clear_status(&mut self, events: Status) {
        let word = self.layout.status.pack(events.events());
        self.reg::<Isr>(self.layout.offsets.isr).set(word);
    }

    fn read_data(&mut self) -> u8 {
        self.reg::<IDBR::Register>(self.layout.offsets.idbr).read(IDBR::DATA) as u8
    }

    fn write_data(&mut self, byte: u8) {
        self.reg::<IDBR::Register>(self.layout.offsets.idbr)
            .write(IDBR::DATA.val(u32::from(byte)));
    }

    fn read_own_address(&self) -> u8 {
        self.reg::<ISAR::Register>(self.layout.offsets.isar).read(ISAR::ADDR) as u8
    }

    fn write_own_address(&mut self, addr: u8) {
        self.reg::<ISAR::Register>(self.layout.offsets.isar)
            .write(ISAR::ADDR.val(u32::from(addr)));
    }

    fn bus_lines(&mut self) -> BusLines {
        let ibmr = self.reg::<Ibmr>(self.layout.offsets.ibmr);
        BusLines {
            scl: ibmr.is_set(flag(self.layout.ibmr_scl)),
            sda: ibmr.is_set(flag(self.layout.ibmr_sda)),
        }
    }

    fn write_reset_cycles(&mut self, cycles: u8) {
        if let Some(offset) = self.layout.offsets.ircr {
            self.reg::<IRCR::Register>(offset)
                .write(IRCR::CYCLES.val(u32::from(cycles)));
        }
    }
}
