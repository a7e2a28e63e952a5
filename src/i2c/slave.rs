// Licensed under the Apache-2.0 license

//! Slave state machine.
//!
//! Slave traffic always wins over master work. When our address is matched in the
//! middle of a master attempt, the attempt is deferred and resumes once after the
//! stop condition.

use embedded_hal::i2c::SevenBitAddress;

use crate::common::Logger;
use crate::i2c::common::{Direction, I2cSEvent};
use crate::i2c::pxa_i2c::{Error, Mode, PxaI2c};
use crate::i2c::registers::{I2cRegisters, Status};
use crate::i2c::traits::{I2cSlaveCore, SlaveCallbacks, Timebase};
use crate::i2c::transfer::{Finish, TransferSet};

/// Polls of IBMR while waiting for SCL to go high after an address match.
const SCL_HIGH_SPINS: u32 = 0x1_0000;

pub(crate) struct SlaveState<'a> {
    callbacks: Option<&'a mut dyn SlaveCallbacks>,
    enabled: bool,
    /// Direction of the transaction addressing us, if any.
    addressed: Option<Direction>,
    /// A master request is waiting for the slave transaction to end.
    pub(crate) master_pending: bool,
}

impl<'a> SlaveState<'a> {
    pub(crate) const fn new() -> Self {
        Self {
            callbacks: None,
            enabled: false,
            addressed: None,
            master_pending: false,
        }
    }

    pub(crate) fn register(&mut self, callbacks: &'a mut dyn SlaveCallbacks) {
        self.callbacks = Some(callbacks);
    }

    pub(crate) fn unregister(&mut self) {
        self.callbacks = None;
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn notify(&mut self, event: I2cSEvent) {
        if let Some(cb) = self.callbacks.as_deref_mut() {
            cb.event(event);
        }
    }
}

impl<R: I2cRegisters, T: Timebase, L: Logger> PxaI2c<'_, R, T, L> {
    pub(crate) fn slave_start(&mut self, status: Status, xfer: Option<&mut TransferSet<'_, '_>>) {
        let dir = if status.rwm {
            Direction::Read
        } else {
            Direction::Write
        };

        if self.state.mode == Mode::MasterActive {
            self.logger
                .info(format_args!("i2c: addressed as slave, deferring master attempt"));
            self.slave.master_pending = true;
            self.counters.deferred += 1;
            self.state.set_mode(Mode::Idle);
            if xfer.is_none() {
                self.logger
                    .warn(format_args!("i2c: master active without a transfer"));
            }
        }
        if !self.state.set_mode(Mode::SlaveActive) && self.state.mode != Mode::SlaveActive {
            self.logger.warn(format_args!(
                "i2c: slave start ignored in {:?}",
                self.state.mode
            ));
            return;
        }

        self.slave.addressed = Some(dir);
        self.slave.notify(I2cSEvent::Start(dir));

        // We may have been addressed while generating a start; back off and let
        // the external master have the bus.
        self.regs.modify_control(|c| {
            c.start = false;
            c.stop = false;
        });
        self.regs.modify_control(|c| c.tb = true);

        let mut spins = SCL_HIGH_SPINS;
        while spins > 0 && !self.regs.bus_lines().scl {
            core::hint::spin_loop();
            spins -= 1;
        }
        if spins == 0 {
            self.logger
                .error(format_args!("i2c: timeout waiting for SCL high after address"));
        }

        self.regs.modify_control(|c| c.scle = false);
    }

    pub(crate) fn slave_stop(&mut self, xfer: Option<&mut TransferSet<'_, '_>>) {
        if self.state.mode != Mode::SlaveActive {
            return;
        }
        self.slave.notify(I2cSEvent::Stop);
        self.slave.addressed = None;
        self.state.set_mode(Mode::Idle);

        if self.hand_back() {
            if let Some(xfer) = xfer {
                xfer.completion.post(Ok(Finish::Deferred));
            }
        }
    }

    /// Clears a pending master request. Returns `true` exactly once per
    /// deferral.
    pub(crate) fn hand_back(&mut self) -> bool {
        if !self.slave.master_pending {
            return false;
        }
        self.slave.master_pending = false;
        self.counters.resumed += 1;
        true
    }

    /// Forgets a slave transaction cut short by a reset.
    pub(crate) fn abandon_slave(&mut self) {
        if self.slave.addressed.take().is_some() {
            self.slave.notify(I2cSEvent::Stop);
        }
        self.hand_back();
    }

    pub(crate) fn slave_tx_empty(&mut self, status: Status) {
        if status.bed {
            // The external master NAKed our last byte.
            self.logger
                .debug(format_args!("i2c: slave transmit ended by master NAK"));
            return;
        }
        let byte = match self.slave.callbacks.as_deref_mut() {
            Some(cb) => cb.read(),
            None => 0,
        };
        self.regs.write_data(byte);
        self.regs.modify_control(|c| c.tb = true);
    }

    pub(crate) fn slave_rx_full(&mut self) {
        let byte = self.regs.read_data();
        if let Some(cb) = self.slave.callbacks.as_deref_mut() {
            cb.write(byte);
        }
        self.regs.modify_control(|c| c.tb = true);
    }

    fn program_slave(&mut self, enabled: bool) {
        self.regs.modify_control(|c| {
            c.sad_ie = enabled;
            c.ssd_ie = enabled;
            c.ald_ie = enabled;
        });
        self.capture_shadow();
    }
}

impl<R: I2cRegisters, T: Timebase, L: Logger> I2cSlaveCore<SevenBitAddress> for PxaI2c<'_, R, T, L> {
    fn set_slave_address(&mut self, addr: SevenBitAddress) -> Result<(), Self::Error> {
        if addr > 0x7f {
            return Err(Error::Invalid);
        }
        if self.state.mode == Mode::SlaveActive {
            return Err(Error::BusBusy);
        }
        self.config.slave_address = Some(addr);
        self.regs.write_own_address(addr);
        self.capture_shadow();
        Ok(())
    }

    fn enable_slave_mode(&mut self) -> Result<(), Self::Error> {
        let Some(addr) = self.config.slave_address else {
            return Err(Error::Invalid);
        };
        self.slave.set_enabled(true);
        self.regs.write_own_address(addr);
        self.program_slave(true);
        Ok(())
    }

    fn disable_slave_mode(&mut self) -> Result<(), Self::Error> {
        if self.state.mode == Mode::SlaveActive {
            return Err(Error::BusBusy);
        }
        self.slave.set_enabled(false);
        self.program_slave(false);
        Ok(())
    }

    fn is_slave_mode_enabled(&self) -> bool {
        self.slave.is_enabled()
    }

    fn slave_address(&self) -> Option<SevenBitAddress> {
        self.config.slave_address
    }
}
