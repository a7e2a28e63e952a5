// Licensed under the Apache-2.0 license

//! Controller reset and bus recovery.
//!
//! A reset aborts whatever the unit was doing on the wire, pulses unit reset,
//! reprograms the persistent control bits and own address, and then checks the bus
//! lines. If SDA or SCL is still low, a forced-clock reset (hardware) or a bit-bang
//! sequence on GPIO frees a slave stuck mid-byte.

use embedded_hal::delay::DelayNs;

use crate::common::Logger;
use crate::i2c::pxa_i2c::{Error, Mode, PxaI2c};
use crate::i2c::registers::{Control, I2cRegisters, Status};
use crate::i2c::traits::{RecoveryPins, Timebase};
use fugit::MillisDurationU32;

/// Abort rounds while SDA is held low, one millisecond apart.
const ABORT_ROUNDS: u32 = 250;
/// Delay after re-enabling the unit.
const RESET_SETTLE_US: u32 = 100;
/// Upper bound for a forced-clock reset to self-clear.
const FORCED_CLOCK_TIMEOUT_MS: u32 = 10;
/// SCL pulses that clock any slave out of a partial byte.
const RECOVERY_CLOCKS: u32 = 9;
/// Half SCL period for the bit-bang sequence (about 100 kHz).
const HALF_PERIOD_US: u32 = 5;

impl<R: I2cRegisters, T: Timebase, L: Logger> PxaI2c<'_, R, T, L> {
    /// Full controller reset, followed by bus recovery when the lines are not
    /// idle. Leaves the controller in [`Mode::Idle`].
    ///
    /// # Errors
    ///
    /// `Error::RecoveryFailed` if SDA is still low afterwards.
    pub fn reset(&mut self) -> Result<(), Error> {
        let from = self.state.mode;
        self.state.set_mode(Mode::Resetting);
        self.counters.resets += 1;

        if from == Mode::SlaveActive {
            self.logger
                .debug(format_args!("i2c: reset while addressed, skipping abort"));
        } else {
            self.abort();
        }
        self.abandon_slave();

        self.unit_reset();

        let lines = self.regs.bus_lines();
        let result = if lines.idle() {
            Ok(())
        } else {
            self.logger.warn(format_args!(
                "i2c: bus not idle after reset (scl={} sda={})",
                lines.scl, lines.sda
            ));
            self.clock_recovery()
        };

        self.state.set_mode(Mode::Idle);
        result
    }

    /// Sends NAK+STOP until the slave releases SDA.
    fn abort(&mut self) {
        let mut rounds = ABORT_ROUNDS;
        while rounds > 0 && !self.regs.bus_lines().sda {
            self.regs.modify_control(|c| {
                c.start = false;
                c.acknak = true;
                c.stop = true;
                c.tb = true;
            });
            self.time.delay_ms(1);
            rounds -= 1;
        }
        if rounds == 0 {
            self.logger
                .warn(format_args!("i2c: SDA still low after {} abort rounds", ABORT_ROUNDS));
        }
        self.regs.modify_control(|c| {
            c.ma = false;
            c.start = false;
            c.stop = false;
        });
    }

    fn unit_reset(&mut self) {
        self.regs.write_control(Control {
            ur: true,
            ..Control::default()
        });
        self.regs.clear_status(Status::ALL_EVENTS);
        self.regs.modify_control(|c| c.ur = false);

        if let Some(addr) = self.config.slave_address.filter(|_| self.slave.is_enabled()) {
            self.regs.write_own_address(addr);
        }

        let init = self.init_control();
        self.regs.write_control(init);
        self.regs.modify_control(|c| c.iue = true);
        self.capture_shadow();

        self.time.delay_us(RESET_SETTLE_US);
    }

    fn init_control(&self) -> Control {
        let slave = self.slave.is_enabled();
        Control {
            be_ie: true,
            irf_ie: true,
            ite_ie: true,
            gcd: true,
            scle: true,
            speed: self.config.speed.into(),
            sad_ie: slave,
            ald_ie: slave,
            ssd_ie: slave,
            ..Control::default()
        }
    }

    /// Forced-clock reset if the controller has one, else bit-bang on GPIO.
    fn clock_recovery(&mut self) -> Result<(), Error> {
        if let Some(cycles) = self.config.hw_reset_cycles {
            self.forced_clock_reset(cycles);
        } else if self.config.gpio_recovery {
            match self.recovery_pins.as_deref_mut() {
                Some(pins) => bit_bang_recovery(pins, &mut self.time),
                None => self
                    .logger
                    .warn(format_args!("i2c: no recovery pins attached")),
            }
        } else {
            self.logger
                .warn(format_args!("i2c: no bus recovery method configured"));
        }

        if self.regs.bus_lines().sda {
            self.logger.info(format_args!("i2c: bus recovered"));
            Ok(())
        } else {
            self.logger
                .error(format_args!("i2c: SDA stuck low, recovery failed"));
            Err(Error::RecoveryFailed)
        }
    }

    fn forced_clock_reset(&mut self, cycles: u8) {
        self.regs.write_reset_cycles(cycles);
        self.regs.modify_control(|c| c.rst_req = true);
        let deadline = self.deadline(MillisDurationU32::from_ticks(FORCED_CLOCK_TIMEOUT_MS));
        while self.regs.read_control().rst_req {
            if self.time.now() >= deadline {
                self.logger
                    .warn(format_args!("i2c: forced-clock reset did not complete"));
                break;
            }
            core::hint::spin_loop();
        }
    }
}

/// Up to nine SCL pulses until the slave lets SDA go, then a STOP.
fn bit_bang_recovery<D: DelayNs>(pins: &mut dyn RecoveryPins, delay: &mut D) {
    pins.use_gpio(true);
    pins.set_sda(true);
    pins.set_scl(true);
    delay.delay_us(HALF_PERIOD_US);

    for _ in 0..RECOVERY_CLOCKS {
        if pins.sda() {
            break;
        }
        pins.set_scl(false);
        delay.delay_us(HALF_PERIOD_US);
        pins.set_scl(true);
        delay.delay_us(HALF_PERIOD_US);
    }

    pins.set_scl(false);
    delay.delay_us(HALF_PERIOD_US);
    pins.set_sda(false);
    delay.delay_us(HALF_PERIOD_US);
    pins.set_scl(true);
    delay.delay_us(HALF_PERIOD_US);
    pins.set_sda(true);
    delay.delay_us(HALF_PERIOD_US);

    pins.use_gpio(false);
}
