// Licensed under the Apache-2.0 license

//! PXA I2C controller driver: transfer orchestration and event dispatch.
//!
//! [`PxaI2c::transfer`] is the one entry point for master work. Each attempt waits
//! for the bus, claims master mode, runs the master state machine until the
//! message list is exhausted or fails, and always ends with a full controller
//! reset. Transient failures are retried with a settle delay in between.
//!
//! Every controller event, whether it was signalled through the interrupt line or
//! found by busy-polling, goes through [`PxaI2c::dispatch`]. The master and slave
//! state machines (`master.rs`, `slave.rs`) and the reset path (`recovery.rs`)
//! extend this type with further `impl` blocks.

use core::fmt;

use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource, Operation, SevenBitAddress};
use fugit::MillisDurationU32;

use crate::common::{Logger, NoOpLogger};
use crate::i2c::common::{Direction, I2cConfig, I2cConfigBuilder, I2cSpeed, I2cXferMode};
use crate::i2c::hwlock::ArbitrationGate;
use crate::i2c::registers::{Control, I2cRegisters, Status};
use crate::i2c::slave::SlaveState;
use crate::i2c::trace::{TraceEntry, TraceLog};
use crate::i2c::traits::{
    Duration, I2cHardwareCore, I2cMaster, Instant, RecoveryPins, SlaveCallbacks, Timebase,
};
use crate::i2c::transfer::{validate, Finish, IrqSignal, Message, Phase, TransferSet};

/// Most operations accepted by [`I2cMaster::transaction_slice`].
pub const MAX_OPERATIONS: usize = 16;

/// Slave hand-offs tolerated within one `transfer()` call before the bus is
/// reported busy.
const MAX_HANDOFFS: u32 = 16;

/// Where a NAK was observed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NakPhase {
    /// Address byte of the first message: nobody answered.
    AtAddress,
    /// Any later byte, including a repeated-start address.
    MidTransfer,
}

/// Failure classes the retry loop may absorb.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Transient {
    BusBusy,
    Timeout,
    NakAtAddress,
    ArbitrationLost,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// The bus stayed busy past the wait budget, even after a reset.
    BusBusy,
    /// Unit or bus stayed busy while claiming master mode.
    SetMasterFailed,
    Nak(NakPhase),
    ArbitrationLost,
    /// Bus error without a NAK, or a byte the message list cannot hold.
    BusError,
    Timeout,
    /// The data line is still held low after every recovery step.
    RecoveryFailed,
    /// The cross-core lock could not be taken.
    LockTimeout,
    /// Malformed request; nothing was sent.
    Invalid,
    /// Every attempt failed transiently; `last` is the final cause.
    Exhausted { last: Transient },
}

impl Error {
    /// Class for the retry loop, `None` when the error must reach the caller.
    #[must_use]
    pub fn transient(self) -> Option<Transient> {
        match self {
            Error::BusBusy => Some(Transient::BusBusy),
            Error::Timeout => Some(Transient::Timeout),
            Error::Nak(NakPhase::AtAddress) => Some(Transient::NakAtAddress),
            Error::ArbitrationLost => Some(Transient::ArbitrationLost),
            _ => None,
        }
    }

    /// The underlying failure, looking through `Exhausted`.
    #[must_use]
    pub fn root_cause(self) -> Error {
        match self {
            Error::Exhausted { last } => last.into(),
            other => other,
        }
    }
}

impl From<Transient> for Error {
    fn from(t: Transient) -> Self {
        match t {
            Transient::BusBusy => Error::BusBusy,
            Transient::Timeout => Error::Timeout,
            Transient::NakAtAddress => Error::Nak(NakPhase::AtAddress),
            Transient::ArbitrationLost => Error::ArbitrationLost,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BusBusy => f.write_str("bus busy"),
            Error::SetMasterFailed => f.write_str("could not claim master mode"),
            Error::Nak(NakPhase::AtAddress) => f.write_str("no device at address"),
            Error::Nak(NakPhase::MidTransfer) => f.write_str("transfer NAKed"),
            Error::ArbitrationLost => f.write_str("arbitration lost"),
            Error::BusError => f.write_str("bus error"),
            Error::Timeout => f.write_str("transfer timed out"),
            Error::RecoveryFailed => f.write_str("bus recovery failed"),
            Error::LockTimeout => f.write_str("hardware lock timeout"),
            Error::Invalid => f.write_str("invalid request"),
            Error::Exhausted { last } => {
                write!(f, "retries exhausted, last: {}", Error::from(*last))
            }
        }
    }
}

impl embedded_hal::i2c::Error for Error {
    fn kind(&self) -> ErrorKind {
        match self.root_cause() {
            Error::Nak(NakPhase::AtAddress) => {
                ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
            }
            Error::Nak(NakPhase::MidTransfer) => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data),
            Error::ArbitrationLost => ErrorKind::ArbitrationLoss,
            Error::BusBusy | Error::SetMasterFailed | Error::BusError | Error::RecoveryFailed => {
                ErrorKind::Bus
            }
            _ => ErrorKind::Other,
        }
    }
}

/// Who currently mutates the controller.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    Idle,
    MasterActive,
    SlaveActive,
    Resetting,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ControllerState {
    pub(crate) mode: Mode,
    /// Retries spent by the current or last `transfer()` call.
    retries: u8,
    last_error: Option<Error>,
}

impl ControllerState {
    const fn new() -> Self {
        Self {
            mode: Mode::Idle,
            retries: 0,
            last_error: None,
        }
    }

    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    #[must_use]
    pub fn retries(&self) -> u8 {
        self.retries
    }

    #[must_use]
    pub fn last_error(&self) -> Option<Error> {
        self.last_error
    }

    /// Applies a mode change if it is one of Idle→Master→Idle, Idle→Slave→Idle,
    /// any→Resetting→Idle. Returns `false` and leaves the mode alone otherwise.
    pub(crate) fn set_mode(&mut self, to: Mode) -> bool {
        let allowed = matches!(
            (self.mode, to),
            (Mode::Idle, Mode::MasterActive)
                | (Mode::Idle, Mode::SlaveActive)
                | (Mode::MasterActive, Mode::Idle)
                | (Mode::SlaveActive, Mode::Idle)
                | (Mode::Resetting, Mode::Idle)
                | (_, Mode::Resetting)
        );
        if allowed {
            self.mode = to;
        }
        allowed
    }
}

/// Running totals since construction.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Counters {
    pub attempts: u32,
    pub retries: u32,
    pub resets: u32,
    /// Master attempts pre-empted by slave traffic.
    pub deferred: u32,
    /// Master requests resumed after slave traffic ended.
    pub resumed: u32,
    /// Controller events dispatched.
    pub events: u32,
}

/// Control mode bits and own address last programmed by the driver.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct RegisterShadow {
    pub(crate) control: Control,
    pub(crate) own_address: Option<u8>,
}

/// Result of one attempt that did not fail.
enum Attempt {
    Done(u32),
    Deferred,
}

pub struct PxaI2c<'a, R: I2cRegisters, T: Timebase, L: Logger = NoOpLogger> {
    pub(crate) regs: R,
    pub(crate) time: T,
    pub(crate) logger: L,
    pub(crate) config: I2cConfig,
    pub(crate) state: ControllerState,
    pub(crate) shadow: RegisterShadow,
    pub(crate) slave: SlaveState<'a>,
    pub(crate) gate: Option<ArbitrationGate<'a>>,
    pub(crate) recovery_pins: Option<&'a mut dyn RecoveryPins>,
    irq: Option<&'a IrqSignal>,
    trace: TraceLog,
    pub(crate) counters: Counters,
}

impl<'a, R: I2cRegisters, T: Timebase, L: Logger> PxaI2c<'a, R, T, L> {
    /// Wraps the controller without touching it. Call [`I2cHardwareCore::init`]
    /// before the first transfer.
    pub fn new(regs: R, time: T, logger: L) -> Self {
        Self {
            regs,
            time,
            logger,
            config: I2cConfigBuilder::new().build(),
            state: ControllerState::new(),
            shadow: RegisterShadow::default(),
            slave: SlaveState::new(),
            gate: None,
            recovery_pins: None,
            irq: None,
            trace: TraceLog::new(),
            counters: Counters::default(),
        }
    }

    /// Signal raised by the interrupt glue; without one, interrupt mode polls.
    #[must_use]
    pub fn with_irq_signal(mut self, irq: &'a IrqSignal) -> Self {
        self.irq = Some(irq);
        self
    }

    /// Lock shared with the other processor; used when `hw_lock` is configured.
    /// `init` replaces the gate's back-off with the configured `lock_backoff`.
    pub fn attach_hw_lock(&mut self, gate: ArbitrationGate<'a>) {
        self.gate = Some(gate);
    }

    /// Pins for bit-bang recovery; used when `gpio_recovery` is configured.
    pub fn attach_recovery_pins(&mut self, pins: &'a mut dyn RecoveryPins) {
        self.recovery_pins = Some(pins);
    }

    /// Registers the slave client. Replaces any earlier registration.
    pub fn register_slave(&mut self, callbacks: &'a mut dyn SlaveCallbacks) {
        self.slave.register(callbacks);
    }

    pub fn unregister_slave(&mut self) {
        self.slave.unregister();
    }

    #[must_use]
    pub fn config(&self) -> &I2cConfig {
        &self.config
    }

    #[must_use]
    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    #[must_use]
    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    #[must_use]
    pub fn trace(&self) -> &TraceLog {
        &self.trace
    }

    #[must_use]
    pub fn registers(&self) -> &R {
        &self.regs
    }

    pub fn registers_mut(&mut self) -> &mut R {
        &mut self.regs
    }

    fn configure(&mut self, config: I2cConfig) -> Result<(), Error> {
        match self.gate.as_mut() {
            Some(gate) => gate.set_backoff(config.lock_backoff),
            None if config.hw_lock => self
                .logger
                .warn(format_args!("i2c: hw_lock configured but no lock attached")),
            None => {}
        }
        if config.gpio_recovery && self.recovery_pins.is_none() {
            self.logger
                .warn(format_args!("i2c: gpio_recovery configured but no pins attached"));
        }
        if config.xfer_mode == I2cXferMode::Interrupt && self.irq.is_none() {
            self.logger
                .info(format_args!("i2c: no interrupt signal attached, polling"));
        }
        self.slave.set_enabled(config.slave_address.is_some());
        self.config = config;
        self.reset()
    }

    /// Runs `msgs` as one combined transfer and returns the number of bytes moved.
    ///
    /// # Errors
    ///
    /// `Invalid` for malformed lists, `Exhausted` once transient failures used up
    /// the retries, any other [`Error`] as soon as it happens. The controller is
    /// idle and freshly reset on every return.
    pub fn transfer(&mut self, msgs: &mut [Message<'_>]) -> Result<u32, Error> {
        validate(msgs)?;
        self.state.retries = 0;
        let mut handoffs = 0;
        loop {
            match self.locked_attempt(msgs) {
                Ok(Attempt::Done(bytes)) => {
                    self.state.last_error = None;
                    return Ok(bytes);
                }
                Ok(Attempt::Deferred) => {
                    handoffs += 1;
                    if handoffs > MAX_HANDOFFS {
                        self.state.last_error = Some(Error::BusBusy);
                        return Err(Error::Exhausted {
                            last: Transient::BusBusy,
                        });
                    }
                    self.logger
                        .debug(format_args!("i2c: resuming master request after slave stop"));
                }
                Err(e) => {
                    self.state.last_error = Some(e);
                    let Some(cause) = e.transient() else {
                        return Err(e);
                    };
                    if self.state.retries >= self.config.retries {
                        self.logger
                            .error(format_args!("i2c: giving up after {} retries: {}", self.state.retries, e));
                        return Err(Error::Exhausted { last: cause });
                    }
                    self.state.retries += 1;
                    self.counters.retries += 1;
                    self.logger.debug(format_args!(
                        "i2c: retry {}/{} after {}",
                        self.state.retries, self.config.retries, e
                    ));
                    self.time.delay_us(self.config.settle_delay_us);
                }
            }
        }
    }

    /// One attempt bracketed by the hardware lock and the closing reset.
    fn locked_attempt(&mut self, msgs: &mut [Message<'_>]) -> Result<Attempt, Error> {
        let gated = self.config.hw_lock && self.gate.is_some();
        if gated {
            if let Some(gate) = self.gate.as_mut() {
                gate.lock(&mut self.time, &mut self.logger)?;
            }
        }

        self.counters.attempts += 1;
        let outcome = self.do_xfer(msgs);
        if let Err(e) = &outcome {
            self.logger.warn(format_args!("i2c: attempt failed: {}", e));
            self.dump_state();
        }
        let reset = self.reset();

        if gated {
            if let Some(gate) = self.gate.as_mut() {
                gate.unlock();
            }
        }

        match (outcome, reset) {
            (Ok(attempt), Ok(())) => Ok(attempt),
            (Ok(_), Err(e)) | (Err(e), _) => Err(e),
        }
    }

    fn do_xfer(&mut self, msgs: &mut [Message<'_>]) -> Result<Attempt, Error> {
        if self.shadow_tampered() {
            self.logger
                .warn(format_args!("i2c: register shadow mismatch, resetting"));
            self.reset()?;
        }

        self.wait_bus_not_busy()?;
        self.set_master()?;

        let mut xfer = TransferSet::new(msgs);
        if self.config.speed == I2cSpeed::HighSpeed && !self.send_master_code(&mut xfer)? {
            return Ok(Attempt::Deferred);
        }

        self.start_message(&mut xfer);
        match self.wait_for(&mut xfer, self.config.xfer_timeout)? {
            Finish::Done => {
                if xfer.was_probe() {
                    self.logger
                        .debug(format_args!("i2c: zero-length probe done, forcing reset"));
                }
                Ok(Attempt::Done(xfer.bytes()))
            }
            Finish::Deferred => Ok(Attempt::Deferred),
            Finish::PreambleSent => Err(Error::BusError),
        }
    }

    /// Waits for the bus to go idle, resetting once and retrying with half the
    /// budget before reporting `BusBusy`.
    fn wait_bus_not_busy(&mut self) -> Result<(), Error> {
        let budget = self.config.bus_wait_timeout;
        if self.wait_bus_idle(budget, false) {
            return Ok(());
        }
        self.logger
            .warn(format_args!("i2c: bus busy after {} ms, resetting", budget.ticks()));
        self.reset()?;
        let reduced = MillisDurationU32::from_ticks(budget.ticks() / 2);
        if self.wait_bus_idle(reduced, false) {
            return Ok(());
        }
        self.logger.error(format_args!("i2c: bus still busy"));
        Err(Error::BusBusy)
    }

    fn set_master(&mut self) -> Result<(), Error> {
        if !self.wait_bus_idle(self.config.set_master_timeout, true) {
            self.logger.error(format_args!("i2c: set master failed"));
            return Err(Error::SetMasterFailed);
        }
        if !self.state.set_mode(Mode::MasterActive) {
            return Err(Error::SetMasterFailed);
        }
        self.regs.modify_control(|c| c.scle = true);
        Ok(())
    }

    /// Polls until the controller is idle and the bus is free. Slave traffic seen
    /// meanwhile is serviced and holds the request back; the budget restarts on
    /// every slave event and when the request is handed back.
    fn wait_bus_idle(&mut self, budget: MillisDurationU32, check_lines: bool) -> bool {
        let mut deadline = self.deadline(budget);
        let mut resumed = self.counters.resumed;
        loop {
            let status = self.regs.read_status();
            if status.has_event() {
                self.dispatch(status, None);
                // Slave traffic does not count against the budget.
                if self.state.mode == Mode::SlaveActive {
                    deadline = self.deadline(budget);
                }
            }
            if self.counters.resumed != resumed {
                resumed = self.counters.resumed;
                deadline = self.deadline(budget);
            }
            if self.state.mode == Mode::SlaveActive {
                self.slave.master_pending = true;
            } else if self.state.mode == Mode::Idle {
                let status = self.regs.read_status();
                let lines_ok = !check_lines || self.regs.bus_lines().idle();
                if !status.busy() && lines_ok {
                    return true;
                }
            }
            if self.time.now() >= deadline {
                return false;
            }
            self.idle_wait();
        }
    }

    /// Sends the high-speed preamble. `Ok(false)` means slave traffic took the bus
    /// first and the attempt has been handed back.
    fn send_master_code(&mut self, xfer: &mut TransferSet<'_, '_>) -> Result<bool, Error> {
        xfer.phase = Phase::MasterCode;
        self.regs.write_data(self.config.master_code);
        self.regs.modify_control(|c| {
            *c = c.without_strobes();
            c.ald_ie = false;
            c.gpio_en = true;
            c.ite_ie = true;
            c.start = true;
            c.tb = true;
        });
        let sent = self.wait_for(xfer, self.config.xfer_timeout);
        self.regs.modify_control(|c| {
            c.tb = false;
            c.gpio_en = false;
        });
        match sent {
            Ok(Finish::PreambleSent) => Ok(true),
            Ok(Finish::Deferred) => Ok(false),
            Ok(Finish::Done) => Err(Error::BusError),
            Err(e) => {
                self.logger
                    .error(format_args!("i2c: master code 0x{:02x} not sent: {}", self.config.master_code, e));
                Err(e)
            }
        }
    }

    fn start_message(&mut self, xfer: &mut TransferSet<'_, '_>) {
        let Some(addr) = xfer.current().map(Message::address_byte) else {
            return;
        };
        xfer.phase = Phase::Address;
        self.regs.write_data(addr);
        self.regs.modify_control(|c| {
            *c = c.without_strobes();
            c.ald_ie = false;
            c.start = true;
            c.tb = true;
        });
    }

    /// Services the controller once and reports whether the attempt finished.
    fn poll_completion(&mut self, xfer: &mut TransferSet<'_, '_>) -> nb::Result<Finish, Error> {
        if let Some(result) = xfer.completion.take() {
            return result.map_err(nb::Error::Other);
        }
        let signalled = match (self.config.xfer_mode, self.irq) {
            (I2cXferMode::Interrupt, Some(irq)) => irq.take(),
            _ => true,
        };
        if signalled {
            let status = self.regs.read_status();
            if status.has_event() {
                self.dispatch(status, Some(&mut *xfer));
            }
        }
        match xfer.completion.take() {
            Some(result) => result.map_err(nb::Error::Other),
            None => Err(nb::Error::WouldBlock),
        }
    }

    fn wait_for(
        &mut self,
        xfer: &mut TransferSet<'_, '_>,
        timeout: MillisDurationU32,
    ) -> Result<Finish, Error> {
        let mut deadline = self.deadline(timeout);
        loop {
            let events = self.counters.events;
            match self.poll_completion(xfer) {
                Ok(finish) => return Ok(finish),
                Err(nb::Error::Other(e)) => return Err(e),
                Err(nb::Error::WouldBlock) => {}
            }
            if self.counters.events != events && self.state.mode == Mode::SlaveActive {
                deadline = self.deadline(timeout);
            }
            if self.time.now() >= deadline {
                self.logger.error(format_args!(
                    "i2c: timeout in message {} at byte {}",
                    xfer.index(),
                    xfer.offset()
                ));
                return Err(Error::Timeout);
            }
            self.idle_wait();
        }
    }

    /// The single state-transition function.
    ///
    /// Acknowledges the event bits in `status`, then routes them: slave address
    /// and stop first, then data events to whichever side owns the controller.
    pub(crate) fn dispatch(&mut self, status: Status, mut xfer: Option<&mut TransferSet<'_, '_>>) {
        let events = status.events();
        self.regs.clear_status(events);
        self.counters.events = self.counters.events.wrapping_add(1);

        if events.sad {
            self.slave_start(status, xfer.as_deref_mut());
        }
        if events.ssd {
            self.slave_stop(xfer.as_deref_mut());
        }

        if self.state.mode == Mode::SlaveActive {
            if events.ite {
                self.slave_tx_empty(status);
            }
            if events.irf {
                self.slave_rx_full();
            }
        } else if let Some(xfer) = xfer {
            if events.ite {
                self.master_tx_empty(xfer, status);
            }
            if events.irf {
                self.master_rx_full(xfer);
            }
        } else if events.ite || events.irf || events.bed {
            self.logger
                .warn(format_args!("i2c: spurious event {:?} in {:?}", events, self.state.mode));
        }

        self.trace.record(TraceEntry {
            status,
            control: self.regs.read_control(),
            mode: self.state.mode,
        });
    }

    fn shadow_tampered(&mut self) -> bool {
        let control = self.regs.read_control().mode_bits();
        if control != self.shadow.control {
            self.logger.warn(format_args!(
                "i2c: ICR {:?} differs from shadow {:?}",
                control, self.shadow.control
            ));
            return true;
        }
        match self.shadow.own_address {
            Some(addr) => self.regs.read_own_address() != addr,
            None => false,
        }
    }

    pub(crate) fn capture_shadow(&mut self) {
        self.shadow = RegisterShadow {
            control: self.regs.read_control().mode_bits(),
            own_address: self.config.slave_address.filter(|_| self.slave.is_enabled()),
        };
    }

    fn dump_state(&mut self) {
        let status = self.regs.read_status();
        let control = self.regs.read_control();
        self.logger.debug(format_args!(
            "i2c: mode={:?} isr={:?} icr={:?}",
            self.state.mode, status, control
        ));
        self.trace.dump(&mut self.logger);
    }

    pub(crate) fn deadline(&mut self, timeout: MillisDurationU32) -> Instant {
        self.time.now() + Duration::micros(u64::from(timeout.to_micros()))
    }

    /// Pause between polls.
    fn idle_wait(&mut self) {
        #[cfg(all(target_arch = "arm", target_os = "none"))]
        if self.config.xfer_mode == I2cXferMode::Interrupt && self.irq.is_some() {
            cortex_m::asm::wfi();
            return;
        }
        core::hint::spin_loop();
    }
}

impl<R: I2cRegisters, T: Timebase, L: Logger> I2cHardwareCore for PxaI2c<'_, R, T, L> {
    type Error = Error;

    fn init(&mut self, config: I2cConfig) -> Result<(), Self::Error> {
        self.configure(config)
    }

    fn handle_interrupt(&mut self) {
        if let Some(irq) = self.irq {
            irq.take();
        }
        let status = self.regs.read_status();
        if status.has_event() {
            self.dispatch(status, None);
        }
    }

    fn recover_bus(&mut self) -> Result<(), Self::Error> {
        self.reset()
    }
}

impl<R: I2cRegisters, T: Timebase, L: Logger> I2cMaster<SevenBitAddress> for PxaI2c<'_, R, T, L> {
    fn write(&mut self, addr: SevenBitAddress, bytes: &[u8]) -> Result<(), Self::Error> {
        self.transfer(&mut [Message::write(addr, bytes)]).map(|_| ())
    }

    fn read(&mut self, addr: SevenBitAddress, buffer: &mut [u8]) -> Result<(), Self::Error> {
        self.transfer(&mut [Message::read(addr, buffer)]).map(|_| ())
    }

    fn write_read(
        &mut self,
        addr: SevenBitAddress,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.transfer(&mut [Message::write(addr, bytes), Message::read(addr, buffer)])
            .map(|_| ())
    }

    fn transaction_slice(
        &mut self,
        addr: SevenBitAddress,
        ops_slice: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if ops_slice.is_empty() {
            return Ok(());
        }
        let mut msgs: heapless::Vec<Message<'_>, MAX_OPERATIONS> = heapless::Vec::new();
        let mut prev: Option<Direction> = None;
        for op in ops_slice.iter_mut() {
            let msg = match op {
                Operation::Read(buf) => Message::read(addr, buf),
                Operation::Write(bytes) => Message::write(addr, bytes),
            };
            let msg = if prev == Some(msg.direction()) && !msg.is_empty() {
                msg.continuation()
            } else {
                msg
            };
            prev = Some(msg.direction());
            msgs.push(msg).map_err(|_| Error::Invalid)?;
        }
        self.transfer(&mut msgs).map(|_| ())
    }
}
