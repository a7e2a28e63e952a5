// Licensed under the Apache-2.0 license

//! Common types and constants for the PXA I2C driver modules.
//!
//! This module provides the one-time configuration object consumed at
//! initialization, the bus speed classes, and the slave event vocabulary shared by
//! the engine and its callers.

use fugit::MillisDurationU32;

/// Bus speed class. The discriminant is the nominal SCL rate in Hz.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum I2cSpeed {
    Standard = 100_000,
    Fast = 400_000,
    HighSpeed = 3_400_000,
}

/// How the orchestrator learns about controller events.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum I2cXferMode {
    /// Events are signalled by the interrupt line through an `IrqSignal`.
    Interrupt,
    /// The calling thread busy-polls the status register.
    Pio,
}

/// Direction of a bus transaction, seen from the master.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    Write,
    Read,
}

/// Events delivered to registered slave callbacks.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum I2cSEvent {
    /// Our own address was matched; the direction is the external master's.
    Start(Direction),
    /// Stop condition after we were addressed.
    Stop,
}

/// What to do with an arbitration-lost flag on a transmit-ready event.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ArbitrationPolicy {
    /// Treat the flag as spurious. Several PXA revisions raise it without a real
    /// second master on the bus.
    Ignore,
    /// End the attempt with `Error::ArbitrationLost` and let the retry loop run.
    Report,
}

/// Spin/back-off parameters for the cross-core hardware lock.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LockBackoff {
    /// Immediate attempts before the first delay.
    pub spins: u32,
    pub min_delay_us: u32,
    pub max_delay_us: u32,
    /// Delayed rounds before `lock()` gives up.
    pub max_rounds: u32,
}

impl Default for LockBackoff {
    fn default() -> Self {
        Self {
            spins: 16,
            min_delay_us: 2,
            max_delay_us: 1_000,
            max_rounds: 1_000,
        }
    }
}

/// One-time configuration consumed by `init`.
#[derive(Copy, Clone, Debug)]
pub struct I2cConfig {
    pub xfer_mode: I2cXferMode,
    pub speed: I2cSpeed,
    /// Own address answered in slave mode; `None` leaves slave interrupts off.
    pub slave_address: Option<u8>,
    /// Master code sent before each high-speed transfer.
    pub master_code: u8,
    /// Extra attempts after the first one for transient failures.
    pub retries: u8,
    /// Delay before every retry.
    pub settle_delay_us: u32,
    /// Bound on the data phase of one attempt, and separately on the master-code
    /// preamble.
    pub xfer_timeout: MillisDurationU32,
    /// Bound on waiting for the bus to go idle before claiming it.
    pub bus_wait_timeout: MillisDurationU32,
    /// Bound on waiting for unit and bus busy to clear while claiming master mode.
    pub set_master_timeout: MillisDurationU32,
    /// Controller is shared with another processor through a hardware lock.
    pub hw_lock: bool,
    pub lock_backoff: LockBackoff,
    /// GPIO bit-bang recovery may be used when the pins are attached.
    pub gpio_recovery: bool,
    /// Clock pulses issued by the controller's own bus-reset engine, if it has one.
    pub hw_reset_cycles: Option<u8>,
    pub arbitration: ArbitrationPolicy,
}

pub struct I2cConfigBuilder {
    xfer_mode: I2cXferMode,
    speed: I2cSpeed,
    slave_address: Option<u8>,
    master_code: u8,
    retries: u8,
    settle_delay_us: u32,
    xfer_timeout: MillisDurationU32,
    bus_wait_timeout: MillisDurationU32,
    set_master_timeout: MillisDurationU32,
    hw_lock: bool,
    lock_backoff: LockBackoff,
    gpio_recovery: bool,
    hw_reset_cycles: Option<u8>,
    arbitration: ArbitrationPolicy,
}

impl Default for I2cConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl I2cConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            xfer_mode: I2cXferMode::Interrupt,
            speed: I2cSpeed::Standard,
            slave_address: None,
            master_code: 0x0e,
            retries: 3,
            settle_delay_us: 100,
            xfer_timeout: MillisDurationU32::millis(1_000),
            bus_wait_timeout: MillisDurationU32::millis(64),
            set_master_timeout: MillisDurationU32::millis(10),
            hw_lock: false,
            lock_backoff: LockBackoff::default(),
            gpio_recovery: false,
            hw_reset_cycles: None,
            arbitration: ArbitrationPolicy::Ignore,
        }
    }
    #[must_use]
    pub fn xfer_mode(mut self, mode: I2cXferMode) -> Self {
        self.xfer_mode = mode;
        self
    }
    #[must_use]
    pub fn speed(mut self, speed: I2cSpeed) -> Self {
        self.speed = speed;
        self
    }
    #[must_use]
    pub fn slave_address(mut self, addr: u8) -> Self {
        self.slave_address = Some(addr & 0x7f);
        self
    }
    #[must_use]
    pub fn master_code(mut self, code: u8) -> Self {
        self.master_code = code;
        self
    }
    #[must_use]
    pub fn retries(mut self, retries: u8) -> Self {
        self.retries = retries;
        self
    }
    #[must_use]
    pub fn settle_delay_us(mut self, us: u32) -> Self {
        self.settle_delay_us = us;
        self
    }
    #[must_use]
    pub fn xfer_timeout(mut self, timeout: MillisDurationU32) -> Self {
        self.xfer_timeout = timeout;
        self
    }
    #[must_use]
    pub fn bus_wait_timeout(mut self, timeout: MillisDurationU32) -> Self {
        self.bus_wait_timeout = timeout;
        self
    }
    #[must_use]
    pub fn set_master_timeout(mut self, timeout: MillisDurationU32) -> Self {
        self.set_master_timeout = timeout;
        self
    }
    #[must_use]
    pub fn hw_lock(mut self, enabled: bool) -> Self {
        self.hw_lock = enabled;
        self
    }
    #[must_use]
    pub fn lock_backoff(mut self, backoff: LockBackoff) -> Self {
        self.lock_backoff = backoff;
        self
    }
    #[must_use]
    pub fn gpio_recovery(mut self, enabled: bool) -> Self {
        self.gpio_recovery = enabled;
        self
    }
    #[must_use]
    pub fn hw_reset_cycles(mut self, cycles: u8) -> Self {
        self.hw_reset_cycles = Some(cycles);
        self
    }
    #[must_use]
    pub fn arbitration(mut self, policy: ArbitrationPolicy) -> Self {
        self.arbitration = policy;
        self
    }
    #[must_use]
    pub fn build(self) -> I2cConfig {
        I2cConfig {
            xfer_mode: self.xfer_mode,
            speed: self.speed,
            slave_address: self.slave_address,
            master_code: self.master_code,
            retries: self.retries,
            settle_delay_us: self.settle_delay_us,
            xfer_timeout: self.xfer_timeout,
            bus_wait_timeout: self.bus_wait_timeout,
            set_master_timeout: self.set_master_timeout,
            hw_lock: self.hw_lock,
            lock_backoff: self.lock_backoff,
            gpio_recovery: self.gpio_recovery,
            hw_reset_cycles: self.hw_reset_cycles,
            arbitration: self.arbitration,
        }
    }
}
