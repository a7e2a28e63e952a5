// Licensed under the Apache-2.0 license

//! # I2C Hardware Abstraction Traits
//!
//! This module defines the seams between the transaction engine and everything the
//! engine does not own: the caller, the platform's notion of time, the slave-side
//! client, the cross-core lock and the pads. Each trait has one responsibility and
//! the controller takes them as small generic parameters or borrowed trait objects.
//!
//! ## Trait Map
//!
//! ```text
//! Caller facing
//!     I2cHardwareCore (foundation: init, interrupt, recovery)
//!         ├── I2cMaster (master transfers)
//!         └── slave::I2cSlaveCore (own address, slave mode control)
//!
//! Collaborators consumed by the engine
//!     Timebase      time stamps + delays
//!     SlaveCallbacks  read/write/event capabilities of the slave client
//!     HwLock        shared flag between two processors
//!     PinMux        pad ownership between two processors
//!     RecoveryPins  GPIO view of SCL/SDA for bit-bang recovery
//! ```

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{AddressMode, Operation, SevenBitAddress};

use crate::i2c::common::{I2cConfig, I2cSEvent};

/// Monotonic microsecond time stamp.
pub type Instant = fugit::TimerInstantU64<1_000_000>;

/// Microsecond duration matching [`Instant`].
pub type Duration = fugit::MicrosDurationU64;

/// Platform time source.
///
/// The engine bounds every wait with a deadline computed from `now()` and uses the
/// `DelayNs` half for settle delays and back-off.
pub trait Timebase: DelayNs {
    fn now(&mut self) -> Instant;
}

/// Core I2C hardware interface providing basic operations
///
/// This is the foundation trait that every controller front end provides.
pub trait I2cHardwareCore {
    /// Hardware-specific error type that implements embedded-hal error traits
    type Error: embedded_hal::i2c::Error + core::fmt::Debug;

    /// Initialize the hardware with the given configuration and leave the bus idle.
    ///
    /// # Errors
    ///
    /// Returns an error when the bus cannot be brought to an idle state.
    fn init(&mut self, config: I2cConfig) -> Result<(), Self::Error>;

    /// Service controller events outside a transfer (slave traffic, stray flags).
    ///
    /// Called from the thread that owns the controller after the interrupt line
    /// fired, or periodically when interrupts are not wired.
    fn handle_interrupt(&mut self);

    /// Attempt to recover the I2C bus from stuck conditions
    ///
    /// # Errors
    ///
    /// Returns an error if the data line is still held low afterwards.
    fn recover_bus(&mut self) -> Result<(), Self::Error>;
}

/// I2C Master mode operations
///
/// The address type `A` must implement `AddressMode` to stay compatible with
/// embedded-hal. The PXA controller only speaks 7-bit addresses.
pub trait I2cMaster<A: AddressMode = SevenBitAddress>: I2cHardwareCore {
    /// Write data to a slave device at the given address
    ///
    /// # Errors
    ///
    /// Returns an error if the slave does not acknowledge or the bus fails.
    fn write(&mut self, addr: A, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Read data from a slave device at the given address
    ///
    /// # Errors
    ///
    /// Returns an error if the slave does not acknowledge or the bus fails.
    fn read(&mut self, addr: A, buffer: &mut [u8]) -> Result<(), Self::Error>;

    /// Combined write-then-read operation with a repeated start between them.
    ///
    /// # Errors
    ///
    /// Returns an error if either phase fails.
    fn write_read(&mut self, addr: A, bytes: &[u8], buffer: &mut [u8]) -> Result<(), Self::Error>;

    /// Execute a sequence of operations as one transaction. Adjacent operations of
    /// the same kind are joined without a repeated start.
    ///
    /// # Errors
    ///
    /// Returns an error if any operation fails; the transaction is then aborted.
    fn transaction_slice(
        &mut self,
        addr: A,
        ops_slice: &mut [Operation<'_>],
    ) -> Result<(), Self::Error>;
}

/// Slave-side client of the controller.
///
/// Every capability is optional: a client that only listens for writes overrides
/// [`SlaveCallbacks::write`] and leaves the rest alone. The engine calls these from
/// the event dispatcher, so implementations must not block.
pub trait SlaveCallbacks {
    /// Byte to send when an external master reads from us.
    fn read(&mut self) -> u8 {
        0
    }

    /// Byte received from an external master.
    fn write(&mut self, _byte: u8) {}

    /// Start and stop notifications.
    fn event(&mut self, _event: I2cSEvent) {}
}

/// Binary flag shared by two processors.
///
/// `try_acquire` must be a single atomic test-and-set visible to the other
/// processor; `release` clears it.
pub trait HwLock {
    fn try_acquire(&self) -> bool;
    fn release(&self);
}

/// Which processor's private pad configuration is applied.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PadOwner {
    Local,
    Remote,
}

/// Pad multiplexer for a controller shared by two processors.
pub trait PinMux {
    fn select(&mut self, owner: PadOwner);
}

/// GPIO view of the bus pins used for bit-bang recovery.
pub trait RecoveryPins {
    /// Route the pads to plain GPIO (`true`) or back to the controller (`false`).
    fn use_gpio(&mut self, gpio: bool);
    fn set_scl(&mut self, high: bool);
    fn set_sda(&mut self, high: bool);
    fn sda(&mut self) -> bool;
}

/// Slave/target mode functionality.
pub mod slave {
    use super::{AddressMode, SevenBitAddress};

    /// Core slave functionality - address configuration and mode control
    pub trait I2cSlaveCore<A: AddressMode = SevenBitAddress>: super::I2cHardwareCore {
        /// Set the slave address for this I2C controller
        ///
        /// # Errors
        ///
        /// Returns an error if the address does not fit the hardware.
        fn set_slave_address(&mut self, addr: A) -> Result<(), Self::Error>;

        /// Enable slave mode operation
        ///
        /// # Errors
        ///
        /// Returns an error if no slave address is configured.
        fn enable_slave_mode(&mut self) -> Result<(), Self::Error>;

        /// Disable slave mode and return to master-only operation
        ///
        /// # Errors
        ///
        /// Returns an error if the controller is addressed right now.
        fn disable_slave_mode(&mut self) -> Result<(), Self::Error>;

        /// Check if slave mode is currently enabled
        fn is_slave_mode_enabled(&self) -> bool;

        /// Get the currently configured slave address
        fn slave_address(&self) -> Option<A>;
    }
}

pub use slave::I2cSlaveCore;
