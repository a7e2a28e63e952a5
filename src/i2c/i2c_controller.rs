// Licensed under the Apache-2.0 license

//! embedded-hal front end for a PXA I2C controller.
//!
//! Wraps any [`I2cMaster`] so generic device drivers can use it through
//! `embedded_hal::i2c::I2c`. Failures are logged here once, with the operation and
//! target address, before they reach the device driver.

use crate::common::{Logger, NoOpLogger};
use crate::i2c::common::I2cConfig;
use crate::i2c::traits::I2cMaster;
use embedded_hal::i2c::{Operation, SevenBitAddress};

pub struct I2cController<H: I2cMaster, L: Logger = NoOpLogger> {
    pub hardware: H,
    pub config: I2cConfig,
    pub logger: L,
}

impl<H: I2cMaster, L: Logger> I2cController<H, L> {
    /// Initializes `hardware` with `config`.
    ///
    /// # Errors
    ///
    /// Whatever `init` reports, typically a bus that cannot be recovered.
    pub fn new(mut hardware: H, config: I2cConfig, mut logger: L) -> Result<Self, H::Error> {
        if let Err(e) = hardware.init(config) {
            logger.error(format_args!("i2c: init failed: {:?}", e));
            return Err(e);
        }
        logger.info(format_args!(
            "i2c: up, {} Hz, {:?}, {} retries",
            config.speed as u32, config.xfer_mode, config.retries
        ));
        Ok(Self {
            hardware,
            config,
            logger,
        })
    }

    /// # Errors
    ///
    /// The bus is still stuck.
    pub fn recover(&mut self) -> Result<(), H::Error> {
        self.hardware.recover_bus().inspect_err(|e| {
            self.logger.error(format_args!("i2c: recovery failed: {:?}", e));
        })
    }

    pub fn into_inner(self) -> H {
        self.hardware
    }

    fn report<T>(&mut self, op: &str, addr: SevenBitAddress, r: Result<T, H::Error>) -> Result<T, H::Error> {
        if let Err(e) = &r {
            self.logger
                .warn(format_args!("i2c: {} 0x{:02x} failed: {:?}", op, addr, e));
        }
        r
    }
}

impl<H: I2cMaster, L: Logger> embedded_hal::i2c::ErrorType for I2cController<H, L> {
    type Error = H::Error;
}

impl<H: I2cMaster, L: Logger> embedded_hal::i2c::I2c for I2cController<H, L> {
    fn read(&mut self, addr: SevenBitAddress, buffer: &mut [u8]) -> Result<(), Self::Error> {
        let r = self.hardware.read(addr, buffer);
        self.report("read", addr, r)
    }

    fn write(&mut self, addr: SevenBitAddress, bytes: &[u8]) -> Result<(), Self::Error> {
        let r = self.hardware.write(addr, bytes);
        self.report("write", addr, r)
    }

    fn write_read(
        &mut self,
        addr: SevenBitAddress,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), Self::Error> {
        let r = self.hardware.write_read(addr, bytes, buffer);
        self.report("write_read", addr, r)
    }

    fn transaction(
        &mut self,
        addr: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let r = self.hardware.transaction_slice(addr, operations);
        self.report("transaction", addr, r)
    }
}
