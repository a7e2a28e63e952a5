// Licensed under the Apache-2.0 license

//! PXA I2C driver module.
//!
//! Register access, the master and slave state machines, bus recovery and the
//! transfer orchestrator for PXA-family controllers, written for bare-metal and
//! `no_std` environments. Platform services come in through [`traits`].

pub mod common;
pub mod hwlock;
pub mod i2c_controller;
mod master;
pub mod pxa_i2c;
mod recovery;
pub mod registers;
mod slave;
pub mod trace;
pub mod traits;
pub mod transfer;

pub use common::{I2cConfig, I2cConfigBuilder, I2cSpeed, I2cXferMode};
pub use pxa_i2c::{Error, Mode, PxaI2c};
pub use transfer::{IrqSignal, Message};
