// Licensed under the Apache-2.0 license

//! Interrupt-driven I2C transaction engine for PXA-family controllers.
//!
//! The crate drives the controller as bus master, answers external masters as a
//! slave, recovers stuck buses, and arbitrates ownership of a controller shared
//! between two processors. Board bring-up (clocks, pads, interrupt wiring) stays
//! with the integrator; the driver only sees the traits in [`i2c::traits`].

// Enforce coding guidelines - prevent panic-prone patterns in production code only
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::indexing_slicing))]
#![cfg_attr(not(test), warn(clippy::expect_used))]
#![cfg_attr(not(test), no_std)]
pub mod common;
pub mod i2c;
