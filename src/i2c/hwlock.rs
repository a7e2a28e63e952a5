// Licensed under the Apache-2.0 license

//! Cross-processor arbitration for a controller wired to two cores.
//!
//! Both processors see the same flag. Whoever sets it owns the controller and its
//! pads until it clears the flag again. The gate couples pad hand-over to the flag
//! so only the owner ever drives SCL/SDA.

use core::sync::atomic::{AtomicU32, Ordering};

use embedded_hal::delay::DelayNs;

use crate::common::Logger;
use crate::i2c::common::LockBackoff;
use crate::i2c::pxa_i2c::Error;
use crate::i2c::traits::{HwLock, PadOwner, PinMux};

/// Lock word in memory visible to both processors. Zero means free, otherwise it
/// holds the owner's id.
pub struct SharedFlag<'a> {
    word: &'a AtomicU32,
    owner: u32,
}

impl<'a> SharedFlag<'a> {
    /// `owner` must be non-zero and differ between the two processors.
    #[must_use]
    pub const fn new(word: &'a AtomicU32, owner: u32) -> Self {
        Self { word, owner }
    }

    #[must_use]
    pub fn holder(&self) -> Option<u32> {
        match self.word.load(Ordering::Acquire) {
            0 => None,
            id => Some(id),
        }
    }
}

impl HwLock for SharedFlag<'_> {
    fn try_acquire(&self) -> bool {
        self.word
            .compare_exchange(0, self.owner, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    fn release(&self) {
        // Only the holder clears the word.
        let _ = self
            .word
            .compare_exchange(self.owner, 0, Ordering::Release, Ordering::Relaxed);
    }
}

/// Hardware lock plus optional pad multiplexer.
pub struct ArbitrationGate<'a> {
    lock: &'a dyn HwLock,
    mux: Option<&'a mut dyn PinMux>,
    backoff: LockBackoff,
    held: bool,
}

impl<'a> ArbitrationGate<'a> {
    #[must_use]
    pub fn new(lock: &'a dyn HwLock, backoff: LockBackoff) -> Self {
        Self {
            lock,
            mux: None,
            backoff,
            held: false,
        }
    }

    /// Swap pads together with the lock.
    #[must_use]
    pub fn with_pin_mux(mut self, mux: &'a mut dyn PinMux) -> Self {
        self.mux = Some(mux);
        self
    }

    /// Replaces the spin/back-off parameters used by [`lock`](Self::lock).
    pub fn set_backoff(&mut self, backoff: LockBackoff) {
        self.backoff = backoff;
    }

    #[must_use]
    pub fn backoff(&self) -> LockBackoff {
        self.backoff
    }

    #[must_use]
    pub fn is_held(&self) -> bool {
        self.held
    }

    /// One acquisition attempt. Pads follow on success.
    pub fn try_lock(&mut self) -> bool {
        if self.held {
            return true;
        }
        if !self.lock.try_acquire() {
            return false;
        }
        self.held = true;
        if let Some(mux) = self.mux.as_deref_mut() {
            mux.select(PadOwner::Local);
        }
        true
    }

    /// Spins, then backs off exponentially between `min_delay_us` and
    /// `max_delay_us`.
    ///
    /// # Errors
    ///
    /// `Error::LockTimeout` after `max_rounds` delayed rounds.
    pub fn lock<D: DelayNs, L: Logger>(&mut self, delay: &mut D, logger: &mut L) -> Result<(), Error> {
        for _ in 0..self.backoff.spins {
            if self.try_lock() {
                return Ok(());
            }
            core::hint::spin_loop();
        }

        let mut wait_us = self.backoff.min_delay_us.max(1);
        for round in 1..=self.backoff.max_rounds {
            delay.delay_us(wait_us);
            if self.try_lock() {
                if round > 1 {
                    logger.debug(format_args!("hwlock: acquired after {} rounds", round));
                }
                return Ok(());
            }
            if wait_us < self.backoff.max_delay_us {
                wait_us = (wait_us * 2).min(self.backoff.max_delay_us);
                if wait_us == self.backoff.max_delay_us {
                    logger.warn(format_args!("hwlock: contended, backing off {} us", wait_us));
                }
            }
        }

        logger.error(format_args!(
            "hwlock: gave up after {} rounds",
            self.backoff.max_rounds
        ));
        Err(Error::LockTimeout)
    }

    /// Hands the pads back, then clears the flag.
    pub fn unlock(&mut self) {
        if !self.held {
            return;
        }
        if let Some(mux) = self.mux.as_deref_mut() {
            mux.select(PadOwner::Remote);
        }
        self.held = false;
        self.lock.release();
    }
}
