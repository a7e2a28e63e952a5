// Licensed under the Apache-2.0 license

//! Messages, the per-call transfer cursor, and the signals the orchestrator waits on.

use core::cell::Cell;

use critical_section::Mutex;

use crate::i2c::common::Direction;
use crate::i2c::pxa_i2c::Error;

/// Largest message the controller's length bookkeeping can describe.
pub const MAX_MESSAGE_LEN: usize = u16::MAX as usize;

/// Caller-owned data for one message.
pub enum Buffer<'b> {
    Write(&'b [u8]),
    Read(&'b mut [u8]),
}

/// One segment of a combined transfer.
pub struct Message<'b> {
    address: u8,
    buf: Buffer<'b>,
    continuation: bool,
}

impl<'b> Message<'b> {
    #[must_use]
    pub fn write(address: u8, bytes: &'b [u8]) -> Self {
        Self {
            address: address & 0x7f,
            buf: Buffer::Write(bytes),
            continuation: false,
        }
    }

    #[must_use]
    pub fn read(address: u8, buffer: &'b mut [u8]) -> Self {
        Self {
            address: address & 0x7f,
            buf: Buffer::Read(buffer),
            continuation: false,
        }
    }

    /// Continue the previous message without a repeated start or address byte.
    #[must_use]
    pub fn continuation(mut self) -> Self {
        self.continuation = true;
        self
    }

    #[must_use]
    pub fn address(&self) -> u8 {
        self.address
    }

    #[must_use]
    pub fn direction(&self) -> Direction {
        match self.buf {
            Buffer::Write(_) => Direction::Write,
            Buffer::Read(_) => Direction::Read,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match &self.buf {
            Buffer::Write(b) => b.len(),
            Buffer::Read(b) => b.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn is_continuation(&self) -> bool {
        self.continuation
    }

    /// Address byte as it goes on the wire: 7-bit address and the R/W bit.
    #[must_use]
    pub fn address_byte(&self) -> u8 {
        let rw = match self.direction() {
            Direction::Write => 0,
            Direction::Read => 1,
        };
        (self.address << 1) | rw
    }
}

/// Checks a message list before any register is touched.
pub(crate) fn validate(msgs: &[Message<'_>]) -> Result<(), Error> {
    let first = msgs.first().ok_or(Error::Invalid)?;
    if first.continuation {
        return Err(Error::Invalid);
    }
    if msgs.iter().any(|m| m.len() > MAX_MESSAGE_LEN) {
        return Err(Error::Invalid);
    }
    let mismatched = msgs
        .windows(2)
        .any(|w| {
            matches!(w, [prev, next]
                if next.continuation && (next.direction() != prev.direction() || next.is_empty()))
        });
    if mismatched {
        return Err(Error::Invalid);
    }
    Ok(())
}

/// Where the master state machine stands within the current message.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Phase {
    /// High-speed master code on the wire, no address yet.
    MasterCode,
    /// Address byte on the wire.
    Address,
    /// Data bytes flowing.
    Data,
}

/// Terminal conditions posted to the waiting orchestrator.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Finish {
    /// Every message went out.
    Done,
    /// The master code went out; the address phase may start.
    PreambleSent,
    /// A slave transaction pre-empted this attempt; rerun it after the stop.
    Deferred,
}

/// One-shot signal carrying the outcome of the current wait.
#[derive(Default)]
pub(crate) struct Completion {
    result: Option<Result<Finish, Error>>,
}

impl Completion {
    /// Posts `result` unless a result is already waiting. Returns `false` for a
    /// second post, which is dropped.
    pub(crate) fn post(&mut self, result: Result<Finish, Error>) -> bool {
        if self.result.is_some() {
            return false;
        }
        self.result = Some(result);
        true
    }

    pub(crate) fn take(&mut self) -> Option<Result<Finish, Error>> {
        self.result.take()
    }

    pub(crate) fn is_posted(&self) -> bool {
        self.result.is_some()
    }
}

/// Messages of one `transfer()` call plus the cursor into them.
///
/// The cursor only moves forward: `idx` grows, `ptr` grows within a message and is
/// reset only when `idx` advances.
pub struct TransferSet<'m, 'b> {
    msgs: &'m mut [Message<'b>],
    idx: usize,
    ptr: usize,
    pub(crate) phase: Phase,
    bytes: u32,
    probe: bool,
    pub(crate) completion: Completion,
}

impl<'m, 'b> TransferSet<'m, 'b> {
    pub(crate) fn new(msgs: &'m mut [Message<'b>]) -> Self {
        Self {
            msgs,
            idx: 0,
            ptr: 0,
            phase: Phase::Address,
            bytes: 0,
            probe: false,
            completion: Completion::default(),
        }
    }

    pub(crate) fn current(&self) -> Option<&Message<'b>> {
        self.msgs.get(self.idx)
    }

    fn next(&self) -> Option<&Message<'b>> {
        self.msgs.get(self.idx + 1)
    }

    pub(crate) fn index(&self) -> usize {
        self.idx
    }

    pub(crate) fn offset(&self) -> usize {
        self.ptr
    }

    pub(crate) fn bytes(&self) -> u32 {
        self.bytes
    }

    pub(crate) fn is_last_message(&self) -> bool {
        self.idx + 1 >= self.msgs.len()
    }

    /// Nothing has been moved yet: we are on the address of the first message.
    pub(crate) fn at_first_byte(&self) -> bool {
        self.idx == 0 && self.ptr == 0
    }

    pub(crate) fn message_exhausted(&self) -> bool {
        self.current().map_or(true, |m| self.ptr >= m.len())
    }

    /// The byte about to be received is the last one before the bus is released or
    /// re-addressed, so it must be NAKed.
    pub(crate) fn receiving_last_of_run(&self) -> bool {
        let Some(msg) = self.current() else {
            return true;
        };
        let continues = self
            .next()
            .is_some_and(|n| n.continuation && n.direction() == Direction::Read);
        self.ptr + 1 >= msg.len() && !continues
    }

    /// The byte about to be moved is the final byte of the final message.
    pub(crate) fn final_byte_of_final_message(&self) -> bool {
        self.is_last_message() && self.current().is_some_and(|m| self.ptr + 1 >= m.len())
    }

    /// Takes the next byte to transmit from a write message.
    pub(crate) fn next_tx_byte(&mut self) -> Option<u8> {
        let byte = match self.msgs.get(self.idx).map(|m| &m.buf) {
            Some(Buffer::Write(b)) => b.get(self.ptr).copied(),
            _ => None,
        }?;
        self.ptr += 1;
        self.bytes += 1;
        Some(byte)
    }

    /// Stores a received byte at the cursor. Returns `false` when the current
    /// message cannot take it.
    pub(crate) fn store_rx_byte(&mut self, byte: u8) -> bool {
        let slot = match self.msgs.get_mut(self.idx).map(|m| &mut m.buf) {
            Some(Buffer::Read(b)) => b.get_mut(self.ptr),
            _ => None,
        };
        match slot {
            Some(slot) => {
                *slot = byte;
                self.ptr += 1;
                self.bytes += 1;
                true
            }
            None => false,
        }
    }

    /// Moves to the next message. Returns `false` when none is left.
    pub(crate) fn advance(&mut self) -> bool {
        if self.is_last_message() {
            return false;
        }
        self.idx += 1;
        self.ptr = 0;
        true
    }

    pub(crate) fn mark_probe(&mut self) {
        self.probe = true;
    }

    pub(crate) fn was_probe(&self) -> bool {
        self.probe
    }
}

/// Flag raised by the interrupt handler and consumed by the waiting thread.
///
/// The ISR glue calls [`IrqSignal::raise`] and masks the controller interrupt line;
/// the driver services the controller from thread context and unmasks it. Only the
/// signal crosses contexts, the controller itself is never touched from the ISR.
pub struct IrqSignal {
    pending: Mutex<Cell<bool>>,
}

impl Default for IrqSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl IrqSignal {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pending: Mutex::new(Cell::new(false)),
        }
    }

    pub fn raise(&self) {
        critical_section::with(|cs| self.pending.borrow(cs).set(true));
    }

    /// Consumes a pending signal.
    pub fn take(&self) -> bool {
        critical_section::with(|cs| self.pending.borrow(cs).replace(false))
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        critical_section::with(|cs| self.pending.borrow(cs).get())
    }
}
