// Licensed under the Apache-2.0 license

//! Master state machine.
//!
//! Driven by transmit-empty and receive-full events while a transfer attempt owns
//! the controller. Each handler reads ICR once with the strobes cleared, decides the
//! next bus action, and writes the word back exactly once.

use crate::common::Logger;
use crate::i2c::common::{ArbitrationPolicy, Direction};
use crate::i2c::pxa_i2c::{Error, NakPhase, PxaI2c};
use crate::i2c::registers::{Control, I2cRegisters, Status};
use crate::i2c::traits::Timebase;
use crate::i2c::transfer::{Finish, Message, Phase, TransferSet};

impl<R: I2cRegisters, T: Timebase, L: Logger> PxaI2c<'_, R, T, L> {
    pub(crate) fn master_tx_empty(&mut self, xfer: &mut TransferSet<'_, '_>, status: Status) {
        if xfer.completion.is_posted() {
            return;
        }

        if xfer.phase == Phase::MasterCode {
            xfer.phase = Phase::Address;
            xfer.completion.post(Ok(Finish::PreambleSent));
            return;
        }

        let mut icr = self.regs.read_control().without_strobes();

        if status.ald {
            match self.config.arbitration {
                ArbitrationPolicy::Ignore => {
                    self.logger
                        .debug(format_args!("i2c: ignoring arbitration-lost flag"));
                }
                ArbitrationPolicy::Report => {
                    self.master_complete(xfer, Err(Error::ArbitrationLost));
                    self.regs.write_control(icr);
                    return;
                }
            }
        }

        if status.bed {
            let err = if status.acknak {
                if xfer.at_first_byte() {
                    Error::Nak(NakPhase::AtAddress)
                } else {
                    Error::Nak(NakPhase::MidTransfer)
                }
            } else {
                Error::BusError
            };
            self.master_complete(xfer, Err(err));
            self.regs.write_control(icr);
            return;
        }

        self.next_tx_action(xfer, &mut icr);
        self.regs.write_control(icr);
    }

    /// Decides what follows a transmitted byte. Loops only across continuation
    /// messages, which carry on without a new address.
    fn next_tx_action(&mut self, xfer: &mut TransferSet<'_, '_>, icr: &mut Control) {
        loop {
            let Some(dir) = xfer.current().map(Message::direction) else {
                self.master_complete(xfer, Ok(()));
                return;
            };

            match (dir, xfer.phase) {
                (Direction::Read, Phase::Address) if !xfer.message_exhausted() => {
                    // Address of a read went out; clock in the first byte.
                    xfer.phase = Phase::Data;
                    self.arm_receive(xfer, icr);
                    return;
                }
                (Direction::Read, Phase::Data) if !xfer.message_exhausted() => {
                    self.logger
                        .debug(format_args!("i2c: transmit event during read, ignored"));
                    return;
                }
                (Direction::Write, _) => {
                    let last = xfer.final_byte_of_final_message();
                    if let Some(byte) = xfer.next_tx_byte() {
                        xfer.phase = Phase::Data;
                        self.regs.write_data(byte);
                        icr.ald_ie = true;
                        icr.tb = true;
                        icr.stop = last;
                        return;
                    }
                }
                _ => {}
            }

            if xfer.advance() {
                if xfer.current().is_some_and(Message::is_continuation) {
                    continue;
                }
                self.restart(xfer, icr);
                return;
            }

            // All messages out. A zero-length final message is a probe: no data
            // phase, so end it with a master abort.
            if xfer.current().is_some_and(Message::is_empty) {
                icr.ma = true;
                xfer.mark_probe();
            }
            self.master_complete(xfer, Ok(()));
            return;
        }
    }

    pub(crate) fn master_rx_full(&mut self, xfer: &mut TransferSet<'_, '_>) {
        let mut icr = self.regs.read_control().without_strobes();
        let byte = self.regs.read_data();

        if xfer.completion.is_posted() {
            return;
        }

        if !xfer.store_rx_byte(byte) {
            self.logger
                .warn(format_args!("i2c: unexpected byte 0x{:02x} in message {}", byte, xfer.index()));
            self.master_complete(xfer, Err(Error::BusError));
            self.regs.write_control(icr);
            return;
        }

        if !xfer.message_exhausted() {
            self.arm_receive(xfer, &mut icr);
        } else if xfer.advance() {
            if xfer.current().is_some_and(Message::is_continuation) {
                self.arm_receive(xfer, &mut icr);
            } else {
                self.restart(xfer, &mut icr);
            }
        } else {
            self.master_complete(xfer, Ok(()));
        }
        self.regs.write_control(icr);
    }

    /// Clocks in one byte; NAKs it when it ends the read run, and stops after it
    /// when it ends the transfer.
    fn arm_receive(&mut self, xfer: &TransferSet<'_, '_>, icr: &mut Control) {
        if xfer.receiving_last_of_run() {
            icr.acknak = true;
            icr.stop = xfer.is_last_message();
        }
        icr.ald_ie = true;
        icr.tb = true;
    }

    /// Repeated start with the current message's address.
    fn restart(&mut self, xfer: &mut TransferSet<'_, '_>, icr: &mut Control) {
        let addr = xfer.current().map_or(0, Message::address_byte);
        self.regs.write_data(addr);
        xfer.phase = Phase::Address;
        icr.ald_ie = false;
        icr.start = true;
        icr.tb = true;
    }

    fn master_complete(&mut self, xfer: &mut TransferSet<'_, '_>, result: Result<(), Error>) {
        if !xfer.completion.post(result.map(|()| Finish::Done)) {
            self.logger
                .debug(format_args!("i2c: completion already posted, dropping"));
        }
    }
}
