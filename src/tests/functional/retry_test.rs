// Licensed under the Apache-2.0 license

use fugit::MillisDurationU32;
use hex_literal::hex;

use super::{eeprom, pio, EEPROM_ADDR};
use crate::common::NoOpLogger;
use crate::i2c::common::ArbitrationPolicy;
use crate::i2c::pxa_i2c::{Error, Mode, NakPhase, PxaI2c, Transient};
use crate::i2c::traits::{I2cHardwareCore, I2cMaster};
use crate::i2c::transfer::Message;
use crate::tests::sim::{SimBus, SimClock, Wire};

#[test]
fn address_nak_is_retried_until_the_device_answers() {
    let mut bus = SimBus::new();
    let dev = bus.attach(eeprom());
    dev.borrow_mut().nak_addresses = 2;
    let mut i2c = PxaI2c::new(bus, SimClock::new(), NoOpLogger);
    i2c.init(pio().retries(3).build()).unwrap();

    let mut buf = [0u8; 4];
    i2c.write_read(EEPROM_ADDR, &[0x10], &mut buf).unwrap();

    assert_eq!(buf, hex!("AA BB CC DD"));
    assert_eq!(dev.borrow().address_naks, 2);
    assert_eq!(i2c.state().retries(), 2);
    assert_eq!(i2c.counters().attempts, 3);
    assert_eq!(i2c.state().last_error(), None);
}

#[test]
fn address_nak_uses_exactly_the_configured_retries() {
    for retries in [0u8, 1, 3, 5] {
        let mut bus = SimBus::new();
        let dev = bus.attach(eeprom());
        dev.borrow_mut().nak_addresses = u32::MAX;
        let mut i2c = PxaI2c::new(bus, SimClock::new(), NoOpLogger);
        i2c.init(pio().retries(retries).build()).unwrap();

        let err = i2c.write(EEPROM_ADDR, &[0x00]).unwrap_err();

        assert_eq!(
            err,
            Error::Exhausted {
                last: Transient::NakAtAddress
            }
        );
        assert_eq!(err.root_cause(), Error::Nak(NakPhase::AtAddress));
        assert_eq!(dev.borrow().address_naks, u32::from(retries) + 1);
        assert_eq!(i2c.state().retries(), retries);
        assert_eq!(i2c.state().mode(), Mode::Idle);
    }
}

#[test]
fn data_nak_is_not_retried() {
    let mut bus = SimBus::new();
    let dev = bus.attach(eeprom());
    dev.borrow_mut().nak_after = Some(2);
    let mut i2c = PxaI2c::new(bus, SimClock::new(), NoOpLogger);
    i2c.init(pio().build()).unwrap();

    let err = i2c.write(EEPROM_ADDR, &hex!("00 01 02 03"));

    assert_eq!(err, Err(Error::Nak(NakPhase::MidTransfer)));
    assert_eq!(dev.borrow().starts, 1);
    assert_eq!(i2c.counters().retries, 0);
}

#[test]
fn nak_on_repeated_start_address_is_mid_transfer() {
    let mut bus = SimBus::new();
    bus.attach(eeprom());
    let mut i2c = PxaI2c::new(bus, SimClock::new(), NoOpLogger);
    i2c.init(pio().build()).unwrap();

    let mut rx = [0u8; 1];
    let err = i2c.transfer(&mut [
        Message::write(EEPROM_ADDR, &[0x10]),
        Message::read(0x51, &mut rx),
    ]);

    assert_eq!(err, Err(Error::Nak(NakPhase::MidTransfer)));
}

#[test]
fn busy_bus_is_reported_no_earlier_than_the_wait_budget() {
    let clock = SimClock::new();
    let mut bus = SimBus::new();
    bus.attach(eeprom());
    bus.busy_forever = true;
    let mut i2c = PxaI2c::new(bus, clock.clone(), NoOpLogger);
    i2c.init(
        pio()
            .retries(0)
            .bus_wait_timeout(MillisDurationU32::millis(8))
            .build(),
    )
    .unwrap();

    let before = clock.micros();
    let err = i2c.write(EEPROM_ADDR, &[0x00]).unwrap_err();
    let waited = clock.micros() - before;

    assert_eq!(err.root_cause(), Error::BusBusy);
    // full budget, then half of it again after the reset
    assert!(waited >= 12_000, "waited {waited} us");
    assert!(i2c.registers().wire.is_empty());
}

#[test]
fn stalled_transfer_times_out_and_resets() {
    let clock = SimClock::new();
    let mut bus = SimBus::new();
    bus.attach(eeprom());
    bus.frozen = true;
    let mut i2c = PxaI2c::new(bus, clock.clone(), NoOpLogger);
    i2c.init(
        pio()
            .retries(1)
            .xfer_timeout(MillisDurationU32::millis(2))
            .build(),
    )
    .unwrap();
    let resets = i2c.counters().resets;

    let before = clock.micros();
    let err = i2c.write(EEPROM_ADDR, &[0x00]).unwrap_err();

    assert_eq!(err, Error::Exhausted { last: Transient::Timeout });
    assert!(clock.micros() - before >= 4_000);
    assert_eq!(i2c.counters().resets, resets + 2);
    assert_eq!(i2c.state().mode(), Mode::Idle);
}

#[test]
fn arbitration_flag_is_ignored_by_default() {
    let mut bus = SimBus::new();
    bus.attach(eeprom());
    bus.ald_on_address = 1;
    let mut i2c = PxaI2c::new(bus, SimClock::new(), NoOpLogger);
    i2c.init(pio().build()).unwrap();

    i2c.write(EEPROM_ADDR, &hex!("10 01")).unwrap();
    assert_eq!(i2c.counters().attempts, 1);
}

#[test]
fn arbitration_loss_can_be_reported_and_retried() {
    let mut bus = SimBus::new();
    bus.attach(eeprom());
    bus.ald_on_address = 1;
    let mut i2c = PxaI2c::new(bus, SimClock::new(), NoOpLogger);
    i2c.init(pio().arbitration(ArbitrationPolicy::Report).build())
        .unwrap();

    i2c.write(EEPROM_ADDR, &hex!("10 01")).unwrap();
    assert_eq!(i2c.counters().attempts, 2);
    assert_eq!(i2c.counters().retries, 1);
}

fn healthy(i2c: &mut PxaI2c<'_, SimBus<'_>, SimClock>) {
    let mut buf = [0u8; 4];
    i2c.write_read(EEPROM_ADDR, &[0x10], &mut buf).unwrap();
    assert_eq!(buf, hex!("AA BB CC DD"));
    assert_eq!(*i2c.registers().wire.last().unwrap(), Wire::Stop);
}

#[test]
fn healthy_transfer_follows_every_failure() {
    let mut bus = SimBus::new();
    let dev = bus.attach(eeprom());
    let mut i2c = PxaI2c::new(bus, SimClock::new(), NoOpLogger);
    i2c.init(
        pio()
            .retries(1)
            .xfer_timeout(MillisDurationU32::millis(2))
            .bus_wait_timeout(MillisDurationU32::millis(2))
            .build(),
    )
    .unwrap();

    dev.borrow_mut().nak_addresses = u32::MAX;
    assert!(i2c.write(EEPROM_ADDR, &[0x00]).is_err());
    dev.borrow_mut().nak_addresses = 0;
    healthy(&mut i2c);

    dev.borrow_mut().nak_after = Some(1);
    assert!(i2c.write(EEPROM_ADDR, &hex!("10 01 02")).is_err());
    dev.borrow_mut().nak_after = None;
    healthy(&mut i2c);

    i2c.registers_mut().busy_forever = true;
    assert!(i2c.write(EEPROM_ADDR, &[0x00]).is_err());
    i2c.registers_mut().busy_forever = false;
    healthy(&mut i2c);

    i2c.registers_mut().frozen = true;
    assert!(i2c.write(EEPROM_ADDR, &[0x00]).is_err());
    i2c.registers_mut().frozen = false;
    healthy(&mut i2c);

    let mut rx = [0u8; 1];
    assert!(i2c
        .transfer(&mut [Message::write(EEPROM_ADDR, &[0x10]), Message::read(0x51, &mut rx)])
        .is_err());
    healthy(&mut i2c);
}
