// Licensed under the Apache-2.0 license

use hex_literal::hex;

use super::{eeprom, pio, EEPROM_ADDR, OWN_ADDR};
use crate::common::NoOpLogger;
use crate::i2c::common::{Direction, I2cSEvent, I2cSpeed};
use crate::i2c::pxa_i2c::{Error, Mode, PxaI2c};
use crate::i2c::traits::{I2cHardwareCore, I2cMaster, I2cSlaveCore};
use crate::i2c::transfer::Message;
use crate::tests::sim::{ExternalTxn, RecordingSlave, SimBus, SimClock, Trigger, Wire};

fn external_write(trigger: Trigger, data: &[u8]) -> ExternalTxn {
    ExternalTxn {
        trigger,
        dir: Direction::Write,
        data: data.to_vec(),
        read_len: 0,
        byte_gap_us: 0,
    }
}

#[test]
fn answers_external_masters() {
    let mut slave = RecordingSlave {
        next_tx: 0x40,
        ..RecordingSlave::default()
    };
    let mut bus = SimBus::new();
    bus.script(external_write(Trigger::Now, &hex!("DE AD")));
    bus.script(ExternalTxn {
        trigger: Trigger::Now,
        dir: Direction::Read,
        data: Vec::new(),
        read_len: 3,
        byte_gap_us: 0,
    });
    let mut i2c = PxaI2c::new(bus, SimClock::new(), NoOpLogger);
    i2c.register_slave(&mut slave);
    i2c.init(pio().slave_address(OWN_ADDR).build()).unwrap();
    assert!(i2c.is_slave_mode_enabled());
    assert_eq!(i2c.registers().own_address(), OWN_ADDR);

    for _ in 0..32 {
        i2c.handle_interrupt();
    }

    assert_eq!(i2c.registers().slave_sent, hex!("40 41 42"));
    assert_eq!(i2c.state().mode(), Mode::Idle);
    drop(i2c);
    assert_eq!(slave.received, hex!("DE AD"));
    assert_eq!(
        slave.events,
        [
            I2cSEvent::Start(Direction::Write),
            I2cSEvent::Stop,
            I2cSEvent::Start(Direction::Read),
            I2cSEvent::Stop,
        ]
    );
}

#[test]
fn missing_callbacks_send_zeroes() {
    let mut bus = SimBus::new();
    bus.script(ExternalTxn {
        trigger: Trigger::Now,
        dir: Direction::Read,
        data: Vec::new(),
        read_len: 2,
        byte_gap_us: 0,
    });
    let mut i2c = PxaI2c::new(bus, SimClock::new(), NoOpLogger);
    i2c.init(pio().slave_address(OWN_ADDR).build()).unwrap();

    for _ in 0..16 {
        i2c.handle_interrupt();
    }
    assert_eq!(i2c.registers().slave_sent, [0u8, 0]);
}

#[test]
fn slave_address_defers_master_attempt_and_resumes_once() {
    let mut slave = RecordingSlave::default();
    let mut bus = SimBus::new();
    bus.attach(eeprom());
    // arrives right after the register pointer went out
    bus.script(external_write(Trigger::AfterMasterBytes(2), &hex!("01 02 03")));
    let mut i2c = PxaI2c::new(bus, SimClock::new(), NoOpLogger);
    i2c.register_slave(&mut slave);
    i2c.init(pio().slave_address(OWN_ADDR).build()).unwrap();

    let mut buf = [0u8; 4];
    let moved = i2c
        .transfer(&mut [
            Message::write(EEPROM_ADDR, &[0x10]),
            Message::read(EEPROM_ADDR, &mut buf),
        ])
        .unwrap();

    assert_eq!(moved, 5);
    assert_eq!(i2c.counters().deferred, 1);
    assert_eq!(i2c.counters().resumed, 1);
    assert_eq!(i2c.counters().attempts, 2);
    assert_eq!(i2c.counters().retries, 0);
    let starts = i2c
        .registers()
        .wire
        .iter()
        .filter(|w| matches!(w, Wire::Start(_)))
        .count();
    assert_eq!(starts, 2);
    drop(i2c);
    assert_eq!(buf, hex!("AA BB CC DD"));
    assert_eq!(slave.received, hex!("01 02 03"));
    assert_eq!(slave.events.last(), Some(&I2cSEvent::Stop));
}

#[test]
fn queued_master_request_waits_for_slave_stop() {
    let mut slave = RecordingSlave::default();
    let mut bus = SimBus::new();
    bus.attach(eeprom());
    bus.script(external_write(Trigger::Now, &hex!("0A 0B 0C 0D")));
    let mut i2c = PxaI2c::new(bus, SimClock::new(), NoOpLogger);
    i2c.register_slave(&mut slave);
    i2c.init(pio().slave_address(OWN_ADDR).build()).unwrap();

    // The external master shows up while the request waits for the bus.
    i2c.write(EEPROM_ADDR, &hex!("20 99")).unwrap();

    assert_eq!(i2c.counters().deferred, 0);
    assert_eq!(i2c.counters().resumed, 1);
    assert_eq!(i2c.counters().attempts, 1);
    let wire = &i2c.registers().wire;
    assert_eq!(wire, &[Wire::Start(0xa0), Wire::Tx(0x20), Wire::Tx(0x99), Wire::Stop]);
    drop(i2c);
    assert_eq!(slave.received, hex!("0A 0B 0C 0D"));
}

#[test]
fn slow_external_master_is_not_cut_short_by_the_bus_wait() {
    let clock = SimClock::new();
    let mut slave = RecordingSlave::default();
    let mut bus = SimBus::new().with_clock(&clock);
    bus.attach(eeprom());
    bus.script(ExternalTxn {
        byte_gap_us: 30_000,
        ..external_write(Trigger::Now, &hex!("0A 0B 0C 0D"))
    });
    let mut i2c = PxaI2c::new(bus, clock.clone(), NoOpLogger);
    i2c.register_slave(&mut slave);
    i2c.init(pio().slave_address(OWN_ADDR).build()).unwrap();
    let resets = i2c.counters().resets;

    let before = clock.micros();
    i2c.write(EEPROM_ADDR, &hex!("20 99")).unwrap();

    // four bytes and the stop, 30 ms apart, against the 64 ms bus wait
    assert!(clock.micros() - before >= 150_000);
    assert_eq!(i2c.counters().resets, resets + 1);
    assert_eq!(i2c.counters().resumed, 1);
    assert_eq!(i2c.counters().retries, 0);
    drop(i2c);
    assert_eq!(slave.received, hex!("0A 0B 0C 0D"));
    assert_eq!(
        slave.events,
        [I2cSEvent::Start(Direction::Write), I2cSEvent::Stop]
    );
}

#[test]
fn slave_address_during_master_code_defers_without_a_retry() {
    let mut slave = RecordingSlave::default();
    let mut bus = SimBus::new();
    bus.attach(eeprom());
    bus.script(external_write(Trigger::AfterMasterCode, &hex!("05 06")));
    let mut i2c = PxaI2c::new(bus, SimClock::new(), NoOpLogger);
    i2c.register_slave(&mut slave);
    i2c.init(
        pio()
            .speed(I2cSpeed::HighSpeed)
            .master_code(0x0b)
            .retries(0)
            .slave_address(OWN_ADDR)
            .build(),
    )
    .unwrap();

    i2c.write(EEPROM_ADDR, &hex!("40 01")).unwrap();

    assert_eq!(i2c.counters().deferred, 1);
    assert_eq!(i2c.counters().resumed, 1);
    assert_eq!(i2c.counters().attempts, 2);
    assert_eq!(i2c.counters().retries, 0);
    assert_eq!(
        i2c.registers().wire,
        [
            Wire::MasterCode(0x0b),
            Wire::MasterCode(0x0b),
            Wire::Restart(0xa0),
            Wire::Tx(0x40),
            Wire::Tx(0x01),
            Wire::Stop,
        ]
    );
    drop(i2c);
    assert_eq!(slave.received, hex!("05 06"));
}

#[test]
fn slave_mode_can_be_switched_at_runtime() {
    let mut i2c = PxaI2c::new(SimBus::new(), SimClock::new(), NoOpLogger);
    i2c.init(pio().build()).unwrap();

    assert!(!i2c.is_slave_mode_enabled());
    assert_eq!(i2c.enable_slave_mode(), Err(Error::Invalid));
    assert_eq!(i2c.set_slave_address(0x80), Err(Error::Invalid));

    i2c.set_slave_address(0x33).unwrap();
    i2c.enable_slave_mode().unwrap();
    assert!(i2c.is_slave_mode_enabled());
    assert_eq!(i2c.slave_address(), Some(0x33));
    assert_eq!(i2c.registers().own_address(), 0x33);

    let resets = i2c.counters().resets;
    i2c.unregister_slave();
    i2c.disable_slave_mode().unwrap();
    assert!(!i2c.is_slave_mode_enabled());
    i2c.recover_bus().unwrap();
    assert_eq!(i2c.counters().resets, resets + 1);
}
