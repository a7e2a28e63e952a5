// Licensed under the Apache-2.0 license

use embedded_hal::i2c::{Error as _, ErrorKind, I2c, NoAcknowledgeSource, Operation};
use hex_literal::hex;

use super::{eeprom, pio, EEPROM_ADDR};
use crate::common::NoOpLogger;
use crate::i2c::i2c_controller::I2cController;
use crate::i2c::pxa_i2c::PxaI2c;
use crate::tests::sim::{CaptureLogger, SimBus, SimClock, Wire};

#[test]
fn embedded_hal_write_read() {
    let mut bus = SimBus::new();
    bus.attach(eeprom());
    let hw = PxaI2c::new(bus, SimClock::new(), NoOpLogger);
    let mut i2c = I2cController::new(hw, pio().build(), NoOpLogger).unwrap();

    let mut buf = [0u8; 4];
    i2c.write_read(EEPROM_ADDR, &[0x10], &mut buf).unwrap();
    assert_eq!(buf, hex!("AA BB CC DD"));
}

#[test]
fn adjacent_operations_share_one_start() {
    let mut bus = SimBus::new();
    let dev = bus.attach(eeprom());
    let hw = PxaI2c::new(bus, SimClock::new(), NoOpLogger);
    let mut i2c = I2cController::new(hw, pio().build(), NoOpLogger).unwrap();

    i2c.transaction(
        EEPROM_ADDR,
        &mut [Operation::Write(&[0x60]), Operation::Write(&hex!("01 02"))],
    )
    .unwrap();
    assert_eq!(dev.borrow().mem[0x60..0x62], hex!("01 02"));

    let mut first = [0u8; 1];
    let mut rest = [0u8; 2];
    let start = i2c.hardware.registers().wire.len();
    i2c.transaction(
        EEPROM_ADDR,
        &mut [
            Operation::Write(&[0x60]),
            Operation::Read(&mut first),
            Operation::Read(&mut rest),
        ],
    )
    .unwrap();

    assert_eq!(first, [0x01]);
    assert_eq!(rest, [0x02, 0x00]);
    assert_eq!(
        i2c.hardware.registers().wire,
        [
            Wire::Start(0xa0),
            Wire::Tx(0x60),
            Wire::Tx(0x01),
            Wire::Tx(0x02),
            Wire::Stop,
            Wire::Start(0xa0),
            Wire::Tx(0x60),
            Wire::Restart(0xa1),
            Wire::Rx(0x01, false),
            Wire::Rx(0x02, false),
            Wire::Rx(0x00, true),
            Wire::Stop,
        ]
    );
    assert_eq!(start, 5);
}

#[test]
fn failures_map_to_error_kinds_and_are_logged() {
    let mut bus = SimBus::new();
    bus.attach(eeprom());
    let mut logger = CaptureLogger::default();
    {
        let hw = PxaI2c::new(bus, SimClock::new(), NoOpLogger);
        let mut i2c = I2cController::new(hw, pio().retries(1).build(), &mut logger).unwrap();

        let err = i2c.write(0x51, &[0x00]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));

        i2c.recover().unwrap();
        assert_eq!(i2c.transaction(EEPROM_ADDR, &mut []), Ok(()));
    }
    assert!(logger.contains("write 0x51 failed"));
    assert!(logger.contains("i2c: up, 100000 Hz"));
}
