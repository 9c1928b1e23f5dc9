use crate::drivers::{ConfigStorage, NvmError};
use avr_device::atmega328p::EEPROM;

const EERE: u8 = 0x01;
const EEPE: u8 = 0x02;
const EEMPE: u8 = 0x04;

pub struct Eeprom;

impl ConfigStorage for Eeprom {
    fn read_byte(&mut self, offset: u16) -> u8 {
        unsafe {
            let p = EEPROM::ptr();
            (*p).eear.write(|w| w.bits(offset));
            (*p).eecr.write(|w| w.bits(EERE));
            (*p).eedr.read().bits()
        }
    }

    /// EEPE must follow EEMPE within four cycles; callers mask interrupts.
    fn start_write(&mut self, offset: u16, value: u8) {
        unsafe {
            let p = EEPROM::ptr();
            (*p).eear.write(|w| w.bits(offset));
            (*p).eedr.write(|w| w.bits(value));
            (*p).eecr.write(|w| w.bits(EEMPE));
            (*p).eecr.write(|w| w.bits(EEMPE | EEPE));
        }
    }

    fn poll_ready(&mut self) -> nb::Result<(), NvmError> {
        let eecr = unsafe { (*EEPROM::ptr()).eecr.read().bits() };
        if eecr & EEPE != 0 {
            Err(nb::Error::WouldBlock)
        } else {
            Ok(())
        }
    }
}
