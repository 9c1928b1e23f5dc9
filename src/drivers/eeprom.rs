//! Configuration storage (EEPROM) driver interface

use super::flash::{wait_ready, NvmError};

/// Byte-addressed non-volatile configuration storage.
pub trait ConfigStorage {
    fn read_byte(&mut self, offset: u16) -> u8;

    /// Starts an erase-and-write cycle of one byte.
    fn start_write(&mut self, offset: u16, value: u8);

    fn poll_ready(&mut self) -> nb::Result<(), NvmError>;
}

/// Writes `value` unless the cell already holds it, then waits for the cycle.
pub fn update_byte<S: ConfigStorage>(storage: &mut S, offset: u16, value: u8) -> Result<(), NvmError> {
    wait_ready(|| storage.poll_ready())?;
    if storage.read_byte(offset) == value {
        return Ok(());
    }
    storage.start_write(offset, value);
    wait_ready(|| storage.poll_ready())
}

pub fn read_u16<S: ConfigStorage>(storage: &mut S, offset: u16) -> u16 {
    u16::from_le_bytes([storage.read_byte(offset), storage.read_byte(offset + 1)])
}

pub fn update_u16<S: ConfigStorage>(storage: &mut S, offset: u16, value: u16) -> Result<(), NvmError> {
    let [lo, hi] = value.to_le_bytes();
    update_byte(storage, offset, lo)?;
    update_byte(storage, offset + 1, hi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeEeprom;

    #[test]
    fn update_skips_unchanged_cells() {
        let mut eeprom = FakeEeprom::new();
        update_byte(&mut eeprom, 4, 0xFF).unwrap();
        assert_eq!(eeprom.write_count(), 0);
        update_byte(&mut eeprom, 4, 0x12).unwrap();
        assert_eq!(eeprom.write_count(), 1);
    }

    #[test]
    fn words_are_little_endian() {
        let mut eeprom = FakeEeprom::new();
        update_u16(&mut eeprom, 2, 0x0102).unwrap();
        assert_eq!(eeprom.read_byte(2), 0x02);
        assert_eq!(eeprom.read_byte(3), 0x01);
        assert_eq!(read_u16(&mut eeprom, 2), 0x0102);
    }
}
