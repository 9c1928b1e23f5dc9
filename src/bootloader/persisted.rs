//! Image validity record kept in EEPROM
//!
//! Layout (little-endian words, shared with the programming tool):
//!
//! | offset | field         |
//! |--------|---------------|
//! | 0x00   | valid marker  |
//! | 0x02   | app version   |

use crate::drivers::eeprom::{self, ConfigStorage};
use crate::drivers::NvmError;

pub const MARKER_OFFSET: u16 = 0x00;
pub const VERSION_OFFSET: u16 = 0x02;
pub const RECORD_LEN: u16 = 4;

/// Marker value meaning "a complete image is committed and safe to boot"
pub const IMAGE_VALID_MARKER: u16 = 0x55AA;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistedState {
    pub marker: u16,
    pub app_version: u16,
}

impl PersistedState {
    pub fn load<S: ConfigStorage>(storage: &mut S) -> Self {
        Self {
            marker: eeprom::read_u16(storage, MARKER_OFFSET),
            app_version: eeprom::read_u16(storage, VERSION_OFFSET),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.marker == IMAGE_VALID_MARKER
    }

    /// Erases the whole record. The marker goes first so an interrupted
    /// invalidation never leaves a valid marker behind.
    pub fn invalidate<S: ConfigStorage>(storage: &mut S) -> Result<(), NvmError> {
        for offset in MARKER_OFFSET..MARKER_OFFSET + RECORD_LEN {
            eeprom::update_byte(storage, offset, 0xFF)?;
        }
        Ok(())
    }

    /// Stores `version`, then sets the marker.
    pub fn finalize<S: ConfigStorage>(storage: &mut S, version: u16) -> Result<(), NvmError> {
        eeprom::update_u16(storage, VERSION_OFFSET, version)?;
        eeprom::update_u16(storage, MARKER_OFFSET, IMAGE_VALID_MARKER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeEeprom;

    #[test]
    fn blank_storage_is_invalid() {
        let mut eeprom = FakeEeprom::new();
        let state = PersistedState::load(&mut eeprom);
        assert!(!state.is_valid());
        assert_eq!(state.app_version, 0xFFFF);
    }

    #[test]
    fn finalize_then_invalidate() {
        let mut eeprom = FakeEeprom::new();
        PersistedState::finalize(&mut eeprom, 0x0102).unwrap();
        let state = PersistedState::load(&mut eeprom);
        assert!(state.is_valid());
        assert_eq!(state.app_version, 0x0102);
        assert_eq!(eeprom.bytes(0, 4), &[0xAA, 0x55, 0x02, 0x01]);

        PersistedState::invalidate(&mut eeprom).unwrap();
        let state = PersistedState::load(&mut eeprom);
        assert!(!state.is_valid());
        assert_eq!(eeprom.bytes(0, 4), &[0xFF; 4]);
    }

    #[test]
    fn finalize_fault_leaves_marker_unset() {
        let mut eeprom = FakeEeprom::new();
        eeprom.set_stuck(true);
        assert_eq!(PersistedState::finalize(&mut eeprom, 0x0102), Err(NvmError::Timeout));
        eeprom.set_stuck(false);
        assert!(!PersistedState::load(&mut eeprom).is_valid());
    }
}
