pub mod eeprom;
pub mod flash;

pub use eeprom::ConfigStorage;
pub use flash::{NvmError, ProgramMemory};
