//! Configuration constants for the lighting node bootloader

/// CPU frequency in Hz (internal RC oscillator)
pub const CPU_FREQ_HZ: u32 = 8_000_000;

/// Debug console baud rate (`debug` feature only)
pub const UART_BAUD: u32 = 9600;

/// 7-bit bus address of node 0; strapped nodes occupy 0x68..=0x6B.
pub const TWI_BASE_ADDRESS: u8 = 0x68;

/// Address used when the strap inputs are not consulted.
pub const NODE_ADDRESS: u8 = TWI_BASE_ADDRESS;

/// Program memory page size in bytes
pub const PAGE_SIZE: usize = 128;

/// Bytes carried by each of the two write commands
pub const HALF_PAGE_SIZE: usize = PAGE_SIZE / 2;

/// Total program memory
pub const FLASH_SIZE: usize = 0x8000;

/// First byte of the bootloader's own code. Everything from here to the end of
/// flash is never erased or written.
pub const BOOTLOADER_START: u16 = 0x7000;

/// Page holding the reset and interrupt vectors
pub const INTVECT_PAGE_ADDRESS: u16 = 0x0000;

/// Bytes of the vector table kept verbatim when page 0 is reprogrammed
/// (26 vectors of one JMP each).
pub const INTVECT_LEN: usize = 26 * 4;

/// Word address the application starts at, right after the vector table.
pub const APP_ENTRY_WORD: u16 = (INTVECT_LEN / 2) as u16;

/// Inbound frame capacity, checksum included
pub const INBOUND_CAPACITY: usize = 100;

/// Reply frame capacity
pub const REPLY_CAPACITY: usize = 8;

/// EEPROM size in bytes
pub const EEPROM_SIZE: usize = 1024;

/// Busy polls allowed for one erase, write or EEPROM cycle before giving up.
/// A page erase takes about 4ms, far inside this budget at 8MHz.
pub const NVM_POLL_LIMIT: u32 = 200_000;

/// Delay between the boot confirmation and the jump into the application
pub const BOOT_SETTLE_MS: u16 = 10;

/// Byte transmitted when the requester reads past the end of a reply
pub const REPLY_FILL_BYTE: u8 = 0xFF;
