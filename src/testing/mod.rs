//! Host-side doubles for the node's hardware
//!
//! The fakes model what the bootloader depends on: erase leaves 0xFF, page
//! writes can only clear bits, NVM cycles report busy for a few polls, and
//! program memory reads back 0xFF until reads are re-enabled after a cycle.

use crate::config::{BOOTLOADER_START, EEPROM_SIZE, FLASH_SIZE, PAGE_SIZE, REPLY_FILL_BYTE};
use crate::drivers::{ConfigStorage, NvmError, ProgramMemory};
use crate::logger::{Event, Log};
use crate::os::InterruptControl;
use crate::protocol::{xor_checksum, BusEngine, BusEvent};

/// Polls a fake NVM cycle reports busy before completing
const CYCLE_POLLS: u8 = 3;

pub struct FakeFlash {
    memory: [u8; FLASH_SIZE],
    temp: [u8; PAGE_SIZE],
    busy_polls: u8,
    stuck: bool,
    reads_enabled: bool,
    erases: u32,
    writes: u32,
}

impl FakeFlash {
    /// Blank (erased) program memory.
    pub fn new() -> Self {
        Self::filled(0xFF)
    }

    pub fn zeroed() -> Self {
        Self::filled(0x00)
    }

    fn filled(value: u8) -> Self {
        Self {
            memory: [value; FLASH_SIZE],
            temp: [0xFF; PAGE_SIZE],
            busy_polls: 0,
            stuck: false,
            reads_enabled: true,
            erases: 0,
            writes: 0,
        }
    }

    /// Places `bytes` at `address` directly, as an earlier programming would.
    pub fn load(&mut self, address: u16, bytes: &[u8]) {
        let start = address as usize;
        self.memory[start..start + bytes.len()].copy_from_slice(bytes);
    }

    pub fn page(&self, address: u16) -> &[u8] {
        let start = address as usize;
        &self.memory[start..start + PAGE_SIZE]
    }

    /// A stuck device never leaves busy.
    pub fn set_stuck(&mut self, stuck: bool) {
        self.stuck = stuck;
    }

    pub fn erase_count(&self) -> u32 {
        self.erases
    }

    pub fn write_count(&self) -> u32 {
        self.writes
    }

    pub fn reads_enabled(&self) -> bool {
        self.reads_enabled
    }

    fn page_range(page_address: u16) -> core::ops::Range<usize> {
        let start = page_address as usize & !(PAGE_SIZE - 1);
        start..start + PAGE_SIZE
    }
}

impl Default for FakeFlash {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgramMemory for FakeFlash {
    fn read_byte(&mut self, address: u16) -> u8 {
        if !self.reads_enabled && address < BOOTLOADER_START {
            return 0xFF;
        }
        self.memory[address as usize]
    }

    fn fill_word(&mut self, address: u16, word: u16) {
        let offset = (address as usize % PAGE_SIZE) & !1;
        let [lo, hi] = word.to_le_bytes();
        self.temp[offset] = lo;
        self.temp[offset + 1] = hi;
    }

    fn start_erase(&mut self, page_address: u16) {
        for byte in &mut self.memory[Self::page_range(page_address)] {
            *byte = 0xFF;
        }
        self.erases += 1;
        self.busy_polls = CYCLE_POLLS;
        self.reads_enabled = false;
    }

    fn start_write(&mut self, page_address: u16) {
        let range = Self::page_range(page_address);
        for (byte, &staged) in self.memory[range].iter_mut().zip(self.temp.iter()) {
            *byte &= staged;
        }
        self.temp = [0xFF; PAGE_SIZE];
        self.writes += 1;
        self.busy_polls = CYCLE_POLLS;
        self.reads_enabled = false;
    }

    fn poll_ready(&mut self) -> nb::Result<(), NvmError> {
        if self.stuck {
            return Err(nb::Error::WouldBlock);
        }
        if self.busy_polls > 0 {
            self.busy_polls -= 1;
            return Err(nb::Error::WouldBlock);
        }
        Ok(())
    }

    fn enable_reads(&mut self) {
        self.reads_enabled = true;
    }
}

pub struct FakeEeprom {
    cells: [u8; EEPROM_SIZE],
    busy_polls: u8,
    stuck: bool,
    writes: u32,
}

impl FakeEeprom {
    pub fn new() -> Self {
        Self {
            cells: [0xFF; EEPROM_SIZE],
            busy_polls: 0,
            stuck: false,
            writes: 0,
        }
    }

    pub fn bytes(&self, offset: u16, len: usize) -> &[u8] {
        let start = offset as usize;
        &self.cells[start..start + len]
    }

    pub fn set_stuck(&mut self, stuck: bool) {
        self.stuck = stuck;
    }

    pub fn write_count(&self) -> u32 {
        self.writes
    }
}

impl Default for FakeEeprom {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStorage for FakeEeprom {
    fn read_byte(&mut self, offset: u16) -> u8 {
        self.cells[offset as usize % EEPROM_SIZE]
    }

    fn start_write(&mut self, offset: u16, value: u8) {
        self.cells[offset as usize % EEPROM_SIZE] = value;
        self.writes += 1;
        self.busy_polls = CYCLE_POLLS;
    }

    fn poll_ready(&mut self) -> nb::Result<(), NvmError> {
        if self.stuck {
            return Err(nb::Error::WouldBlock);
        }
        if self.busy_polls > 0 {
            self.busy_polls -= 1;
            return Err(nb::Error::WouldBlock);
        }
        Ok(())
    }
}

/// Counts critical sections instead of masking anything.
#[derive(Debug, Default)]
pub struct FakeIrq {
    sections: u32,
    masked: bool,
}

impl FakeIrq {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sections(&self) -> u32 {
        self.sections
    }

    pub fn is_masked(&self) -> bool {
        self.masked
    }
}

impl InterruptControl for FakeIrq {
    fn free<R, F: FnOnce() -> R>(&mut self, f: F) -> R {
        self.sections += 1;
        self.masked = true;
        let result = f();
        self.masked = false;
        result
    }
}

const LOG_CAPACITY: usize = 64;

/// Keeps the first `LOG_CAPACITY` events for inspection.
pub struct RecordingLog {
    events: [Option<Event>; LOG_CAPACITY],
    len: usize,
}

impl RecordingLog {
    pub fn new() -> Self {
        Self {
            events: [None; LOG_CAPACITY],
            len: 0,
        }
    }

    pub fn events(&self) -> impl Iterator<Item = Event> + '_ {
        self.events[..self.len].iter().flatten().copied()
    }

    pub fn contains(&self, event: Event) -> bool {
        self.events().any(|recorded| recorded == event)
    }

    pub fn count(&self, event: Event) -> usize {
        self.events().filter(|&recorded| recorded == event).count()
    }

    pub fn last(&self) -> Option<Event> {
        self.len.checked_sub(1).and_then(|i| self.events[i])
    }
}

impl Default for RecordingLog {
    fn default() -> Self {
        Self::new()
    }
}

impl Log for RecordingLog {
    fn record(&mut self, event: Event) {
        if self.len < LOG_CAPACITY {
            self.events[self.len] = Some(event);
            self.len += 1;
        }
    }
}

/// Copies `body` into `out` and appends its checksum. Returns the frame length.
pub fn frame(address: u8, body: &[u8], out: &mut [u8]) -> usize {
    out[..body.len()].copy_from_slice(body);
    out[body.len()] = xor_checksum(address, body);
    body.len() + 1
}

/// Drives one complete write transaction into the engine.
pub fn master_write(engine: &mut BusEngine, bytes: &[u8]) {
    engine.service(BusEvent::AddressedWrite);
    for &byte in bytes {
        engine.service(BusEvent::DataReceived(byte));
    }
    engine.service(BusEvent::StopOrRestart);
}

/// Drives one read transaction of `N` bytes and returns what was transmitted.
pub fn master_read<const N: usize>(engine: &mut BusEngine) -> [u8; N] {
    let mut out = [REPLY_FILL_BYTE; N];
    for (i, byte) in out.iter_mut().enumerate() {
        let event = if i == 0 {
            BusEvent::AddressedRead
        } else {
            BusEvent::DataRequested
        };
        *byte = engine.service(event).transmit.unwrap_or(REPLY_FILL_BYTE);
    }
    engine.service(BusEvent::ReadComplete);
    out
}
