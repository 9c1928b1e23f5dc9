//! Program memory (self-programming) driver interface

use crate::config::{NVM_POLL_LIMIT, PAGE_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ufmt::derive::uDebug)]
pub enum NvmError {
    /// The hardware kept reporting busy past the poll budget
    Timeout,
}

/// Page-oriented access to the on-chip program memory.
///
/// Erase and write only start the operation; completion is observed through
/// `poll_ready`, which returns `WouldBlock` while the hardware is busy.
pub trait ProgramMemory {
    fn read_byte(&mut self, address: u16) -> u8;

    /// Loads one little-endian word into the temporary page buffer.
    fn fill_word(&mut self, address: u16, word: u16);

    fn start_erase(&mut self, page_address: u16);

    /// Programs the temporary page buffer into the page at `page_address`.
    fn start_write(&mut self, page_address: u16);

    fn poll_ready(&mut self) -> nb::Result<(), NvmError>;

    /// Re-enables reading of the application section after programming.
    fn enable_reads(&mut self);
}

/// Spins on `poll` for at most `NVM_POLL_LIMIT` attempts.
pub fn wait_ready<F>(mut poll: F) -> Result<(), NvmError>
where
    F: FnMut() -> nb::Result<(), NvmError>,
{
    for _ in 0..NVM_POLL_LIMIT {
        match poll() {
            Ok(()) => return Ok(()),
            Err(nb::Error::WouldBlock) => continue,
            Err(nb::Error::Other(err)) => return Err(err),
        }
    }
    Err(NvmError::Timeout)
}

/// Copies `buffer.len()` bytes starting at `address` out of program memory.
pub fn read<M: ProgramMemory>(memory: &mut M, address: u16, buffer: &mut [u8]) {
    for (offset, byte) in buffer.iter_mut().enumerate() {
        *byte = memory.read_byte(address.wrapping_add(offset as u16));
    }
}

/// Erases one page and programs `data` into it, word by word.
pub fn erase_and_write<M: ProgramMemory>(
    memory: &mut M,
    page_address: u16,
    data: &[u8; PAGE_SIZE],
) -> Result<(), NvmError> {
    wait_ready(|| memory.poll_ready())?;

    memory.start_erase(page_address);
    wait_ready(|| memory.poll_ready())?;

    for (i, pair) in data.chunks_exact(2).enumerate() {
        let word = u16::from_le_bytes([pair[0], pair[1]]);
        memory.fill_word(page_address + (i * 2) as u16, word);
    }

    memory.start_write(page_address);
    wait_ready(|| memory.poll_ready())?;

    memory.enable_reads();
    Ok(())
}
