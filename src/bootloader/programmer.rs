//! Page assembly and program memory commits

use super::persisted::PersistedState;
use crate::config::{BOOTLOADER_START, HALF_PAGE_SIZE, INTVECT_LEN, INTVECT_PAGE_ADDRESS, PAGE_SIZE};
use crate::drivers::{flash, ConfigStorage, NvmError, ProgramMemory};
use crate::os::InterruptControl;

/// One page of image data assembled from two half-page commands.
pub struct PageBuffer {
    data: [u8; PAGE_SIZE],
    target: u16,
    low_loaded: bool,
}

impl PageBuffer {
    pub const fn new() -> Self {
        Self {
            data: [0; PAGE_SIZE],
            target: 0,
            low_loaded: false,
        }
    }

    pub fn data(&self) -> &[u8; PAGE_SIZE] {
        &self.data
    }

    /// Byte address of the page this buffer will be committed to.
    pub fn target(&self) -> u16 {
        self.target
    }
}

impl Default for PageBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Written { address: u16, vectors_preserved: bool },
    /// The target lies in the bootloader's own region
    Refused { address: u16 },
}

/// True for addresses the bootloader must never erase or write.
pub fn is_protected(address: u16) -> bool {
    address >= BOOTLOADER_START
}

pub struct FlashProgrammer<M, S> {
    memory: M,
    storage: S,
    page: PageBuffer,
    pending_version: u16,
}

impl<M, S> FlashProgrammer<M, S>
where
    M: ProgramMemory,
    S: ConfigStorage,
{
    pub fn new(memory: M, storage: S) -> Self {
        Self {
            memory,
            storage,
            page: PageBuffer::new(),
            pending_version: 0,
        }
    }

    /// Starts a new page: clears the buffer and fills its low half.
    pub fn load_low(&mut self, page_index: u8, half: &[u8]) {
        self.page.data = [0; PAGE_SIZE];
        self.page.data[..HALF_PAGE_SIZE].copy_from_slice(&half[..HALF_PAGE_SIZE]);
        self.page.target = page_index as u16 * PAGE_SIZE as u16;
        self.page.low_loaded = true;
    }

    /// Fills the high half. Refused until a low half has been loaded.
    pub fn load_high(&mut self, half: &[u8]) -> bool {
        if !self.page.low_loaded {
            return false;
        }
        self.page.data[HALF_PAGE_SIZE..].copy_from_slice(&half[..HALF_PAGE_SIZE]);
        true
    }

    pub fn stage_version(&mut self, version: u16) {
        self.pending_version = version;
    }

    pub fn pending_version(&self) -> u16 {
        self.pending_version
    }

    pub fn persisted(&mut self) -> PersistedState {
        PersistedState::load(&mut self.storage)
    }

    /// Erases and programs the assembled page.
    ///
    /// The vector table page keeps its current vectors, and committing it
    /// invalidates the persisted image first. The erase/write sequence runs
    /// with interrupts masked.
    pub fn commit_page<I: InterruptControl>(&mut self, irq: &mut I) -> Result<CommitOutcome, NvmError> {
        let address = self.page.target;
        if is_protected(address) {
            return Ok(CommitOutcome::Refused { address });
        }

        let memory = &mut self.memory;
        let storage = &mut self.storage;
        let page = &mut self.page;

        irq.free(|| -> Result<CommitOutcome, NvmError> {
            let vectors_preserved = address == INTVECT_PAGE_ADDRESS;
            if vectors_preserved {
                // An abandoned earlier cycle may have left the section unreadable
                flash::wait_ready(|| memory.poll_ready())?;
                memory.enable_reads();
                flash::read(memory, INTVECT_PAGE_ADDRESS, &mut page.data[..INTVECT_LEN]);
                PersistedState::invalidate(storage)?;
            }
            flash::erase_and_write(memory, address, &page.data)?;
            Ok(CommitOutcome::Written {
                address,
                vectors_preserved,
            })
        })
    }

    /// Persists the staged version and marks the image bootable.
    pub fn finalize<I: InterruptControl>(&mut self, irq: &mut I) -> Result<u16, NvmError> {
        let version = self.pending_version;
        let storage = &mut self.storage;
        irq.free(|| PersistedState::finalize(storage, version))?;
        Ok(version)
    }

    pub fn page(&self) -> &PageBuffer {
        &self.page
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut M {
        &mut self.memory
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }
}
