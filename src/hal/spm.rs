//! Self-programming through SPM

use crate::drivers::{NvmError, ProgramMemory};
use avr_device::atmega328p::CPU;
use core::arch::asm;

const SELFPRGEN: u8 = 0x01;
const PGERS: u8 = 0x02;
const PGWRT: u8 = 0x04;
const RWWSRE: u8 = 0x10;

/// Program memory of the running device. Only usable from the boot section.
pub struct SelfProgram;

impl SelfProgram {
    /// Writes SPMCSR and issues SPM within the four cycle window.
    #[inline(always)]
    fn spm(command: u8, address: u16) {
        unsafe {
            asm!(
                "out 0x37, {cmd}",
                "spm",
                cmd = in(reg) command,
                in("Z") address,
                options(nostack),
            );
        }
    }
}

impl ProgramMemory for SelfProgram {
    fn read_byte(&mut self, address: u16) -> u8 {
        let byte: u8;
        unsafe {
            asm!(
                "lpm {b}, Z",
                b = out(reg) byte,
                in("Z") address,
                options(pure, readonly, nostack),
            );
        }
        byte
    }

    fn fill_word(&mut self, address: u16, word: u16) {
        unsafe {
            asm!(
                "movw r0, {data}",
                "out 0x37, {cmd}",
                "spm",
                "clr r1",
                data = in(reg_pair) word,
                cmd = in(reg) SELFPRGEN,
                in("Z") address,
                options(nostack),
            );
        }
    }

    fn start_erase(&mut self, page_address: u16) {
        Self::spm(PGERS | SELFPRGEN, page_address);
    }

    fn start_write(&mut self, page_address: u16) {
        Self::spm(PGWRT | SELFPRGEN, page_address);
    }

    fn poll_ready(&mut self) -> nb::Result<(), NvmError> {
        let spmcsr = unsafe { (*CPU::ptr()).spmcsr.read().bits() };
        if spmcsr & SELFPRGEN != 0 {
            Err(nb::Error::WouldBlock)
        } else {
            Ok(())
        }
    }

    fn enable_reads(&mut self) {
        Self::spm(RWWSRE | SELFPRGEN, 0);
    }
}
