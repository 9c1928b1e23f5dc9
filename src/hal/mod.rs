//! ATmega328P peripherals used by the bootloader

pub mod eeprom;
pub mod gpio;
pub mod power;
pub mod spm;
pub mod timer;
pub mod twi;
pub mod uart;
pub mod watchdog;

pub use eeprom::Eeprom;
pub use gpio::DebugPin;
pub use power::Power;
pub use spm::SelfProgram;
pub use timer::Delay;
pub use twi::{SharedBus, TwiSlave};
pub use uart::Usart0;
pub use watchdog::Watchdog;

use crate::os::InterruptControl;
use avr_device::atmega328p::CPU;
use core::arch::asm;

/// MCUCR interrupt vector change enable and select
const IVCE: u8 = 0x01;
const IVSEL: u8 = 0x02;

/// Masks interrupts with the global interrupt flag.
pub struct GlobalInterrupts;

impl InterruptControl for GlobalInterrupts {
    fn free<R, F: FnOnce() -> R>(&mut self, f: F) -> R {
        avr_device::interrupt::free(|_| f())
    }
}

/// Points the interrupt vectors at the boot section (`true`) or at the
/// application's table at 0x0000. IVSEL must follow IVCE within four cycles.
pub fn select_boot_vectors(boot: bool) {
    avr_device::interrupt::free(|_| unsafe {
        let p = CPU::ptr();
        (*p).mcucr.write(|w| w.bits(IVCE));
        (*p).mcucr.write(|w| w.bits(if boot { IVSEL } else { 0 }));
    });
}

/// Hands the CPU to the application at `entry_word`. Never returns.
pub fn jump_to_application(entry_word: u16) -> ! {
    TwiSlave::disable();
    avr_device::interrupt::disable();
    select_boot_vectors(false);
    unsafe {
        asm!("ijmp", in("Z") entry_word, options(noreturn));
    }
}
