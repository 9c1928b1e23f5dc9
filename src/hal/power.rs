use avr_device::atmega328p::CPU;
use core::arch::asm;

/// SMCR sleep enable, idle mode
const SMCR_IDLE: u8 = 0x01;

pub struct Power {
    _private: (),
}

impl Power {
    pub fn new() -> Self {
        Self { _private: () }
    }

    /// Idles until the next interrupt unless `wake` already holds.
    ///
    /// `wake` is evaluated with interrupts off. `sei` delays interrupts by one
    /// instruction, so an interrupt arriving after the check still ends the
    /// following `sleep` instead of being missed.
    pub fn sleep_unless<F: FnMut() -> bool>(&mut self, mut wake: F) {
        avr_device::interrupt::disable();
        if wake() {
            unsafe { avr_device::interrupt::enable() };
            return;
        }
        unsafe {
            let p = CPU::ptr();
            (*p).smcr.write(|w| w.bits(SMCR_IDLE));
            asm!("sei", "sleep", options(nostack));
            (*p).smcr.write(|w| w.bits(0));
        }
    }
}

impl Default for Power {
    fn default() -> Self {
        Self::new()
    }
}
