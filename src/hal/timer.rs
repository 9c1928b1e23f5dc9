use crate::config::CPU_FREQ_HZ;
use avr_device::atmega328p::TC0;
use embedded_hal::blocking::delay::{DelayMs, DelayUs};

/// Clock select for clk/64
const PRESCALER_DIV64: u8 = 0x03;
const TICKS_PER_MS: u8 = (CPU_FREQ_HZ / 64 / 1000) as u8;

/// Busy-wait delays on Timer0.
pub struct Delay {
    _private: (),
}

impl Delay {
    pub fn new() -> Self {
        unsafe {
            // Normal mode, stopped
            let p = TC0::ptr();
            (*p).tccr0a.write(|w| w.bits(0));
            (*p).tccr0b.write(|w| w.bits(0));
        }
        Self { _private: () }
    }
}

impl Default for Delay {
    fn default() -> Self {
        Self::new()
    }
}

impl DelayMs<u16> for Delay {
    fn delay_ms(&mut self, ms: u16) {
        unsafe {
            let p = TC0::ptr();
            (*p).tcnt0.write(|w| w.bits(0));
            (*p).tccr0b.write(|w| w.bits(PRESCALER_DIV64));

            for _ in 0..ms {
                while (*p).tcnt0.read().bits() < TICKS_PER_MS {}
                (*p).tcnt0.write(|w| w.bits(0));
            }

            (*p).tccr0b.write(|w| w.bits(0));
        }
    }
}

impl DelayUs<u16> for Delay {
    fn delay_us(&mut self, us: u16) {
        // About 8 cycles per iteration at 8MHz
        for _ in 0..us {
            avr_device::asm::nop();
            avr_device::asm::nop();
            avr_device::asm::nop();
            avr_device::asm::nop();
        }
    }
}
