use crate::config::{CPU_FREQ_HZ, UART_BAUD};
use avr_device::atmega328p::USART0;
use core::convert::Infallible;

const UBRR: u16 = (CPU_FREQ_HZ / (16 * UART_BAUD) - 1) as u16;
/// UCSR0B transmitter enable
const TXEN0: u8 = 0x08;
/// UCSR0C 8N1
const FRAME_8N1: u8 = 0x06;
/// UCSR0A data register empty
const UDRE0: u8 = 0x20;

/// Polled transmit-only console on USART0.
pub struct Usart0 {
    _private: (),
}

impl Usart0 {
    pub fn new() -> Self {
        unsafe {
            let p = USART0::ptr();
            (*p).ubrr0.write(|w| w.bits(UBRR));
            (*p).ucsr0c.write(|w| w.bits(FRAME_8N1));
            (*p).ucsr0b.write(|w| w.bits(TXEN0));
        }
        Self { _private: () }
    }

    pub fn write_byte(&mut self, byte: u8) {
        unsafe {
            let p = USART0::ptr();
            while (*p).ucsr0a.read().bits() & UDRE0 == 0 {}
            (*p).udr0.write(|w| w.bits(byte));
        }
    }
}

impl Default for Usart0 {
    fn default() -> Self {
        Self::new()
    }
}

impl ufmt::uWrite for Usart0 {
    type Error = Infallible;

    fn write_str(&mut self, s: &str) -> Result<(), Infallible> {
        for byte in s.bytes() {
            self.write_byte(byte);
        }
        Ok(())
    }
}
