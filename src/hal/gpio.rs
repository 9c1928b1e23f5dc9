use avr_device::atmega328p::PORTB;
use core::convert::Infallible;
use embedded_hal::digital::v2::OutputPin;

/// PB4, the pulse output watched by the logic analyzer
const DEBUG_PIN: u8 = 4;

pub struct DebugPin {
    _private: (),
}

impl DebugPin {
    pub fn new() -> Self {
        unsafe {
            (*PORTB::ptr()).ddrb.modify(|r, w| w.bits(r.bits() | (1 << DEBUG_PIN)));
        }
        Self { _private: () }
    }
}

impl Default for DebugPin {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputPin for DebugPin {
    type Error = Infallible;

    #[inline]
    fn set_high(&mut self) -> Result<(), Infallible> {
        unsafe {
            (*PORTB::ptr()).portb.modify(|r, w| w.bits(r.bits() | (1 << DEBUG_PIN)));
        }
        Ok(())
    }

    #[inline]
    fn set_low(&mut self) -> Result<(), Infallible> {
        unsafe {
            (*PORTB::ptr()).portb.modify(|r, w| w.bits(r.bits() & !(1 << DEBUG_PIN)));
        }
        Ok(())
    }
}
