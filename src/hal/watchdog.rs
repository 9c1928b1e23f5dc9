use avr_device::atmega328p::{CPU, WDT};

/// Watchdog change enable and enable bits of WDTCSR
const WDCE_WDE: u8 = 0x18;

pub struct Watchdog {
    _private: (),
}

impl Watchdog {
    #[inline]
    pub fn new() -> Self {
        Self { _private: () }
    }

    /// Reads and clears MCUSR. WDRF must be clear before the watchdog can be
    /// turned off, or a watchdog reset would keep the node resetting.
    pub fn take_reset_cause(&mut self) -> u8 {
        unsafe {
            let p = CPU::ptr();
            let cause = (*p).mcusr.read().bits();
            (*p).mcusr.write(|w| w.bits(0));
            cause
        }
    }

    #[inline]
    pub fn disable(&mut self) {
        unsafe {
            let p = WDT::ptr();
            // Timed sequence to disable watchdog
            (*p).wdtcsr.write(|w| w.bits(WDCE_WDE));
            (*p).wdtcsr.write(|w| w.bits(0x00));
        }
    }
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new()
    }
}
