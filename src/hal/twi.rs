//! TWI slave peripheral and its interrupt handler

use crate::config::INBOUND_CAPACITY;
use crate::protocol::{self, BusEngine, BusEvent, BusLink, BusResponse, Control, ReplyFrame};
use avr_device::atmega328p::TWI as TwiPeripheral;
use avr_device::interrupt::Mutex;
use core::cell::RefCell;

/// TWCR: interrupt flag, enable acknowledge, enable, interrupt enable
const TWCR_RELEASE: u8 = 0x80 | 0x40 | 0x04 | 0x01;
/// TWCR: interrupt flag, stop, enable
const TWCR_STOP: u8 = 0x80 | 0x10 | 0x04;
const TWSR_STATUS_MASK: u8 = 0xF8;

/// Bus context shared between the TWI interrupt and the main loop
static BUS: Mutex<RefCell<BusEngine>> = Mutex::new(RefCell::new(BusEngine::new()));

pub struct TwiSlave;

impl TwiSlave {
    /// Answers to `address` (7-bit) with the interrupt enabled.
    pub fn init(address: u8) {
        unsafe {
            let p = TwiPeripheral::ptr();
            (*p).twar.write(|w| w.bits(address << 1));
            (*p).twcr.write(|w| w.bits(TWCR_RELEASE));
        }
    }

    pub fn disable() {
        unsafe {
            (*TwiPeripheral::ptr()).twcr.write(|w| w.bits(0));
        }
    }

    fn apply(response: BusResponse) {
        unsafe {
            let p = TwiPeripheral::ptr();
            if let Some(byte) = response.transmit {
                (*p).twdr.write(|w| w.bits(byte));
            }
            match response.control {
                Control::Release => (*p).twcr.write(|w| w.bits(TWCR_RELEASE)),
                Control::StopAndReinit => {
                    (*p).twcr.write(|w| w.bits(TWCR_STOP));
                    let address = (*p).twar.read().bits() >> 1;
                    Self::init(address);
                }
            }
        }
    }
}

#[avr_device::interrupt(atmega328p)]
fn TWI() {
    let (code, data) = unsafe {
        let p = TwiPeripheral::ptr();
        ((*p).twsr.read().bits() & TWSR_STATUS_MASK, (*p).twdr.read().bits())
    };
    let response = avr_device::interrupt::free(|cs| {
        BUS.borrow(cs).borrow_mut().service(BusEvent::decode(code, data))
    });
    TwiSlave::apply(response);
}

/// Main-loop handle on the interrupt-owned bus engine.
pub struct SharedBus;

impl BusLink for SharedBus {
    fn take_frame(&mut self, out: &mut [u8; INBOUND_CAPACITY]) -> Option<protocol::Result<usize>> {
        avr_device::interrupt::free(|cs| BUS.borrow(cs).borrow_mut().take_frame(out))
    }

    fn set_reply(&mut self, reply: &ReplyFrame) {
        avr_device::interrupt::free(|cs| BUS.borrow(cs).borrow_mut().set_reply(reply))
    }

    fn is_busy(&mut self) -> bool {
        avr_device::interrupt::free(|cs| BUS.borrow(cs).borrow_mut().is_busy())
    }

    fn frame_ready(&mut self) -> bool {
        avr_device::interrupt::free(|cs| BUS.borrow(cs).borrow_mut().frame_ready())
    }
}
