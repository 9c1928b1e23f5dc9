//! Bus slave engine
//!
//! The TWI interrupt reports one status code per invocation. `BusEvent::decode`
//! turns it into an event, `transition` decides what the event means for the
//! current state, and `BusEngine` applies the resulting effects to the frame
//! buffers. Only the interrupt handler drives `BusEngine::service`; the main
//! loop reaches the engine through `BusLink`.

use super::packet::{InboundFrame, ReplyFrame};
use super::{FrameError, Result as FrameResult};
use crate::config::{INBOUND_CAPACITY, REPLY_FILL_BYTE};

/// TWI slave status codes (TWSR with the prescaler bits masked off)
pub mod status {
    pub const SRX_ADR_ACK: u8 = 0x60;
    pub const SRX_ADR_ACK_M_ARB_LOST: u8 = 0x68;
    pub const SRX_GEN_ACK: u8 = 0x70;
    pub const SRX_GEN_ACK_M_ARB_LOST: u8 = 0x78;
    pub const SRX_ADR_DATA_ACK: u8 = 0x80;
    pub const SRX_ADR_DATA_NACK: u8 = 0x88;
    pub const SRX_GEN_DATA_ACK: u8 = 0x90;
    pub const SRX_GEN_DATA_NACK: u8 = 0x98;
    pub const SRX_STOP_RESTART: u8 = 0xA0;
    pub const STX_ADR_ACK: u8 = 0xA8;
    pub const STX_ADR_ACK_M_ARB_LOST: u8 = 0xB0;
    pub const STX_DATA_ACK: u8 = 0xB8;
    pub const STX_DATA_NACK: u8 = 0xC0;
    pub const STX_DATA_ACK_LAST_BYTE: u8 = 0xC8;
    pub const NO_STATE: u8 = 0xF8;
    pub const BUS_ERROR: u8 = 0x00;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusState {
    Idle,
    AddressedWrite,
    ReceivingData,
    AddressedRead,
    TransmittingData,
    StopOrRestart,
    BusError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusEvent {
    /// Own address with the write bit, ACK returned
    AddressedWrite,
    /// Data byte received, ACK returned
    DataReceived(u8),
    /// Data byte received, NACK returned
    DataNack,
    /// Own address with the read bit, ACK returned
    AddressedRead,
    /// Master acknowledged the previous byte and clocks out the next
    DataRequested,
    /// Master NACKed, the read transaction is over
    ReadComplete,
    /// Stop or repeated start while addressed
    StopOrRestart,
    /// Illegal start/stop or undefined peripheral state
    BusError,
    Unrecognized(u8),
}

impl BusEvent {
    /// Decodes a masked status code; `data` is the content of TWDR.
    pub fn decode(code: u8, data: u8) -> Self {
        match code {
            status::SRX_ADR_ACK | status::SRX_ADR_ACK_M_ARB_LOST => BusEvent::AddressedWrite,
            status::SRX_ADR_DATA_ACK => BusEvent::DataReceived(data),
            status::SRX_ADR_DATA_NACK | status::SRX_GEN_DATA_NACK => BusEvent::DataNack,
            status::SRX_STOP_RESTART => BusEvent::StopOrRestart,
            status::STX_ADR_ACK | status::STX_ADR_ACK_M_ARB_LOST => BusEvent::AddressedRead,
            status::STX_DATA_ACK => BusEvent::DataRequested,
            status::STX_DATA_NACK | status::STX_DATA_ACK_LAST_BYTE => BusEvent::ReadComplete,
            status::NO_STATE | status::BUS_ERROR => BusEvent::BusError,
            // General call is never enabled, so its codes land here too
            other => BusEvent::Unrecognized(other),
        }
    }
}

/// What happens to the inbound frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rx {
    Keep,
    Restart,
    Store(u8),
}

/// What happens to the reply cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tx {
    Keep,
    /// Rewind to the first reply byte and load it
    Rewind,
    /// Load the byte under the cursor
    Next,
}

/// How the peripheral is handed back before the handler returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Clear the interrupt flag with ACK enabled
    Release,
    /// Release the clock, send STOP and reinitialize the peripheral
    StopAndReinit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Effects {
    pub rx: Rx,
    pub tx: Tx,
    pub busy: Option<bool>,
    pub mark_fresh: bool,
    pub control: Control,
}

impl Effects {
    pub const RELEASE: Effects = Effects {
        rx: Rx::Keep,
        tx: Tx::Keep,
        busy: None,
        mark_fresh: false,
        control: Control::Release,
    };
}

/// Pure transition of the slave state machine.
pub fn transition(state: BusState, event: BusEvent) -> (BusState, Effects) {
    use BusState::*;

    match event {
        BusEvent::AddressedWrite => (
            AddressedWrite,
            Effects {
                rx: Rx::Restart,
                ..Effects::RELEASE
            },
        ),
        BusEvent::DataReceived(byte) => match state {
            AddressedWrite | ReceivingData => (
                ReceivingData,
                Effects {
                    rx: Rx::Store(byte),
                    ..Effects::RELEASE
                },
            ),
            other => (other, Effects::RELEASE),
        },
        BusEvent::DataNack => (state, Effects::RELEASE),
        BusEvent::AddressedRead => (
            AddressedRead,
            Effects {
                tx: Tx::Rewind,
                busy: Some(true),
                ..Effects::RELEASE
            },
        ),
        BusEvent::DataRequested => (
            TransmittingData,
            Effects {
                tx: Tx::Next,
                ..Effects::RELEASE
            },
        ),
        BusEvent::ReadComplete => (
            Idle,
            Effects {
                busy: Some(false),
                ..Effects::RELEASE
            },
        ),
        BusEvent::StopOrRestart => (
            StopOrRestart,
            Effects {
                mark_fresh: matches!(state, AddressedWrite | ReceivingData),
                ..Effects::RELEASE
            },
        ),
        BusEvent::BusError => (
            BusError,
            Effects {
                busy: Some(false),
                control: Control::StopAndReinit,
                ..Effects::RELEASE
            },
        ),
        BusEvent::Unrecognized(_) => (state, Effects::RELEASE),
    }
}

/// What the interrupt handler writes back to the peripheral
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusResponse {
    /// Byte to load into the data register, if any
    pub transmit: Option<u8>,
    pub control: Control,
}

/// Main-loop view of the bus engine.
pub trait BusLink {
    /// Takes the fresh inbound frame, if the interrupt handed one off.
    /// Returns its length, which may be zero, or `Oversized` when bytes were
    /// dropped past the buffer capacity.
    fn take_frame(&mut self, out: &mut [u8; INBOUND_CAPACITY]) -> Option<FrameResult<usize>>;

    /// Installs the reply for the next read transaction and marks it in flight.
    fn set_reply(&mut self, reply: &ReplyFrame);

    /// True while a reply is waiting to be read or being read.
    fn is_busy(&mut self) -> bool;

    fn frame_ready(&mut self) -> bool;
}

/// Interrupt-owned bus context: frame buffers, cursors and hand-off flags.
pub struct BusEngine {
    state: BusState,
    inbound: InboundFrame,
    fresh: bool,
    reply: ReplyFrame,
    tx_cursor: usize,
    busy: bool,
}

impl BusEngine {
    pub const fn new() -> Self {
        Self {
            state: BusState::Idle,
            inbound: InboundFrame::new(),
            fresh: false,
            reply: ReplyFrame::empty(),
            tx_cursor: 0,
            busy: false,
        }
    }

    /// Handles one bus event. Runs in interrupt context and never blocks.
    pub fn service(&mut self, event: BusEvent) -> BusResponse {
        let (next, effects) = transition(self.state, event);
        self.state = next;
        self.apply(effects)
    }

    fn apply(&mut self, effects: Effects) -> BusResponse {
        match effects.rx {
            Rx::Keep => {}
            Rx::Restart => {
                // A new write supersedes a frame the main loop has not taken yet
                self.fresh = false;
                self.inbound.restart();
            }
            Rx::Store(byte) => {
                self.inbound.push(byte);
            }
        }

        let transmit = match effects.tx {
            Tx::Keep => None,
            Tx::Rewind => {
                self.tx_cursor = 0;
                Some(self.next_reply_byte())
            }
            Tx::Next => Some(self.next_reply_byte()),
        };

        if let Some(busy) = effects.busy {
            self.busy = busy;
        }
        if effects.mark_fresh {
            self.fresh = true;
        }

        BusResponse {
            transmit,
            control: effects.control,
        }
    }

    fn next_reply_byte(&mut self) -> u8 {
        match self.reply.get(self.tx_cursor) {
            Some(byte) => {
                self.tx_cursor += 1;
                byte
            }
            None => REPLY_FILL_BYTE,
        }
    }

    pub fn state(&self) -> BusState {
        self.state
    }

}

impl Default for BusEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl BusLink for BusEngine {
    fn take_frame(&mut self, out: &mut [u8; INBOUND_CAPACITY]) -> Option<FrameResult<usize>> {
        if !self.fresh {
            return None;
        }
        self.fresh = false;
        if !self.inbound.is_available() {
            return Some(Err(FrameError::Oversized));
        }
        let bytes = self.inbound.as_bytes();
        out[..bytes.len()].copy_from_slice(bytes);
        Some(Ok(bytes.len()))
    }

    fn set_reply(&mut self, reply: &ReplyFrame) {
        self.reply = *reply;
        self.busy = true;
    }

    fn is_busy(&mut self) -> bool {
        self.busy
    }

    fn frame_ready(&mut self) -> bool {
        self.fresh
    }
}
