//! Diagnostic event log
//!
//! The bootloader reports what it does as `Event`s. On the node they become
//! pulse trains on the debug pin, or text lines on the serial console when the
//! `debug` feature is enabled.

use crate::drivers::NvmError;
use crate::protocol::FrameError;
use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::digital::v2::OutputPin;
use ufmt::derive::uDebug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, uDebug)]
pub enum Event {
    Started { reset_cause: u8 },
    FrameRejected(FrameError),
    CommandAccepted { opcode: u8 },
    BootRefused,
    PageCommitted { address: u16 },
    CommitRefused { address: u16 },
    VectorsPreserved,
    ImageFinalized { version: u16 },
    Launching { entry_word: u16 },
    NvmFault(NvmError),
}

impl Event {
    /// Number of pulses emitted for this event on the debug pin.
    pub fn pulse_count(&self) -> u8 {
        match self {
            Event::Started { .. } => 0,
            Event::CommandAccepted { opcode: 0x50 } => 1,
            Event::CommandAccepted { opcode: 0x51 } => 2,
            Event::CommandAccepted { .. } => 0,
            Event::PageCommitted { .. } => 3,
            Event::ImageFinalized { .. } => 4,
            Event::CommitRefused { .. } => 5,
            Event::VectorsPreserved => 6,
            Event::Launching { .. } => 7,
            Event::FrameRejected(_) => 8,
            Event::BootRefused => 9,
            Event::NvmFault(_) => 11,
        }
    }
}

pub trait Log {
    fn record(&mut self, event: Event);
}

impl Log for () {
    fn record(&mut self, _event: Event) {}
}

/// Pulses the debug pin once per unit of `Event::pulse_count`.
pub struct PulseLog<P, D> {
    pin: P,
    delay: D,
}

impl<P, D> PulseLog<P, D>
where
    P: OutputPin,
    D: DelayUs<u16>,
{
    pub fn new(mut pin: P, delay: D) -> Self {
        pin.set_low().ok();
        Self { pin, delay }
    }

    pub fn pulse(&mut self, count: u8) {
        for _ in 0..count {
            self.pin.set_high().ok();
            self.delay.delay_us(1);
            self.pin.set_low().ok();
            self.delay.delay_us(1);
        }
    }

    pub fn release(self) -> (P, D) {
        (self.pin, self.delay)
    }
}

impl<P, D> Log for PulseLog<P, D>
where
    P: OutputPin,
    D: DelayUs<u16>,
{
    fn record(&mut self, event: Event) {
        self.pulse(event.pulse_count());
    }
}

/// Writes one line per event to a `ufmt` sink.
pub struct ConsoleLog<W> {
    writer: W,
}

impl<W: ufmt::uWrite> ConsoleLog<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }
}

impl<W: ufmt::uWrite> Log for ConsoleLog<W> {
    fn record(&mut self, event: Event) {
        ufmt::uwriteln!(self.writer, "[boot] {:?}", event).ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::delay::MockNoop;
    use embedded_hal_mock::pin::{Mock as PinMock, State as PinState, Transaction as PinTransaction};

    struct Line(String);

    impl ufmt::uWrite for Line {
        type Error = core::convert::Infallible;

        fn write_str(&mut self, s: &str) -> Result<(), Self::Error> {
            self.0.push_str(s);
            Ok(())
        }
    }

    fn pulses(count: usize) -> Vec<PinTransaction> {
        let mut expected = vec![PinTransaction::set(PinState::Low)];
        for _ in 0..count {
            expected.push(PinTransaction::set(PinState::High));
            expected.push(PinTransaction::set(PinState::Low));
        }
        expected
    }

    #[test]
    fn commit_emits_three_pulses() {
        let pin = PinMock::new(&pulses(3));
        let mut log = PulseLog::new(pin, MockNoop::new());
        log.record(Event::PageCommitted { address: 0x0080 });
        let (mut pin, _) = log.release();
        pin.done();
    }

    #[test]
    fn silent_events_leave_pin_low() {
        let pin = PinMock::new(&pulses(0));
        let mut log = PulseLog::new(pin, MockNoop::new());
        log.record(Event::CommandAccepted { opcode: 0x40 });
        log.record(Event::Started { reset_cause: 0x01 });
        let (mut pin, _) = log.release();
        pin.done();
    }

    #[test]
    fn rejected_frame_emits_eight_pulses() {
        let pin = PinMock::new(&pulses(8));
        let mut log = PulseLog::new(pin, MockNoop::new());
        log.record(Event::FrameRejected(FrameError::Empty));
        let (mut pin, _) = log.release();
        pin.done();
    }

    #[test]
    fn console_formats_event_lines() {
        let mut log = ConsoleLog::new(Line(String::new()));
        log.record(Event::BootRefused);
        log.record(Event::ImageFinalized { version: 258 });
        let text = &log.writer().0;
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "[boot] BootRefused");
        assert!(lines[1].starts_with("[boot] ImageFinalized"));
        assert!(lines[1].contains("258"));
    }
}
