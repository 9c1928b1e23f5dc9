//! Command interpretation for frames handed off by the bus engine

use super::programmer::FlashProgrammer;
use crate::config::INBOUND_CAPACITY;
use crate::drivers::{ConfigStorage, ProgramMemory};
use crate::protocol::{
    BusLink, CommandFrame, FrameError, Opcode, ReplyFrame, BOOTLOADER_VERSION, PING_NONCE,
};

/// Work deferred to the main loop until the bus has gone quiet.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Pending {
    pub commit: bool,
    pub finalize: bool,
    pub boot: bool,
}

impl Pending {
    pub fn any(&self) -> bool {
        self.commit || self.finalize || self.boot
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No frame was waiting
    Idle,
    Rejected(FrameError),
    Executed(u8),
    BootRefused,
}

pub struct CommandInterpreter {
    address: u8,
    frame: [u8; INBOUND_CAPACITY],
}

impl CommandInterpreter {
    pub const fn new(address: u8) -> Self {
        Self {
            address,
            frame: [0; INBOUND_CAPACITY],
        }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Consumes the fresh frame, if any, and installs its reply.
    ///
    /// Taking the frame clears the ready flag, so each frame is acted on once.
    pub fn service<B, M, S>(
        &mut self,
        bus: &mut B,
        programmer: &mut FlashProgrammer<M, S>,
        pending: &mut Pending,
    ) -> Outcome
    where
        B: BusLink,
        M: ProgramMemory,
        S: ConfigStorage,
    {
        let len = match bus.take_frame(&mut self.frame) {
            Some(Ok(len)) if len > 0 => len,
            Some(Err(err)) => {
                bus.set_reply(&ReplyFrame::empty());
                return Outcome::Rejected(err);
            }
            _ => return Outcome::Idle,
        };

        let (reply, outcome) = dispatch(self.address, &self.frame[..len], programmer, pending);
        bus.set_reply(&reply);
        outcome
    }
}

/// Validates one frame and executes it. Rejections produce an empty reply
/// and leave the programmer and pending flags untouched.
pub fn dispatch<M, S>(
    address: u8,
    bytes: &[u8],
    programmer: &mut FlashProgrammer<M, S>,
    pending: &mut Pending,
) -> (ReplyFrame, Outcome)
where
    M: ProgramMemory,
    S: ConfigStorage,
{
    let frame = match CommandFrame::parse(address, bytes) {
        Ok(frame) => frame,
        Err(err) => return (ReplyFrame::empty(), Outcome::Rejected(err)),
    };

    let xor = frame.checksum;
    let mut reply = ReplyFrame::empty();
    reply.push(address);

    let op = match frame.command() {
        Ok(op) => op,
        Err(opcode) => {
            reply.push(xor);
            return (reply, Outcome::Executed(opcode));
        }
    };
    reply.push(op as u8);

    match op {
        Opcode::Ping => {
            reply.push(PING_NONCE);
        }
        Opcode::QueryVersion => {
            reply.push(BOOTLOADER_VERSION);
        }
        Opcode::QueryAppVersion => {
            let [hi, lo] = programmer.persisted().app_version.to_be_bytes();
            reply.push(hi).push(lo);
        }
        // The page buffer belongs to the pending commit until it runs
        Opcode::WriteFlashLow | Opcode::WriteFlashHigh if pending.commit => {
            return (ReplyFrame::empty(), Outcome::Rejected(FrameError::CommitPending));
        }
        Opcode::WriteFlashLow => {
            programmer.load_low(frame.payload[0], &frame.payload[1..]);
        }
        Opcode::WriteFlashHigh => {
            if !programmer.load_high(frame.payload) {
                return (ReplyFrame::empty(), Outcome::Rejected(FrameError::OutOfSequence));
            }
            pending.commit = true;
        }
        Opcode::FinalizeImage => {
            let version = u16::from_be_bytes([frame.payload[0], frame.payload[1]]);
            programmer.stage_version(version);
            pending.finalize = true;
        }
        Opcode::BootApplication => {
            // Any trailing nonce is ignored; the checksum authorizes the boot
            if !programmer.persisted().is_valid() {
                return (ReplyFrame::empty(), Outcome::BootRefused);
            }
            pending.boot = true;
        }
    }

    reply.push(xor);
    (reply, Outcome::Executed(op as u8))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootloader::persisted::PersistedState;
    use crate::config::HALF_PAGE_SIZE;
    use crate::protocol::{xor_checksum, BusEngine};
    use crate::testing::{frame, master_read, master_write, FakeEeprom, FakeFlash};

    const ADDR: u8 = 0x35;

    fn programmer() -> FlashProgrammer<FakeFlash, FakeEeprom> {
        FlashProgrammer::new(FakeFlash::new(), FakeEeprom::new())
    }

    fn run(bytes: &[u8], prog: &mut FlashProgrammer<FakeFlash, FakeEeprom>, pending: &mut Pending) -> (ReplyFrame, Outcome) {
        let mut buf = [0u8; INBOUND_CAPACITY];
        let len = frame(ADDR, bytes, &mut buf);
        dispatch(ADDR, &buf[..len], prog, pending)
    }

    #[test]
    fn ping_echoes_nonce_and_checksum() {
        let mut prog = programmer();
        let mut pending = Pending::default();
        let (reply, outcome) = run(&[0x40], &mut prog, &mut pending);
        assert_eq!(reply.as_bytes(), &[ADDR, 0x40, PING_NONCE, ADDR ^ 0x40]);
        assert_eq!(outcome, Outcome::Executed(0x40));
        assert!(!pending.any());
    }

    #[test]
    fn version_query_reports_protocol_revision() {
        let mut prog = programmer();
        let mut pending = Pending::default();
        let (reply, _) = run(&[0x41], &mut prog, &mut pending);
        assert_eq!(reply.as_bytes(), &[ADDR, 0x41, BOOTLOADER_VERSION, ADDR ^ 0x41]);
    }

    #[test]
    fn app_version_query_reads_persisted_record() {
        let mut prog = programmer();
        PersistedState::finalize(prog.storage_mut(), 0x0304).unwrap();
        let mut pending = Pending::default();
        let (reply, _) = run(&[0x42], &mut prog, &mut pending);
        assert_eq!(reply.as_bytes(), &[ADDR, 0x42, 0x03, 0x04, ADDR ^ 0x42]);
    }

    #[test]
    fn unknown_opcode_gets_two_byte_reply() {
        let mut prog = programmer();
        let mut pending = Pending::default();
        let (reply, outcome) = run(&[0x7E, 0x01], &mut prog, &mut pending);
        assert_eq!(reply.as_bytes(), &[ADDR, xor_checksum(ADDR, &[0x7E, 0x01])]);
        assert_eq!(outcome, Outcome::Executed(0x7E));
    }

    #[test]
    fn corrupted_frame_is_rejected_without_side_effects() {
        let mut prog = programmer();
        let mut pending = Pending::default();
        let mut bytes = [0u8; 1 + HALF_PAGE_SIZE + 1];
        bytes[0] = 0x51;
        bytes[HALF_PAGE_SIZE + 1] = xor_checksum(ADDR, &bytes[..HALF_PAGE_SIZE + 1]);
        bytes[10] ^= 0x01;

        let (reply, outcome) = dispatch(ADDR, &bytes, &mut prog, &mut pending);
        assert!(reply.is_empty());
        assert!(matches!(outcome, Outcome::Rejected(FrameError::ChecksumMismatch { .. })));
        assert_eq!(pending, Pending::default());
    }

    #[test]
    fn high_half_sets_commit_pending() {
        let mut prog = programmer();
        let mut pending = Pending::default();
        let mut low = [0x11u8; 1 + HALF_PAGE_SIZE + 1];
        low[0] = 0x50;
        low[1] = 2;
        run(&low[..1 + 1 + HALF_PAGE_SIZE], &mut prog, &mut pending);
        assert!(!pending.commit);

        let mut high = [0x22u8; 1 + HALF_PAGE_SIZE];
        high[0] = 0x51;
        let (reply, _) = run(&high, &mut prog, &mut pending);
        assert_eq!(reply.len(), 3);
        assert!(pending.commit);
        assert_eq!(prog.page().target(), 2 * 128);
    }

    #[test]
    fn high_half_without_low_is_rejected() {
        let mut prog = programmer();
        let mut pending = Pending::default();
        let mut high = [0x22u8; 1 + HALF_PAGE_SIZE];
        high[0] = 0x51;
        let (reply, outcome) = run(&high, &mut prog, &mut pending);
        assert!(reply.is_empty());
        assert_eq!(outcome, Outcome::Rejected(FrameError::OutOfSequence));
        assert!(!pending.commit);
    }

    #[test]
    fn page_writes_wait_for_pending_commit() {
        let mut prog = programmer();
        let mut pending = Pending::default();
        let mut low = [0x11u8; 2 + HALF_PAGE_SIZE];
        low[0] = 0x50;
        low[1] = 2;
        run(&low, &mut prog, &mut pending);
        let mut high = [0x22u8; 1 + HALF_PAGE_SIZE];
        high[0] = 0x51;
        run(&high, &mut prog, &mut pending);
        assert!(pending.commit);

        low[1] = 3;
        let (reply, outcome) = run(&low, &mut prog, &mut pending);
        assert!(reply.is_empty());
        assert_eq!(outcome, Outcome::Rejected(FrameError::CommitPending));
        let (reply, _) = run(&high, &mut prog, &mut pending);
        assert!(reply.is_empty());

        assert_eq!(prog.page().target(), 2 * 128);
        assert!(prog.page().data()[HALF_PAGE_SIZE..].iter().all(|&b| b == 0x22));
    }

    #[test]
    fn oversized_write_is_rejected_at_handoff() {
        let mut engine = BusEngine::new();
        let mut prog = programmer();
        let mut pending = Pending::default();
        let mut interp = CommandInterpreter::new(ADDR);

        // The first INBOUND_CAPACITY bytes alone are a valid ping
        let mut bytes = [0u8; INBOUND_CAPACITY + 5];
        bytes[0] = 0x40;
        bytes[INBOUND_CAPACITY - 1] = xor_checksum(ADDR, &bytes[..INBOUND_CAPACITY - 1]);
        master_write(&mut engine, &bytes);

        assert_eq!(
            interp.service(&mut engine, &mut prog, &mut pending),
            Outcome::Rejected(FrameError::Oversized)
        );
        assert_eq!(master_read::<4>(&mut engine), [0xFF; 4]);
    }

    #[test]
    fn finalize_stages_big_endian_version() {
        let mut prog = programmer();
        let mut pending = Pending::default();
        let (reply, _) = run(&[0x55, 0x01, 0x02], &mut prog, &mut pending);
        assert_eq!(reply.as_bytes(), &[ADDR, 0x55, xor_checksum(ADDR, &[0x55, 0x01, 0x02])]);
        assert_eq!(prog.pending_version(), 0x0102);
        assert!(pending.finalize);
    }

    #[test]
    fn boot_without_valid_image_is_refused() {
        let mut prog = programmer();
        let mut pending = Pending::default();
        let (reply, outcome) = run(&[0x60], &mut prog, &mut pending);
        assert!(reply.is_empty());
        assert_eq!(outcome, Outcome::BootRefused);
        assert!(!pending.boot);
    }

    #[test]
    fn boot_with_valid_image_is_confirmed() {
        let mut prog = programmer();
        PersistedState::finalize(prog.storage_mut(), 1).unwrap();
        let mut pending = Pending::default();
        let (reply, _) = run(&[0x60, 0xA2], &mut prog, &mut pending);
        assert_eq!(reply.as_bytes(), &[ADDR, 0x60, xor_checksum(ADDR, &[0x60, 0xA2])]);
        assert!(pending.boot);
    }

    #[test]
    fn service_consumes_frame_once() {
        let mut engine = BusEngine::new();
        let mut prog = programmer();
        let mut pending = Pending::default();
        let mut interp = CommandInterpreter::new(ADDR);

        master_write(&mut engine, &[0x40, ADDR ^ 0x40]);
        assert_eq!(interp.service(&mut engine, &mut prog, &mut pending), Outcome::Executed(0x40));
        assert_eq!(interp.service(&mut engine, &mut prog, &mut pending), Outcome::Idle);
        assert_eq!(master_read::<4>(&mut engine), [ADDR, 0x40, PING_NONCE, ADDR ^ 0x40]);
    }

    #[test]
    fn empty_write_is_ignored() {
        let mut engine = BusEngine::new();
        let mut prog = programmer();
        let mut pending = Pending::default();
        let mut interp = CommandInterpreter::new(ADDR);

        master_write(&mut engine, &[]);
        assert_eq!(interp.service(&mut engine, &mut prog, &mut pending), Outcome::Idle);
        assert!(!engine.frame_ready());
    }
}
