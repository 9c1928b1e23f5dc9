//! Bootloader main loop
//!
//! Frames are interpreted as soon as the bus engine hands them off. Flash and
//! EEPROM work, and the jump into the application, wait until the reply has
//! been read so a stalled NVM cycle never lands in the middle of a transfer.

pub mod command;
pub mod persisted;
pub mod programmer;

pub use command::{CommandInterpreter, Outcome, Pending};
pub use persisted::PersistedState;
pub use programmer::{CommitOutcome, FlashProgrammer};

use crate::config::APP_ENTRY_WORD;
use crate::drivers::{ConfigStorage, ProgramMemory};
use crate::logger::{Event, Log};
use crate::os::InterruptControl;
use crate::protocol::BusLink;

/// Request to hand control to the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Launch {
    pub entry_word: u16,
}

pub struct Bootloader<M, S, I, L> {
    interpreter: CommandInterpreter,
    programmer: FlashProgrammer<M, S>,
    pending: Pending,
    irq: I,
    log: L,
}

impl<M, S, I, L> Bootloader<M, S, I, L>
where
    M: ProgramMemory,
    S: ConfigStorage,
    I: InterruptControl,
    L: Log,
{
    pub fn new(address: u8, memory: M, storage: S, irq: I, log: L) -> Self {
        Self {
            interpreter: CommandInterpreter::new(address),
            programmer: FlashProgrammer::new(memory, storage),
            pending: Pending::default(),
            irq,
            log,
        }
    }

    /// Runs one pass of the main loop.
    ///
    /// Returns `Some` once a boot has been confirmed, read back by the
    /// requester and re-checked against the persisted record.
    pub fn step<B: BusLink>(&mut self, bus: &mut B) -> Option<Launch> {
        match self
            .interpreter
            .service(bus, &mut self.programmer, &mut self.pending)
        {
            Outcome::Idle => {}
            Outcome::Rejected(err) => self.log.record(Event::FrameRejected(err)),
            Outcome::Executed(opcode) => self.log.record(Event::CommandAccepted { opcode }),
            Outcome::BootRefused => self.log.record(Event::BootRefused),
        }

        if self.pending.commit && !bus.is_busy() {
            self.pending.commit = false;
            self.commit();
        }

        if self.pending.finalize && !bus.is_busy() {
            self.pending.finalize = false;
            match self.programmer.finalize(&mut self.irq) {
                Ok(version) => self.log.record(Event::ImageFinalized { version }),
                Err(err) => self.log.record(Event::NvmFault(err)),
            }
        }

        if self.pending.boot && !bus.is_busy() {
            self.pending.boot = false;
            // A commit since the confirmation may have invalidated the image
            if !self.programmer.persisted().is_valid() {
                self.log.record(Event::BootRefused);
                return None;
            }
            self.log.record(Event::Launching {
                entry_word: APP_ENTRY_WORD,
            });
            return Some(Launch {
                entry_word: APP_ENTRY_WORD,
            });
        }

        None
    }

    fn commit(&mut self) {
        match self.programmer.commit_page(&mut self.irq) {
            Ok(CommitOutcome::Written {
                address,
                vectors_preserved,
            }) => {
                if vectors_preserved {
                    self.log.record(Event::VectorsPreserved);
                }
                self.log.record(Event::PageCommitted { address });
            }
            Ok(CommitOutcome::Refused { address }) => {
                self.log.record(Event::CommitRefused { address })
            }
            Err(err) => self.log.record(Event::NvmFault(err)),
        }
    }

    /// True while a commit, finalize or boot is waiting for the bus.
    pub fn has_deferred_work(&self) -> bool {
        self.pending.any()
    }

    pub fn pending(&self) -> Pending {
        self.pending
    }

    pub fn programmer(&self) -> &FlashProgrammer<M, S> {
        &self.programmer
    }

    pub fn programmer_mut(&mut self) -> &mut FlashProgrammer<M, S> {
        &mut self.programmer
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    pub fn log_mut(&mut self) -> &mut L {
        &mut self.log
    }
}
