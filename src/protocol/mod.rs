//! Bootloader command protocol carried over the two-wire bus
//!
//! A command frame is `[opcode][payload...][xor]` where `xor` is the node
//! address XORed with every preceding byte. Replies are
//! `[address][opcode][...][xor]`; an empty reply means "rejected, resend".

pub mod packet;
pub mod transport;

pub use packet::{InboundFrame, ReplyFrame};
pub use transport::{transition, BusEngine, BusEvent, BusLink, BusResponse, BusState, Control, Effects};

use crate::config::HALF_PAGE_SIZE;

/// Nonce returned in the ping reply
pub const PING_NONCE: u8 = 0x2A;

/// Nonce a requester may append to a boot command. It is not checked: the
/// frame checksum alone authorizes the boot.
pub const BOOT_NONCE: u8 = 0xA2;

/// Bootloader protocol revision reported by `QueryVersion`
pub const BOOTLOADER_VERSION: u8 = 0x01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ufmt::derive::uDebug)]
pub enum FrameError {
    Empty,
    ChecksumMismatch { expected: u8, received: u8 },
    BadLength { opcode: u8, len: u8 },
    /// More bytes arrived than the inbound buffer holds
    Oversized,
    /// High half received before any low half
    OutOfSequence,
    /// A page write arrived while the previous page is still waiting to commit
    CommitPending,
}

pub type Result<T> = core::result::Result<T, FrameError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ufmt::derive::uDebug)]
#[repr(u8)]
pub enum Opcode {
    Ping = 0x40,
    QueryVersion = 0x41,
    QueryAppVersion = 0x42,
    WriteFlashLow = 0x50,
    WriteFlashHigh = 0x51,
    FinalizeImage = 0x55,
    BootApplication = 0x60,
}

impl Opcode {
    /// Payload length the opcode requires, if it is fixed.
    pub fn payload_len(self) -> Option<usize> {
        match self {
            Opcode::WriteFlashLow => Some(1 + HALF_PAGE_SIZE),
            Opcode::WriteFlashHigh => Some(HALF_PAGE_SIZE),
            Opcode::FinalizeImage => Some(2),
            _ => None,
        }
    }
}

impl TryFrom<u8> for Opcode {
    type Error = u8;

    fn try_from(byte: u8) -> core::result::Result<Self, u8> {
        match byte {
            0x40 => Ok(Opcode::Ping),
            0x41 => Ok(Opcode::QueryVersion),
            0x42 => Ok(Opcode::QueryAppVersion),
            0x50 => Ok(Opcode::WriteFlashLow),
            0x51 => Ok(Opcode::WriteFlashHigh),
            0x55 => Ok(Opcode::FinalizeImage),
            0x60 => Ok(Opcode::BootApplication),
            other => Err(other),
        }
    }
}

/// XOR checksum over `bytes`, seeded with `seed` (the node address).
pub fn xor_checksum(seed: u8, bytes: &[u8]) -> u8 {
    bytes.iter().fold(seed, |acc, &byte| acc ^ byte)
}

/// A received frame whose checksum has been verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandFrame<'a> {
    pub opcode: u8,
    pub payload: &'a [u8],
    pub checksum: u8,
}

impl<'a> CommandFrame<'a> {
    /// Validates `bytes` (checksum included) against the node address.
    pub fn parse(address: u8, bytes: &'a [u8]) -> Result<Self> {
        let (&received, body) = bytes.split_last().ok_or(FrameError::Empty)?;
        let expected = xor_checksum(address, body);
        if expected != received {
            return Err(FrameError::ChecksumMismatch { expected, received });
        }

        // A lone checksum byte passes validation and is dispatched on itself
        let (opcode, payload) = match body.split_first() {
            Some((&opcode, payload)) => (opcode, payload),
            None => (received, body),
        };

        if let Ok(op) = Opcode::try_from(opcode) {
            if let Some(len) = op.payload_len() {
                if payload.len() != len {
                    return Err(FrameError::BadLength {
                        opcode,
                        len: bytes.len() as u8,
                    });
                }
            }
        }

        Ok(Self {
            opcode,
            payload,
            checksum: received,
        })
    }

    pub fn command(&self) -> core::result::Result<Opcode, u8> {
        Opcode::try_from(self.opcode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_is_seeded_with_address() {
        assert_eq!(xor_checksum(0x35, &[]), 0x35);
        assert_eq!(xor_checksum(0x35, &[0x40]), 0x35 ^ 0x40);
        assert_eq!(xor_checksum(0x68, &[0x55, 0x01, 0x02]), 0x68 ^ 0x55 ^ 0x01 ^ 0x02);
    }

    #[test]
    fn parse_accepts_valid_ping() {
        let bytes = [0x40, 0x35 ^ 0x40];
        let frame = CommandFrame::parse(0x35, &bytes).unwrap();
        assert_eq!(frame.command(), Ok(Opcode::Ping));
        assert!(frame.payload.is_empty());
        assert_eq!(frame.checksum, 0x75);
    }

    #[test]
    fn parse_rejects_wrong_address_seed() {
        let bytes = [0x40, 0x35 ^ 0x40];
        assert_eq!(
            CommandFrame::parse(0x36, &bytes),
            Err(FrameError::ChecksumMismatch {
                expected: 0x36 ^ 0x40,
                received: 0x75
            })
        );
    }

    #[test]
    fn parse_rejects_empty_frame() {
        assert_eq!(CommandFrame::parse(0x35, &[]), Err(FrameError::Empty));
    }

    #[test]
    fn parse_rejects_short_payload_commands() {
        let mut bytes = [0x55, 0x01, 0x00];
        bytes[2] = xor_checksum(0x35, &bytes[..2]);
        assert_eq!(
            CommandFrame::parse(0x35, &bytes),
            Err(FrameError::BadLength { opcode: 0x55, len: 3 })
        );
    }

    #[test]
    fn single_byte_frame_dispatches_on_itself() {
        let bytes = [0x35];
        let frame = CommandFrame::parse(0x35, &bytes).unwrap();
        assert_eq!(frame.opcode, 0x35);
        assert_eq!(frame.command(), Err(0x35));
    }

    #[test]
    fn unknown_opcodes_keep_their_payload() {
        let mut bytes = [0x7E, 0x01, 0x02, 0x00];
        bytes[3] = xor_checksum(0x35, &bytes[..3]);
        let frame = CommandFrame::parse(0x35, &bytes).unwrap();
        assert_eq!(frame.command(), Err(0x7E));
        assert_eq!(frame.payload, &[0x01, 0x02]);
    }
}
