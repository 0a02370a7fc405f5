// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundation.xyz>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Loader replies.
//!
//! Successful commands echo their header followed by a result:
//!
//! | command        | reply                       |
//! |----------------|-----------------------------|
//! | erase          | `d page O K`                |
//! | write          | `w page chunk O K`          |
//! | read           | `r page chunk data[16]`     |
//! | device info    | `i identity[12]`            |
//! | echo           | the payload, byte for byte  |
//!
//! Refused commands get one of the ASCII [`Reject`] texts instead.

use core::fmt;

use embedded_storage::nor_flash::NorFlashErrorKind;
use heapless::Vec;

use crate::command::{opcode, Command, READ_LEN};
use crate::memory::IDENTITY_LEN;
use crate::region::{ValidationError, CHUNK_SIZE};
use crate::DecodeError;

/// Suffix of erase and write acknowledgements.
pub const OK: &[u8] = b"OK";

/// The output buffer is too small for the reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EncodeError {
    Overflow,
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("reply does not fit the output buffer")
    }
}

/// A command that was executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Ack<'a> {
    Erased { page: u8 },
    Written { page: u8, chunk: u8 },
    Chunk { page: u8, chunk: u8, data: [u8; CHUNK_SIZE] },
    DeviceInfo([u8; IDENTITY_LEN]),
    Echo(&'a [u8]),
}

/// A command that was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Reject {
    /// Wrong message length, or an echo too large to send back
    InvalidArgs,
    /// Page outside the writable region
    InvalidPage,
    /// Chunk outside the allowed window
    InvalidChunk,
    /// Empty message or unknown opcode
    UnknownCommand,
    /// The flash driver reported a failure
    FlashError,
}

impl Reject {
    const ALL: [Reject; 5] = [
        Reject::InvalidArgs,
        Reject::InvalidPage,
        Reject::InvalidChunk,
        Reject::UnknownCommand,
        Reject::FlashError,
    ];

    /// Reply bytes sent for this rejection.
    pub const fn text(self) -> &'static [u8] {
        match self {
            Reject::InvalidArgs => b"! invalid args",
            Reject::InvalidPage => b"! invalid page",
            Reject::InvalidChunk => b"! invalid chunk",
            Reject::UnknownCommand => b"! Unknown Cmd",
            Reject::FlashError => b"! flash error",
        }
    }

    pub fn from_text(text: &[u8]) -> Option<Self> {
        Self::ALL.into_iter().find(|reject| reject.text() == text)
    }
}

impl fmt::Display for Reject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The texts are plain ASCII
        f.write_str(core::str::from_utf8(self.text()).unwrap_or("!"))
    }
}

impl From<ValidationError> for Reject {
    fn from(error: ValidationError) -> Self {
        match error {
            ValidationError::InvalidLength => Reject::InvalidArgs,
            ValidationError::PageOutOfRange => Reject::InvalidPage,
            ValidationError::ChunkOutOfRange => Reject::InvalidChunk,
        }
    }
}

impl From<DecodeError> for Reject {
    fn from(error: DecodeError) -> Self {
        match error {
            DecodeError::InvalidLength { .. } => Reject::InvalidArgs,
            DecodeError::Empty | DecodeError::UnknownOpcode(_) => Reject::UnknownCommand,
        }
    }
}

/// Flash driver failures, as reported in the logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashFailure {
    NotAligned,
    OutOfBounds,
    Other,
}

impl From<NorFlashErrorKind> for FlashFailure {
    fn from(kind: NorFlashErrorKind) -> Self {
        match kind {
            NorFlashErrorKind::NotAligned => FlashFailure::NotAligned,
            NorFlashErrorKind::OutOfBounds => FlashFailure::OutOfBounds,
            _ => FlashFailure::Other,
        }
    }
}

/// Outcome of one command, on either side of the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandResult<'a> {
    Ack(Ack<'a>),
    Reject(Reject),
}

/// A reply that does not answer the request it was matched with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReplyError {
    /// Wrong length for the request's reply
    Malformed,
    /// The reply header names another opcode, page or chunk
    Mismatch,
}

impl fmt::Display for ReplyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplyError::Malformed => f.write_str("malformed reply"),
            ReplyError::Mismatch => f.write_str("reply does not match the request"),
        }
    }
}

impl<'a> CommandResult<'a> {
    /// Serialize the reply into `out`, replacing its content.
    pub fn encode<const N: usize>(&self, out: &mut Vec<u8, N>) -> Result<(), EncodeError> {
        out.clear();
        let written = match self {
            CommandResult::Reject(reject) => out.extend_from_slice(reject.text()),
            CommandResult::Ack(Ack::Erased { page }) => out
                .extend_from_slice(&[opcode::ERASE, *page])
                .and_then(|_| out.extend_from_slice(OK)),
            CommandResult::Ack(Ack::Written { page, chunk }) => out
                .extend_from_slice(&[opcode::WRITE, *page, *chunk])
                .and_then(|_| out.extend_from_slice(OK)),
            CommandResult::Ack(Ack::Chunk { page, chunk, data }) => out
                .extend_from_slice(&[opcode::READ, *page, *chunk])
                .and_then(|_| out.extend_from_slice(data)),
            CommandResult::Ack(Ack::DeviceInfo(identity)) => out
                .push(opcode::INFO)
                .map_err(drop)
                .and_then(|_| out.extend_from_slice(identity)),
            CommandResult::Ack(Ack::Echo(payload)) => out.extend_from_slice(payload),
        };
        written.map_err(|_| EncodeError::Overflow)
    }

    /// Interpret `reply` as the answer to `request`.
    pub fn parse(request: &Command<'_>, reply: &'a [u8]) -> Result<Self, ReplyError> {
        // An echo of a rejection text is still an echo
        if let Command::Echo { payload } = request {
            if *payload == reply {
                return Ok(CommandResult::Ack(Ack::Echo(reply)));
            }
        }
        if let Some(reject) = Reject::from_text(reply) {
            return Ok(CommandResult::Reject(reject));
        }

        let ack = match *request {
            Command::ErasePage { page } => {
                expect_header(reply, &[opcode::ERASE, page], OK.len())?;
                if &reply[2..] != OK {
                    return Err(ReplyError::Malformed);
                }
                Ack::Erased { page }
            }
            Command::WriteChunk { page, chunk, .. } => {
                expect_header(reply, &[opcode::WRITE, page, chunk], OK.len())?;
                if &reply[3..] != OK {
                    return Err(ReplyError::Malformed);
                }
                Ack::Written { page, chunk }
            }
            Command::ReadChunk { page, chunk } => {
                expect_header(reply, &[opcode::READ, page, chunk], CHUNK_SIZE)?;
                let mut data = [0; CHUNK_SIZE];
                data.copy_from_slice(&reply[READ_LEN..]);
                Ack::Chunk { page, chunk, data }
            }
            Command::DeviceInfo => {
                expect_header(reply, &[opcode::INFO], IDENTITY_LEN)?;
                let mut identity = [0; IDENTITY_LEN];
                identity.copy_from_slice(&reply[1..]);
                Ack::DeviceInfo(identity)
            }
            Command::Echo { .. } => return Err(ReplyError::Mismatch),
        };
        Ok(CommandResult::Ack(ack))
    }
}

fn expect_header(reply: &[u8], header: &[u8], body_len: usize) -> Result<(), ReplyError> {
    if !reply.starts_with(&header[..1]) {
        return Err(ReplyError::Mismatch);
    }
    if reply.len() != header.len() + body_len {
        return Err(ReplyError::Malformed);
    }
    if !reply.starts_with(header) {
        return Err(ReplyError::Mismatch);
    }
    Ok(())
}
