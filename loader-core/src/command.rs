// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundation.xyz>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Loader command wire format.
//!
//! Every command is one message, first byte is the ASCII opcode:
//!
//! | opcode | layout                              | length |
//! |--------|-------------------------------------|--------|
//! | `d`    | `d page`                            | 2      |
//! | `w`    | `w page chunk data[16]`             | 19     |
//! | `r`    | `r page chunk`                      | 3      |
//! | `i`    | `i`                                 | 1      |
//! | `e`    | `e payload...`                      | >= 1   |

use core::fmt;

use heapless::Vec;

use crate::region::CHUNK_SIZE;
use crate::response::EncodeError;

pub mod opcode {
    pub const ERASE: u8 = b'd';
    pub const WRITE: u8 = b'w';
    pub const READ: u8 = b'r';
    pub const INFO: u8 = b'i';
    pub const ECHO: u8 = b'e';
}

pub const ERASE_LEN: usize = 2;
pub const WRITE_LEN: usize = 3 + CHUNK_SIZE;
pub const READ_LEN: usize = 3;
pub const INFO_LEN: usize = 1;

/// A decoded loader command, borrowing echo payloads from the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command<'a> {
    /// Erase a whole page
    ErasePage { page: u8 },
    /// Program one chunk of a page
    WriteChunk { page: u8, chunk: u8, payload: [u8; CHUNK_SIZE] },
    /// Read one chunk, counted from the start of a page
    ReadChunk { page: u8, chunk: u8 },
    /// Read the device identity block
    DeviceInfo,
    /// Send the payload back unchanged
    Echo { payload: &'a [u8] },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Zero length message
    Empty,
    /// A known opcode with the wrong message length
    InvalidLength { opcode: u8, len: usize },
    /// The first byte is not an opcode
    UnknownOpcode(u8),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("empty message"),
            Self::InvalidLength { opcode, len } => {
                write!(f, "invalid length {len} for opcode {:?}", *opcode as char)
            }
            Self::UnknownOpcode(opcode) => write!(f, "unknown opcode {opcode:#04x}"),
        }
    }
}

impl<'a> Command<'a> {
    pub fn decode(message: &'a [u8]) -> Result<Self, DecodeError> {
        let (&tag, rest) = message.split_first().ok_or(DecodeError::Empty)?;
        let expect = |len: usize| {
            if message.len() == len {
                Ok(())
            } else {
                Err(DecodeError::InvalidLength {
                    opcode: tag,
                    len: message.len(),
                })
            }
        };

        match tag {
            opcode::ERASE => {
                expect(ERASE_LEN)?;
                Ok(Command::ErasePage { page: rest[0] })
            }
            opcode::WRITE => {
                expect(WRITE_LEN)?;
                let mut payload = [0; CHUNK_SIZE];
                payload.copy_from_slice(&rest[2..]);
                Ok(Command::WriteChunk {
                    page: rest[0],
                    chunk: rest[1],
                    payload,
                })
            }
            opcode::READ => {
                expect(READ_LEN)?;
                Ok(Command::ReadChunk {
                    page: rest[0],
                    chunk: rest[1],
                })
            }
            opcode::INFO => {
                expect(INFO_LEN)?;
                Ok(Command::DeviceInfo)
            }
            opcode::ECHO => Ok(Command::Echo { payload: rest }),
            other => Err(DecodeError::UnknownOpcode(other)),
        }
    }

    pub const fn opcode(&self) -> u8 {
        match self {
            Command::ErasePage { .. } => opcode::ERASE,
            Command::WriteChunk { .. } => opcode::WRITE,
            Command::ReadChunk { .. } => opcode::READ,
            Command::DeviceInfo => opcode::INFO,
            Command::Echo { .. } => opcode::ECHO,
        }
    }

    /// Serialize the command the way a client sends it.
    pub fn encode<const N: usize>(&self, out: &mut Vec<u8, N>) -> Result<(), EncodeError> {
        out.clear();
        out.push(self.opcode()).map_err(|_| EncodeError::Overflow)?;
        let written = match self {
            Command::ErasePage { page } => out.push(*page).map_err(drop),
            Command::WriteChunk { page, chunk, payload } => out
                .extend_from_slice(&[*page, *chunk])
                .and_then(|_| out.extend_from_slice(payload)),
            Command::ReadChunk { page, chunk } => out.extend_from_slice(&[*page, *chunk]),
            Command::DeviceInfo => Ok(()),
            Command::Echo { payload } => out.extend_from_slice(payload),
        };
        written.map_err(|_| EncodeError::Overflow)
    }
}
