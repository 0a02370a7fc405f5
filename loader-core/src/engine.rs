// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundation.xyz>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Command engine: decode a message, check it against the writable region,
//! run it on the flash and produce the reply bytes.

use embedded_storage::nor_flash::NorFlashError;
use embedded_storage_async::nor_flash::NorFlash;
use heapless::Vec;

use crate::command::{Command, READ_LEN};
use crate::memory::{read_identity_block, MemoryReader, IDENTITY_WORD_COUNT};
use crate::region::{Access, MemoryRegion, CHUNK_SIZE};
use crate::response::{Ack, CommandResult, FlashFailure, Reject};

/// Smallest reply buffer able to hold every fixed size reply.
pub const MIN_RESPONSE_CAPACITY: usize = READ_LEN + CHUNK_SIZE;

/// Flash programming reads its source by words.
#[repr(C, align(4))]
struct AlignedChunk([u8; CHUNK_SIZE]);

pub struct CommandEngine<M> {
    region: MemoryRegion,
    memory: M,
    identity_words: [u32; IDENTITY_WORD_COUNT],
}

impl<M: MemoryReader> CommandEngine<M> {
    pub const fn new(region: MemoryRegion, memory: M, identity_words: [u32; IDENTITY_WORD_COUNT]) -> Self {
        Self {
            region,
            memory,
            identity_words,
        }
    }

    pub fn region(&self) -> &MemoryRegion {
        &self.region
    }

    /// Handle one inbound message and return the reply, stored in `scratch`.
    ///
    /// Every message gets exactly one reply, nothing reaches the flash unless
    /// the command passed validation.
    pub async fn handle<'s, F: NorFlash, const N: usize>(
        &self,
        flash: &mut F,
        message: &[u8],
        scratch: &'s mut Vec<u8, N>,
    ) -> &'s [u8] {
        let result = match Command::decode(message) {
            Ok(command) => {
                trace!("command {:?}", command);
                self.execute(flash, command, N).await
            }
            Err(e) => {
                warn!("rejected message: {:?}", e);
                CommandResult::Reject(e.into())
            }
        };

        if result.encode(scratch).is_err() {
            // Only an echo can outgrow the buffer and it was checked above,
            // fall back on the shortest rejection
            if CommandResult::Reject(Reject::InvalidArgs).encode(scratch).is_err() {
                scratch.clear();
            }
        }
        scratch
    }

    async fn execute<'m, F: NorFlash>(&self, flash: &mut F, command: Command<'m>, capacity: usize) -> CommandResult<'m> {
        match command {
            Command::ErasePage { page } => {
                if let Err(e) = self.region.validate(page, None, Access::Erase) {
                    return CommandResult::Reject(e.into());
                }
                let from = self.region.page_address(page);
                let to = from + self.region.page_size();
                debug!("erase page {} [{:#x}, {:#x})", page, from, to);
                let done = Ack::Erased { page };
                match flash.erase(from, to).await {
                    Ok(()) => CommandResult::Ack(done),
                    Err(e) => flash_failed("erase", e, done),
                }
            }
            Command::WriteChunk { page, chunk, payload } => {
                if let Err(e) = self.region.validate(page, Some(chunk), Access::Write) {
                    return CommandResult::Reject(e.into());
                }
                let address = self.region.chunk_address(page, chunk);
                let staged = AlignedChunk(payload);
                let done = Ack::Written { page, chunk };
                match flash.write(address, &staged.0).await {
                    Ok(()) => CommandResult::Ack(done),
                    Err(e) => flash_failed("write", e, done),
                }
            }
            Command::ReadChunk { page, chunk } => {
                if let Err(e) = self.region.validate(page, Some(chunk), Access::Read) {
                    return CommandResult::Reject(e.into());
                }
                let address = self.region.chunk_address(page, chunk);
                let mut data = [0xFF; CHUNK_SIZE];
                match flash.read(address, &mut data).await {
                    Ok(()) => CommandResult::Ack(Ack::Chunk { page, chunk, data }),
                    Err(e) => flash_failed("read", e, Ack::Chunk { page, chunk, data }),
                }
            }
            Command::DeviceInfo => {
                CommandResult::Ack(Ack::DeviceInfo(read_identity_block(&self.memory, &self.identity_words)))
            }
            Command::Echo { payload } if payload.len() > capacity => {
                warn!("echo of {} bytes exceeds the reply buffer", payload.len());
                CommandResult::Reject(Reject::InvalidArgs)
            }
            Command::Echo { payload } => CommandResult::Ack(Ack::Echo(payload)),
        }
    }
}

fn flash_failed<'m, E: NorFlashError>(operation: &'static str, error: E, done: Ack<'m>) -> CommandResult<'m> {
    let failure = FlashFailure::from(error.kind());
    error!("flash {} failed: {:?}", operation, failure);
    if cfg!(feature = "legacy-flash-ack") {
        CommandResult::Ack(done)
    } else {
        CommandResult::Reject(Reject::FlashError)
    }
}
