// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundation.xyz>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Loader commands on top of a request/reply transport.

use crate::image::{checksum, FirmwareImage, ImageError};
use consts::MAX_MESSAGE_SIZE;
use loader_core::{Ack, Command, CommandResult, MemoryRegion, Reject, ReplyError, CHUNK_SIZE, IDENTITY_LEN};
use log::{debug, info};
use std::error::Error;
use std::fmt;

/// Sends one message and waits for the single reply it gets.
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn request(&mut self, message: &[u8]) -> Result<Vec<u8>, Box<dyn Error>>;
}

#[derive(Debug)]
pub enum ClientError {
    Transport(Box<dyn Error>),
    Encode,
    Reply { opcode: char, error: ReplyError },
    Rejected { opcode: char, reject: Reject },
    Unexpected { opcode: char },
    Image(ImageError),
    Verify { expected: u32, actual: u32 },
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport error: {e}"),
            Self::Encode => f.write_str("command does not fit in one message"),
            Self::Reply { opcode, error } => write!(f, "'{opcode}' command: {error}"),
            Self::Rejected { opcode, reject } => write!(f, "'{opcode}' command rejected: {reject}"),
            Self::Unexpected { opcode } => write!(f, "'{opcode}' command: unexpected reply"),
            Self::Image(e) => write!(f, "{e}"),
            Self::Verify { expected, actual } => {
                write!(f, "read back CRC {actual:#010x} does not match image CRC {expected:#010x}")
            }
        }
    }
}

impl Error for ClientError {}

impl From<ImageError> for ClientError {
    fn from(error: ImageError) -> Self {
        Self::Image(error)
    }
}

pub struct Client<T> {
    transport: T,
    region: MemoryRegion,
}

impl<T: Transport> Client<T> {
    pub fn new(transport: T, region: MemoryRegion) -> Self {
        Self { transport, region }
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    async fn transact<R>(
        &mut self,
        command: Command<'_>,
        pick: impl FnOnce(Ack<'_>) -> Option<R>,
    ) -> Result<R, ClientError> {
        let opcode = command.opcode() as char;
        let mut message: heapless::Vec<u8, MAX_MESSAGE_SIZE> = heapless::Vec::new();
        command.encode(&mut message).map_err(|_| ClientError::Encode)?;

        let reply = self.transport.request(&message).await.map_err(ClientError::Transport)?;
        debug!("'{}' -> {} bytes", opcode, reply.len());
        match CommandResult::parse(&command, &reply).map_err(|error| ClientError::Reply { opcode, error })? {
            CommandResult::Ack(ack) => pick(ack).ok_or(ClientError::Unexpected { opcode }),
            CommandResult::Reject(reject) => Err(ClientError::Rejected { opcode, reject }),
        }
    }

    pub async fn erase_page(&mut self, page: u8) -> Result<(), ClientError> {
        self.transact(Command::ErasePage { page }, |ack| matches!(ack, Ack::Erased { .. }).then_some(()))
            .await
    }

    pub async fn write_chunk(&mut self, page: u8, chunk: u8, payload: [u8; CHUNK_SIZE]) -> Result<(), ClientError> {
        self.transact(Command::WriteChunk { page, chunk, payload }, |ack| {
            matches!(ack, Ack::Written { .. }).then_some(())
        })
        .await
    }

    pub async fn read_chunk(&mut self, page: u8, chunk: u8) -> Result<[u8; CHUNK_SIZE], ClientError> {
        self.transact(Command::ReadChunk { page, chunk }, |ack| match ack {
            Ack::Chunk { data, .. } => Some(data),
            _ => None,
        })
        .await
    }

    pub async fn device_info(&mut self) -> Result<[u8; IDENTITY_LEN], ClientError> {
        self.transact(Command::DeviceInfo, |ack| match ack {
            Ack::DeviceInfo(identity) => Some(identity),
            _ => None,
        })
        .await
    }

    pub async fn echo(&mut self, payload: &[u8]) -> Result<Vec<u8>, ClientError> {
        self.transact(Command::Echo { payload }, |ack| match ack {
            Ack::Echo(data) => Some(data.to_vec()),
            _ => None,
        })
        .await
    }

    /// Read every chunk of one page.
    pub async fn dump_page(&mut self, page: u8) -> Result<Vec<u8>, ClientError> {
        let mut bytes = Vec::with_capacity(self.region.page_size() as usize);
        for chunk in 0..self.region.chunks_per_page() {
            bytes.extend_from_slice(&self.read_chunk(page, chunk as u8).await?);
        }
        Ok(bytes)
    }

    /// Erase, program and read back `image` starting at `start_page`.
    ///
    /// Returns the CRC-32 of the programmed bytes.
    pub async fn flash_image(&mut self, image: &[u8], start_page: u8) -> Result<u32, ClientError> {
        let image = FirmwareImage::new(image, &self.region, start_page)?;

        for page in image.pages() {
            info!("Erasing page {page}");
            self.erase_page(page).await?;
        }

        let total = image.chunk_count();
        for (index, chunk) in image.chunks().enumerate() {
            // Erased flash already holds these bytes
            if chunk.is_erased() {
                continue;
            }
            self.write_chunk(chunk.page, chunk.chunk, chunk.data).await?;
            if index % 256 == 0 {
                info!("Written {index}/{total} chunks");
            }
        }

        let mut read_back = Vec::with_capacity(image.bytes().len());
        for chunk in image.chunks() {
            read_back.extend_from_slice(&self.read_chunk(chunk.page, chunk.chunk).await?);
        }

        let expected = image.crc();
        let actual = checksum(&read_back);
        if actual != expected {
            return Err(ClientError::Verify { expected, actual });
        }
        info!("Image verified, CRC {expected:#010x}");
        Ok(expected)
    }
}
