// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundation.xyz>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Writable flash region policy.
//!
//! Decides whether a page or chunk index named by a remote command lies inside
//! the part of the flash the loader is allowed to touch. The loader's own
//! pages, the SoftDevice and the MBR sit outside the region and can never be
//! erased or written through the protocol.

use core::fmt;

/// Size in bytes of a protocol chunk, the unit of remote reads and writes.
pub const CHUNK_SIZE: usize = 16;

/// Reasons a [`MemoryRegion`] cannot be built from a configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegionError {
    /// `start_page` is not below `end_page_exclusive`
    EmptyRange,
    /// A zero sized page
    ZeroPageSize,
    /// The chunk size differs from the protocol's [`CHUNK_SIZE`]
    ChunkSizeMismatch,
    /// The page size is not a whole number of chunks
    PageNotChunkAligned,
}

impl fmt::Display for RegionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyRange => f.write_str("empty page range"),
            Self::ZeroPageSize => f.write_str("page size is zero"),
            Self::ChunkSizeMismatch => write!(f, "chunk size must be {CHUNK_SIZE} bytes"),
            Self::PageNotChunkAligned => f.write_str("page size is not a multiple of the chunk size"),
        }
    }
}

/// Reasons a command is refused before any flash access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ValidationError {
    /// The message length does not match the command's fixed length
    InvalidLength,
    /// The page is outside `[start_page, end_page_exclusive)`
    PageOutOfRange,
    /// The chunk index is outside the window allowed for the access
    ChunkOutOfRange,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidLength => f.write_str("invalid message length"),
            Self::PageOutOfRange => f.write_str("page outside the writable region"),
            Self::ChunkOutOfRange => f.write_str("chunk outside the allowed window"),
        }
    }
}

/// Kind of flash access a command performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Access {
    /// Whole page erase, no chunk index
    Erase,
    /// Chunk program, limited to the chunks of the named page
    Write,
    /// Chunk read, allowed to reach into the page following the named one
    Read,
}

impl Access {
    /// Exclusive upper bound of the chunk index for this access.
    const fn chunk_limit(self, chunks_per_page: u32) -> u32 {
        match self {
            Access::Erase => 0,
            Access::Write => chunks_per_page,
            // Reads keep the doubled window of the deployed host tools
            Access::Read => 2 * chunks_per_page,
        }
    }
}

/// The contiguous range of pages remote commands may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MemoryRegion {
    start_page: u32,
    end_page_exclusive: u32,
    page_size_bytes: u32,
    chunk_size_bytes: u32,
}

impl MemoryRegion {
    /// Build a region, checking the geometry once so that every later check
    /// can rely on it.
    pub const fn new(
        start_page: u32,
        end_page_exclusive: u32,
        page_size_bytes: u32,
        chunk_size_bytes: u32,
    ) -> Result<Self, RegionError> {
        if start_page >= end_page_exclusive {
            return Err(RegionError::EmptyRange);
        }
        if page_size_bytes == 0 {
            return Err(RegionError::ZeroPageSize);
        }
        if chunk_size_bytes as usize != CHUNK_SIZE {
            return Err(RegionError::ChunkSizeMismatch);
        }
        if page_size_bytes % chunk_size_bytes != 0 {
            return Err(RegionError::PageNotChunkAligned);
        }
        Ok(Self {
            start_page,
            end_page_exclusive,
            page_size_bytes,
            chunk_size_bytes,
        })
    }

    pub const fn start_page(&self) -> u32 {
        self.start_page
    }

    pub const fn end_page_exclusive(&self) -> u32 {
        self.end_page_exclusive
    }

    pub const fn page_size(&self) -> u32 {
        self.page_size_bytes
    }

    pub const fn chunk_size(&self) -> u32 {
        self.chunk_size_bytes
    }

    /// Number of chunks fitting in one page.
    pub const fn chunks_per_page(&self) -> u32 {
        self.page_size_bytes / self.chunk_size_bytes
    }

    /// Number of pages in the region.
    pub const fn page_count(&self) -> u32 {
        self.end_page_exclusive - self.start_page
    }

    /// Size of the region in bytes.
    pub const fn size_bytes(&self) -> u32 {
        self.page_count() * self.page_size_bytes
    }

    pub const fn contains_page(&self, page: u8) -> bool {
        let page = page as u32;
        self.start_page <= page && page < self.end_page_exclusive
    }

    /// Check a page, and optionally a chunk index, for the given access.
    ///
    /// The page is checked first, a command naming both a bad page and a bad
    /// chunk reports the page.
    pub fn validate(&self, page: u8, chunk: Option<u8>, access: Access) -> Result<(), ValidationError> {
        if !self.contains_page(page) {
            return Err(ValidationError::PageOutOfRange);
        }
        match chunk {
            Some(chunk) if u32::from(chunk) >= access.chunk_limit(self.chunks_per_page()) => {
                Err(ValidationError::ChunkOutOfRange)
            }
            _ => Ok(()),
        }
    }

    /// Byte address of the first byte of `page`.
    pub const fn page_address(&self, page: u8) -> u32 {
        page as u32 * self.page_size_bytes
    }

    /// Byte address of `chunk` counted from the start of `page`.
    pub const fn chunk_address(&self, page: u8, chunk: u8) -> u32 {
        self.page_address(page) + chunk as u32 * self.chunk_size_bytes
    }
}
