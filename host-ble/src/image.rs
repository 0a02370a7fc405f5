// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundation.xyz>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Splitting an application image into loader chunks.

use crc::{Crc, CRC_32_ISCSI};
use loader_core::{MemoryRegion, CHUNK_SIZE};
use std::fmt;

/// Value of erased flash, used to pad the last chunk.
const ERASED: u8 = 0xFF;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    Empty,
    StartPageOutsideRegion(u8),
    TooLarge { size: usize, capacity: usize },
}

impl fmt::Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("image is empty"),
            Self::StartPageOutsideRegion(page) => write!(f, "start page {page} is outside the writable region"),
            Self::TooLarge { size, capacity } => {
                write!(f, "image of {size} bytes does not fit the {capacity} bytes available")
            }
        }
    }
}

impl std::error::Error for ImageError {}

/// An image placed at a page of the writable region, padded to whole chunks.
#[derive(Debug)]
pub struct FirmwareImage {
    bytes: Vec<u8>,
    start_page: u8,
    chunks_per_page: usize,
    page_size: usize,
}

/// One chunk of the image with its flash coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageChunk {
    pub page: u8,
    pub chunk: u8,
    pub data: [u8; CHUNK_SIZE],
}

impl ImageChunk {
    pub fn is_erased(&self) -> bool {
        self.data.iter().all(|b| *b == ERASED)
    }
}

impl FirmwareImage {
    pub fn new(image: &[u8], region: &MemoryRegion, start_page: u8) -> Result<Self, ImageError> {
        if image.is_empty() {
            return Err(ImageError::Empty);
        }
        if !region.contains_page(start_page) {
            return Err(ImageError::StartPageOutsideRegion(start_page));
        }
        let page_size = region.page_size() as usize;
        let capacity = (region.end_page_exclusive() - u32::from(start_page)) as usize * page_size;
        if image.len() > capacity {
            return Err(ImageError::TooLarge {
                size: image.len(),
                capacity,
            });
        }

        let mut bytes = image.to_vec();
        bytes.resize(image.len().div_ceil(CHUNK_SIZE) * CHUNK_SIZE, ERASED);
        Ok(Self {
            bytes,
            start_page,
            chunks_per_page: region.chunks_per_page() as usize,
            page_size,
        })
    }

    /// Image bytes including the padding of the last chunk.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Pages covered by the image, in order.
    pub fn pages(&self) -> impl Iterator<Item = u8> {
        let count = self.bytes.len().div_ceil(self.page_size);
        let start_page = self.start_page;
        // The constructor keeps the last page inside the region
        (0..count).map(move |offset| start_page + offset as u8)
    }

    pub fn chunk_count(&self) -> usize {
        self.bytes.len() / CHUNK_SIZE
    }

    pub fn chunks(&self) -> impl Iterator<Item = ImageChunk> + '_ {
        self.bytes.chunks_exact(CHUNK_SIZE).enumerate().map(|(index, data)| {
            let mut chunk = [0; CHUNK_SIZE];
            chunk.copy_from_slice(data);
            ImageChunk {
                page: self.start_page + (index / self.chunks_per_page) as u8,
                chunk: (index % self.chunks_per_page) as u8,
                data: chunk,
            }
        })
    }

    pub fn crc(&self) -> u32 {
        checksum(&self.bytes)
    }
}

pub fn checksum(bytes: &[u8]) -> u32 {
    Crc::<u32>::new(&CRC_32_ISCSI).checksum(bytes)
}
