// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundation.xyz>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Test doubles for the traits the loader core runs on.

use std::collections::HashMap;
use std::convert::Infallible;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, ErrorKind, InputPin};
use embedded_storage::nor_flash::{NorFlashError, NorFlashErrorKind};
use embedded_storage_async::nor_flash::{ErrorType, NorFlash, ReadNorFlash};

use crate::launch::{RelocationError, VectorTableRelocator};
use crate::memory::MemoryReader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FakeFlashError(pub NorFlashErrorKind);

impl NorFlashError for FakeFlashError {
    fn kind(&self) -> NorFlashErrorKind {
        self.0
    }
}

/// NOR flash in RAM: erase sets bytes to 0xFF, programming can only clear
/// bits. Every call is recorded and failures can be injected.
pub struct FakeFlash {
    pub data: Vec<u8>,
    pub erases: Vec<(u32, u32)>,
    pub writes: Vec<(u32, Vec<u8>)>,
    pub reads: Vec<(u32, usize)>,
    pub fail_with: Option<NorFlashErrorKind>,
}

impl FakeFlash {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0xFF; capacity],
            erases: Vec::new(),
            writes: Vec::new(),
            reads: Vec::new(),
            fail_with: None,
        }
    }

    /// Number of calls of any kind that reached the flash.
    pub fn calls(&self) -> usize {
        self.erases.len() + self.writes.len() + self.reads.len()
    }

    pub fn fill(&mut self, address: u32, bytes: &[u8]) {
        let start = address as usize;
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
    }

    fn injected(&self) -> Result<(), FakeFlashError> {
        match self.fail_with {
            Some(kind) => Err(FakeFlashError(kind)),
            None => Ok(()),
        }
    }

    fn check_bounds(&self, offset: u32, len: usize) -> Result<(), FakeFlashError> {
        if offset as usize + len > self.data.len() {
            return Err(FakeFlashError(NorFlashErrorKind::OutOfBounds));
        }
        Ok(())
    }
}

impl ErrorType for FakeFlash {
    type Error = FakeFlashError;
}

impl ReadNorFlash for FakeFlash {
    const READ_SIZE: usize = 1;

    async fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        self.reads.push((offset, bytes.len()));
        self.injected()?;
        self.check_bounds(offset, bytes.len())?;
        let start = offset as usize;
        bytes.copy_from_slice(&self.data[start..start + bytes.len()]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.data.len()
    }
}

impl NorFlash for FakeFlash {
    const WRITE_SIZE: usize = 4;
    const ERASE_SIZE: usize = 1024;

    async fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        self.erases.push((from, to));
        self.injected()?;
        if from > to || from as usize % Self::ERASE_SIZE != 0 || to as usize % Self::ERASE_SIZE != 0 {
            return Err(FakeFlashError(NorFlashErrorKind::NotAligned));
        }
        self.check_bounds(from, (to - from) as usize)?;
        self.data[from as usize..to as usize].fill(0xFF);
        Ok(())
    }

    async fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        self.writes.push((offset, bytes.to_vec()));
        self.injected()?;
        // Like the SoftDevice flash driver, the source has to be word aligned
        let aligned = offset as usize % Self::WRITE_SIZE == 0
            && bytes.len() % Self::WRITE_SIZE == 0
            && bytes.as_ptr() as usize % 4 == 0;
        if !aligned {
            return Err(FakeFlashError(NorFlashErrorKind::NotAligned));
        }
        self.check_bounds(offset, bytes.len())?;
        let start = offset as usize;
        for (cell, byte) in self.data[start..start + bytes.len()].iter_mut().zip(bytes) {
            *cell &= *byte;
        }
        Ok(())
    }
}

/// Sparse word addressed memory, unset words read as erased flash.
#[derive(Default)]
pub struct FakeMemory {
    words: HashMap<u32, u32>,
}

impl FakeMemory {
    pub fn with_word(mut self, address: u32, value: u32) -> Self {
        self.words.insert(address, value);
        self
    }

    /// Memory holding a vector table at `base`.
    pub fn with_image(self, base: u32, initial_sp: u32, reset_vector: u32) -> Self {
        self.with_word(base, initial_sp).with_word(base + 4, reset_vector)
    }
}

impl MemoryReader for FakeMemory {
    fn read_word(&self, address: u32) -> u32 {
        self.words.get(&address).copied().unwrap_or(0xFFFF_FFFF)
    }
}

/// Input line reading high until sample `low_from`, low from then on.
#[derive(Default)]
pub struct FakePin {
    pub low_from: Option<usize>,
    pub samples: usize,
}

impl FakePin {
    pub fn high() -> Self {
        Self::default()
    }

    pub fn low_from(sample: usize) -> Self {
        Self {
            low_from: Some(sample),
            samples: 0,
        }
    }
}

impl digital::ErrorType for FakePin {
    type Error = Infallible;
}

impl InputPin for FakePin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        self.is_low().map(|low| !low)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        let sample = self.samples;
        self.samples += 1;
        Ok(self.low_from.is_some_and(|from| sample >= from))
    }
}

#[derive(Debug)]
pub struct PinFault;

impl digital::Error for PinFault {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// Input line whose every read fails.
pub struct FailingPin;

impl digital::ErrorType for FailingPin {
    type Error = PinFault;
}

impl InputPin for FailingPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Err(PinFault)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Err(PinFault)
    }
}

/// Delay that only adds up the requested time.
#[derive(Default)]
pub struct CountingDelay {
    pub elapsed_ns: u64,
}

impl CountingDelay {
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ns / 1_000_000
    }
}

impl DelayNs for CountingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns += u64::from(ns);
    }
}

#[derive(Default)]
pub struct RecordingRelocator {
    pub relocated: Vec<u32>,
    pub fail_with: Option<RelocationError>,
}

impl VectorTableRelocator for RecordingRelocator {
    fn relocate(&mut self, vector_table_base: u32) -> Result<(), RelocationError> {
        self.relocated.push(vector_table_base);
        match self.fail_with {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
