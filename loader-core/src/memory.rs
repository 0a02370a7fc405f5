// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundation.xyz>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Read access to memory mapped flash and factory information.

/// Number of factory words making up the identity block.
pub const IDENTITY_WORD_COUNT: usize = 3;
/// Size in bytes of the identity block sent by the device info command.
pub const IDENTITY_LEN: usize = IDENTITY_WORD_COUNT * 4;

/// Word and byte reads of the address space.
///
/// Implemented with volatile reads on target and with fakes in tests.
pub trait MemoryReader {
    fn read_word(&self, address: u32) -> u32;

    fn read_byte(&self, address: u32) -> u8 {
        self.read_word(address & !0b11).to_le_bytes()[(address & 0b11) as usize]
    }
}

/// The processor's own address space.
pub struct SystemMemory {
    _private: (),
}

impl SystemMemory {
    /// # Safety
    ///
    /// Only valid on the target, every address read through it must be mapped
    /// and readable.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl MemoryReader for SystemMemory {
    fn read_word(&self, address: u32) -> u32 {
        // SAFETY: guaranteed by the contract of `SystemMemory::new`
        unsafe { core::ptr::read_volatile(address as usize as *const u32) }
    }

    fn read_byte(&self, address: u32) -> u8 {
        // SAFETY: guaranteed by the contract of `SystemMemory::new`
        unsafe { core::ptr::read_volatile(address as usize as *const u8) }
    }
}

/// Where an executable image lives in flash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ImageDescriptor {
    /// First byte of the image. The jump itself goes through the reset
    /// vector, this only bounds where that vector may point.
    pub entry_address: u32,
    pub vector_table_base: u32,
}

impl ImageDescriptor {
    /// An image whose vector table sits at its first byte.
    pub const fn at(address: u32) -> Self {
        Self {
            entry_address: address,
            vector_table_base: address,
        }
    }

    /// Whether the reset vector of `table` points into this image.
    pub fn starts_within(&self, table: &VectorTable) -> bool {
        table.reset_address() >= self.entry_address
    }
}

/// The first two entries of a Cortex-M vector table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct VectorTable {
    pub initial_sp: u32,
    pub reset_vector: u32,
}

impl VectorTable {
    pub fn read<M: MemoryReader>(memory: &M, base: u32) -> Self {
        Self {
            initial_sp: memory.read_word(base),
            reset_vector: memory.read_word(base + 4),
        }
    }

    /// Reset vector without the Thumb bit.
    pub fn reset_address(&self) -> u32 {
        self.reset_vector & !1
    }
}

/// Concatenate the identity words, each most significant byte first.
pub fn read_identity_block<M: MemoryReader>(
    memory: &M,
    addresses: &[u32; IDENTITY_WORD_COUNT],
) -> [u8; IDENTITY_LEN] {
    let mut block = [0; IDENTITY_LEN];
    for (out, address) in block.chunks_exact_mut(4).zip(addresses) {
        out.copy_from_slice(&memory.read_word(*address).to_be_bytes());
    }
    block
}
