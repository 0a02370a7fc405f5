// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundation.xyz>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Scenario tests driving the loader core through its hardware traits.

pub(crate) mod doubles;

mod context;
mod engine;

use crate::memory::IDENTITY_WORD_COUNT;
use crate::region::MemoryRegion;

/// Writable pages 96..108 of 1 KiB, like the first loader generation.
pub(crate) fn test_region() -> MemoryRegion {
    MemoryRegion::new(96, 108, 1024, 16).unwrap()
}

pub(crate) const IDENTITY_WORDS: [u32; IDENTITY_WORD_COUNT] = [0x1000_0060, 0x1000_0064, 0x1000_00A4];
