// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundation.xyz>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Image launch preparation.
//!
//! Before control moves to another image its interrupts have to reach its own
//! vector table. The platform knows how to reroute them, this module decides
//! when and resolves the stack pointer and entry point the jump uses.

use core::fmt;

use crate::memory::{ImageDescriptor, MemoryReader, VectorTable};

/// Failure code returned by the platform while rerouting interrupts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RelocationError {
    /// Which step of the platform sequence failed
    pub step: u8,
    /// Raw status code of that step
    pub code: u32,
}

impl fmt::Display for RelocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "relocation step {} failed with {:#x}", self.step, self.code)
    }
}

/// Reroutes interrupt delivery to a vector table.
pub trait VectorTableRelocator {
    fn relocate(&mut self, vector_table_base: u32) -> Result<(), RelocationError>;
}

/// For platforms where every interrupt already reaches the right table.
pub struct NoRelocation;

impl VectorTableRelocator for NoRelocation {
    fn relocate(&mut self, _vector_table_base: u32) -> Result<(), RelocationError> {
        Ok(())
    }
}

/// Reroute interrupts to `target` and read the values the jump needs.
///
/// A failed relocation is logged and the launch continues.
pub fn prepare_launch<R, M>(target: &ImageDescriptor, relocator: &mut R, memory: &M) -> VectorTable
where
    R: VectorTableRelocator + ?Sized,
    M: MemoryReader,
{
    if let Err(e) = relocator.relocate(target.vector_table_base) {
        error!("Vector table relocation to {:#x} failed: {:?}", target.vector_table_base, e);
    }
    let table = VectorTable::read(memory, target.vector_table_base);
    debug!("Launch sp {:#x} reset {:#x}", table.initial_sp, table.reset_vector);
    if !target.starts_within(&table) {
        warn!(
            "Reset vector {:#x} lies before the image at {:#x}",
            table.reset_vector, target.entry_address
        );
    }
    table
}
