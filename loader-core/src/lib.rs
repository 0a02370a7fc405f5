// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundation.xyz>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Hardware independent core of the BLE loader.
//!
//! The loader lives at the top of the nRF52805 flash, next to the SoftDevice
//! and the application image. On every reset it decides between booting the
//! application and staying resident to serve flash maintenance commands over
//! the Nordic UART Service. Everything that does not need a register or a
//! radio lives in this crate:
//!
//! - the writable [`MemoryRegion`] policy,
//! - the [`Command`] wire format and its [`CommandResult`] replies,
//! - the [`CommandEngine`] executing commands against any async `NorFlash`,
//! - the boot [`ImageSelector`] sampling the two recovery lines,
//! - the [`prepare_launch`] sequence resolving an image's vector table,
//! - the [`LoaderContext`] tracking the single client connection,
//! - the bounded [`guarded_wait`] health check and [`ResetReason`] decoding.
//!
//! The platform crate supplies the hardware through `embedded-hal`,
//! `embedded-storage-async` and the [`MemoryReader`] / [`VectorTableRelocator`]
//! traits.

#![cfg_attr(not(test), no_std)]

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod command;
pub mod context;
pub mod engine;
pub mod health;
pub mod launch;
pub mod memory;
pub mod region;
pub mod reset;
pub mod response;
pub mod selector;

#[cfg(test)]
mod tests;

pub use command::{Command, DecodeError};
pub use context::{ConnectionHandle, Dispatch, InboundEvent, LoaderContext};
pub use engine::{CommandEngine, MIN_RESPONSE_CAPACITY};
pub use health::{guarded_wait, HealthCheckTimeout};
pub use launch::{prepare_launch, NoRelocation, RelocationError, VectorTableRelocator};
pub use memory::{ImageDescriptor, MemoryReader, SystemMemory, VectorTable, IDENTITY_LEN};
pub use region::{Access, MemoryRegion, RegionError, ValidationError, CHUNK_SIZE};
pub use reset::ResetReason;
pub use response::{Ack, CommandResult, EncodeError, FlashFailure, Reject, ReplyError};
pub use selector::{application_present, BootDecision, ImageSelector, SelectorConfig, SelectorState};
