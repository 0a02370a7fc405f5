// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundation.xyz>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Values the programmer writes to UICR along with the loader image.

use consts::BASE_BOOTLOADER_ADDR;

/// Start address of the loader, read by the MBR at every reset.
/// The MBR forwards interrupts and the reset vector to this address instead
/// of the SoftDevice.
#[used]
#[link_section = ".mbr_uicr_bootloader_addr"]
pub static BOOTLOADER_ADDR: u32 = BASE_BOOTLOADER_ADDR;

/// Lock the debug port.
#[cfg(feature = "no-dbg-access")]
#[used]
#[link_section = ".uicr_approtect"]
pub static APP_PROTECTION: u32 = 0xFFFF_FF00;
