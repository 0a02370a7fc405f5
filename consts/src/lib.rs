// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundation.xyz>
// SPDX-License-Identifier: GPL-3.0-or-later

#![no_std]

/// Size of a flash memory page in bytes (4KB).
/// A page is the smallest independently erasable unit of the nRF52 flash.
pub const FLASH_PAGE: u32 = 4096;

/// Total size of the nRF52805 flash array (192KB).
pub const FLASH_SIZE: u32 = 192 * 1024;

/// Size of the protocol chunk, the read/write granularity of the loader protocol.
pub const CHUNK_SIZE: u32 = 16;

/// Start address of the SoftDevice, right after the MBR.
/// The MBR forwards interrupts here once the SoftDevice has been initialized.
pub const SOFTDEVICE_ADDR: u32 = 0x1000;

/// Base address for the application in flash memory.
/// The resident application starts right after the SoftDevice, with its vector table at offset 0.
#[cfg(not(feature = "s113"))]
pub const BASE_APP_ADDR: u32 = 0x19000;
#[cfg(feature = "s113")]
pub const BASE_APP_ADDR: u32 = 0x1C000;

/// Start address of the bootloader code in flash memory.
/// Everything from here up to the end of flash belongs to the loader and is never writable over the protocol.
pub const BASE_BOOTLOADER_ADDR: u32 = 0x26000;

/// First page the loader protocol is allowed to erase or write.
pub const WRITABLE_START_PAGE: u32 = BASE_APP_ADDR / FLASH_PAGE;

/// First page past the writable region (the bootloader's first page).
pub const WRITABLE_END_PAGE: u32 = BASE_BOOTLOADER_ADDR / FLASH_PAGE;

/// Offset inside the application vector table of the plausibility marker byte.
/// This is the most significant byte of the initial stack pointer.
pub const APP_MARKER_OFFSET: u32 = 3;

/// Expected marker value: an initial stack pointer inside SRAM (0x2000_0000).
/// Erased flash reads 0xFF and fails the check.
pub const APP_MARKER: u8 = 0x20;

/// Total time window during which holding both boot lines low forces maintenance mode.
pub const BOOT_WAIT_MS: u32 = 3000;

/// Interval between two samples of the boot lines.
pub const BOOT_POLL_INTERVAL_MS: u32 = 50;

/// Number of polls of a hardware event before the boot health check gives up and resets.
pub const HEALTH_CHECK_RETRIES: u32 = 0xFF;

/// Delay between two polls of the boot health check.
/// The crystal oscillator takes a few hundred microseconds to settle, the
/// whole check allows about 2.5 ms.
pub const HEALTH_CHECK_INTERVAL_US: u32 = 10;

/// FICR words exposed by the device info command.
/// `DEVICEID[0]`, `DEVICEID[1]` and `DEVICEADDR[0]`.
pub const IDENTITY_WORDS: [u32; 3] = [0x1000_0060, 0x1000_0064, 0x1000_00A4];

/// Maximum Transfer Unit (MTU) size for BLE communication.
/// Set to 247 bytes to allow efficient data transfer while staying within BLE limits.
pub const ATT_MTU: usize = 247;

/// Largest loader message carried by a single NUS write or notification.
pub const MAX_MESSAGE_SIZE: usize = ATT_MTU - 3;

/// Full device name advertised over BLE.
/// Used in scan response data since it's longer than the short name.
pub const DEVICE_NAME: &str = "Passport Prime Loader";

/// Short device name used in limited advertising data.
pub const SHORT_NAME: &str = "PrimeLdr";

/// UUID for the Nordic UART Service (NUS).
pub const NUS_UUID: u128 = 0x6E400001_B5A3_F393_E0A9_E50E24DCCA9E;

/// NUS RX characteristic, written by the host.
pub const NUS_RX_UUID: u128 = 0x6E400002_B5A3_F393_E0A9_E50E24DCCA9E;

/// NUS TX characteristic, notified by the loader.
pub const NUS_TX_UUID: u128 = 0x6E400003_B5A3_F393_E0A9_E50E24DCCA9E;

/// List of BLE service UUIDs supported by this device.
/// Currently only includes the Nordic UART Service (NUS).
pub const SERVICES_LIST: [[u8; 16]; 1] = [NUS_UUID.to_le_bytes()];

/// Depth of the queue between the BLE callbacks and the loader service.
pub const BT_MAX_NUM_PKT: usize = 4;

const _: () = assert!(BASE_APP_ADDR % FLASH_PAGE == 0);
const _: () = assert!(BASE_BOOTLOADER_ADDR % FLASH_PAGE == 0);
const _: () = assert!(WRITABLE_START_PAGE < WRITABLE_END_PAGE);
const _: () = assert!(WRITABLE_END_PAGE <= u8::MAX as u32);
