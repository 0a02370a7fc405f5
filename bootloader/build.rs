// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundation.xyz>
// SPDX-License-Identifier: GPL-3.0-or-later

//! This build script generates the `memory.x` linker fragment from the shared
//! flash layout and puts it where the linker can always find it.
//! The loader runs the SoftDevice while in maintenance mode, so the bottom of
//! RAM is reserved for it like in the application.

use consts::{BASE_BOOTLOADER_ADDR, FLASH_SIZE};
use std::env;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

fn main() {
    /* The SoftDevices S113 7.3.0 minimal RAM requirement is 4.4K (0x1198) */
    /* and use a maximum of 1.75K (0x700) for call stack. */
    /* We choose to reserve 10648 bytes (0x2998) at the begining of RAM */
    let soft_device_ram_reserved = 10648;

    let memory_x_content = format!(
        r##"
        BASE_BOOTLOADER_ADDR = {:#X};
        FLASH_SIZE = {:#X};

        MEMORY
        {{
            /* NOTE 1 K = 1 KiBi = 1024 bytes */
            /* The loader owns the top of the flash, up to the end of the device */
            FLASH (rx) : ORIGIN = 0x00000000 + BASE_BOOTLOADER_ADDR, LENGTH = FLASH_SIZE - BASE_BOOTLOADER_ADDR
            RAM : ORIGIN = 0x20000000 + {}, LENGTH = 24K - {}
            mbr_uicr_bootloader_addr (r) : ORIGIN = 0x10001014, LENGTH = 0x4
            uicr_approtect (r) : ORIGIN = 0x10001208, LENGTH = 0x4
        }}

        SECTIONS {{
            .uicr_approtect :  {{
                KEEP(*(.uicr_approtect))
                . = ALIGN(4);
            }} > uicr_approtect

            .mbr_uicr_bootloader_addr :  {{
                KEEP(*(.mbr_uicr_bootloader_addr))
                . = ALIGN(4);
            }} > mbr_uicr_bootloader_addr
        }};
        "##,
        BASE_BOOTLOADER_ADDR, FLASH_SIZE, soft_device_ram_reserved, soft_device_ram_reserved
    );
    // Put `memory.x` in our output directory and ensure it's
    // on the linker search path.
    let out = &PathBuf::from(env::var_os("OUT_DIR").unwrap());
    File::create(out.join("memory.x"))
        .unwrap()
        .write_all(memory_x_content.as_bytes())
        .unwrap();
    println!("cargo:rustc-link-search={}", out.display());

    println!("cargo:rerun-if-changed=../consts/src/lib.rs");

    println!("cargo:rustc-link-arg-bins=--nmagic");
    println!("cargo:rustc-link-arg-bins=-Tlink.x");
    println!("cargo:rustc-link-arg-bins=-Tdefmt.x");
}
