// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use consts::SOFTDEVICE_ADDR;
use cortex_m::peripheral::NVIC;
use defmt::info;
use embassy_nrf::interrupt::Interrupt;
use loader_core::{prepare_launch, ImageDescriptor, MemoryReader, RelocationError, VectorTable, VectorTableRelocator};
use nrf_softdevice::raw;
use nrf_softdevice_mbr as mbr;

/// Steps reported in [`RelocationError::step`].
const STEP_INIT_SD: u8 = 1;
const STEP_VECTOR_TABLE_BASE: u8 = 2;
const STEP_IRQ_FORWARD: u8 = 3;

/// Reroutes interrupts through the MBR and the SoftDevice.
///
/// The MBR forwards to the SoftDevice, which forwards everything it does not
/// handle itself to the given vector table.
pub struct SoftdeviceRelocator;

impl VectorTableRelocator for SoftdeviceRelocator {
    fn relocate(&mut self, vector_table_base: u32) -> Result<(), RelocationError> {
        let init = mbr::sd_mbr_command_t {
            command: mbr::NRF_MBR_COMMANDS_SD_MBR_COMMAND_INIT_SD,
            params: mbr::sd_mbr_command_t__bindgen_ty_1 {
                irq_forward_address_set: mbr::sd_mbr_command_irq_forward_address_set_t { address: 0 },
            },
        };
        mbr_command(init).map_err(|code| RelocationError {
            step: STEP_INIT_SD,
            code,
        })?;

        // Both forwarding stages change together
        critical_section::with(|_| {
            let ret = unsafe { raw::sd_softdevice_vector_table_base_set(vector_table_base) };
            if ret != 0 {
                return Err(RelocationError {
                    step: STEP_VECTOR_TABLE_BASE,
                    code: ret,
                });
            }

            let forward = mbr::sd_mbr_command_t {
                command: mbr::NRF_MBR_COMMANDS_SD_MBR_COMMAND_IRQ_FORWARD_ADDRESS_SET,
                params: mbr::sd_mbr_command_t__bindgen_ty_1 {
                    irq_forward_address_set: mbr::sd_mbr_command_irq_forward_address_set_t {
                        address: SOFTDEVICE_ADDR,
                    },
                },
            };
            mbr_command(forward).map_err(|code| RelocationError {
                step: STEP_IRQ_FORWARD,
                code,
            })
        })
    }
}

fn mbr_command(mut cmd: mbr::sd_mbr_command_t) -> Result<(), u32> {
    match unsafe { mbr::sd_mbr_command(&mut cmd) } {
        0 => Ok(()),
        code => Err(code),
    }
}

/// Boots `target`, assuming the SoftDevice is present.
///
/// # Safety
///
/// This modifies the stack pointer and reset vector and will run the code
/// placed at `target`.
pub unsafe fn launch<M: MemoryReader>(target: &ImageDescriptor, memory: &M) -> ! {
    // Disable active interrupts
    NVIC::mask(Interrupt::GPIOTE);
    NVIC::mask(Interrupt::RTC1);
    NVIC::unpend(Interrupt::GPIOTE);
    NVIC::unpend(Interrupt::RTC1);

    let table = prepare_launch(target, &mut SoftdeviceRelocator, memory);
    info!("msp = {=u32:x}, rv = {=u32:x}", table.initial_sp, table.reset_vector);

    jump(table)
}

unsafe fn jump(table: VectorTable) -> ! {
    // These instructions perform the following operations:
    //
    // * Modify control register to use MSP as stack pointer (clear spsel bit)
    // * Synchronize instruction barrier
    // * Initialize stack pointer from the image's vector table
    // * Set link register to not return (0xFF)
    // * Jump to the image's reset vector
    core::arch::asm!(
        "mrs {tmp}, CONTROL",
        "bics {tmp}, {spsel}",
        "msr CONTROL, {tmp}",
        "isb",
        "msr MSP, {msp}",
        "mov lr, {new_lr}",
        "bx {rv}",
        // `out(reg) _` is not permitted in a `noreturn` asm! call,
        // so instead use `in(reg) 0` and don't restore it afterwards.
        tmp = in(reg) 0,
        spsel = in(reg) 2,
        new_lr = in(reg) 0xFFFFFFFFu32,
        msp = in(reg) table.initial_sp,
        rv = in(reg) table.reset_vector,
        options(noreturn),
    );
}
