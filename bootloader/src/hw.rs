// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundation.xyz>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Register level startup checks, run before deciding which image boots.

use consts::{HEALTH_CHECK_INTERVAL_US, HEALTH_CHECK_RETRIES};
use cortex_m::peripheral::SCB;
use defmt::{error, info};
use embedded_hal::delay::DelayNs;
use loader_core::{guarded_wait, ResetReason};
use nrf52805_pac::{CLOCK, POWER};

/// Start the high frequency crystal, resetting the device if it never settles.
pub fn start_hfclk<D: DelayNs>(delay: &mut D) {
    // SAFETY: nothing else drives CLOCK before the SoftDevice is enabled
    let clock = unsafe { &*CLOCK::ptr() };
    clock.events_hfclkstarted.write(|w| unsafe { w.bits(0) });
    clock.tasks_hfclkstart.write(|w| unsafe { w.bits(1) });

    let started = guarded_wait(delay, HEALTH_CHECK_RETRIES, HEALTH_CHECK_INTERVAL_US, || {
        clock.events_hfclkstarted.read().bits() != 0
    });
    match started {
        Ok(()) => info!("HFXO started"),
        Err(e) => {
            error!("HFXO start failed: {}", e);
            SCB::sys_reset();
        }
    }
}

/// Read and clear the latched reset causes.
pub fn take_reset_reason() -> ResetReason {
    // SAFETY: RESETREAS is only accessed here
    let power = unsafe { &*POWER::ptr() };
    let bits = power.resetreas.read().bits();
    // Latched bits are cleared by writing them back
    power.resetreas.write(|w| unsafe { w.bits(bits) });
    ResetReason::from_register(bits)
}
