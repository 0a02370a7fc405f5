// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundation.xyz>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Bounded waits on hardware readiness flags.

use core::fmt;

use embedded_hal::delay::DelayNs;

/// The condition stayed false for every retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HealthCheckTimeout {
    pub retries: u32,
}

impl fmt::Display for HealthCheckTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "not ready after {} retries", self.retries)
    }
}

/// Poll `ready` until it holds, sleeping `interval_us` between attempts.
///
/// `ready` is checked `retries + 1` times at most.
pub fn guarded_wait<D, F>(delay: &mut D, retries: u32, interval_us: u32, mut ready: F) -> Result<(), HealthCheckTimeout>
where
    D: DelayNs + ?Sized,
    F: FnMut() -> bool,
{
    for _ in 0..retries {
        if ready() {
            return Ok(());
        }
        delay.delay_us(interval_us);
    }
    if ready() {
        Ok(())
    } else {
        Err(HealthCheckTimeout { retries })
    }
}
