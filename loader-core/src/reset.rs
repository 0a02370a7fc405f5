// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundation.xyz>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Decoding of the nRF52 POWER.RESETREAS register.

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ResetReason: u32 {
        const RESETPIN = 1 << 0;
        const DOG = 1 << 1;
        const SREQ = 1 << 2;
        const LOCKUP = 1 << 3;
        const OFF = 1 << 16;
        const LPCOMP = 1 << 17;
        const DIF = 1 << 18;
        const NFC = 1 << 19;
    }
}

const CAUSES: [(ResetReason, &str); 8] = [
    (ResetReason::RESETPIN, "reset pin"),
    (ResetReason::DOG, "watchdog"),
    (ResetReason::SREQ, "soft reset"),
    (ResetReason::LOCKUP, "CPU lockup"),
    (ResetReason::OFF, "wake from System OFF by GPIO"),
    (ResetReason::LPCOMP, "wake from System OFF by LPCOMP"),
    (ResetReason::DIF, "wake from System OFF by debug interface"),
    (ResetReason::NFC, "wake from System OFF by NFC field"),
];

impl ResetReason {
    /// Unknown bits are dropped.
    pub const fn from_register(bits: u32) -> Self {
        Self::from_bits_truncate(bits)
    }

    /// No latched cause means power-on or brown-out.
    pub fn is_power_on(self) -> bool {
        self.is_empty()
    }

    /// Human readable names of every latched cause.
    pub fn causes(self) -> impl Iterator<Item = &'static str> {
        CAUSES
            .into_iter()
            .filter(move |(flag, _)| self.contains(*flag))
            .map(|(_, name)| name)
    }

    pub fn log(self) {
        if self.is_power_on() {
            info!("Reset reason: power-on");
        }
        for cause in self.causes() {
            info!("Reset reason: {}", cause);
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ResetReason {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "ResetReason({=u32:#x})", self.bits())
    }
}
