// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundation.xyz>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Boot image selection.
//!
//! An application is only booted when its marker byte is present. Holding both
//! recovery lines low during the startup window keeps the device in the
//! loader.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::InputPin;

use crate::memory::{ImageDescriptor, MemoryReader};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SelectorConfig {
    /// Total time the recovery lines are watched
    pub window_ms: u32,
    /// Delay between two samples of the lines
    pub interval_ms: u32,
    /// Offset of the marker byte from the application's vector table
    pub marker_offset: u32,
    /// Expected marker value, the top byte of a RAM stack pointer
    pub marker: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BootDecision {
    RunApplication,
    RemainInLoader,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SelectorState {
    Polling { elapsed_ms: u32 },
    Decided(BootDecision),
}

/// Whether a bootable application image is installed.
pub fn application_present<M: MemoryReader>(memory: &M, application: &ImageDescriptor, config: &SelectorConfig) -> bool {
    memory.read_byte(application.vector_table_base + config.marker_offset) == config.marker
}

pub struct ImageSelector<A, B, D> {
    first: A,
    second: B,
    delay: D,
    config: SelectorConfig,
    state: SelectorState,
}

impl<A: InputPin, B: InputPin, D: DelayNs> ImageSelector<A, B, D> {
    /// The lines are expected to be configured as inputs with pull-ups.
    pub fn new(first: A, second: B, delay: D, config: SelectorConfig) -> Self {
        Self {
            first,
            second,
            delay,
            config,
            state: SelectorState::Polling { elapsed_ms: 0 },
        }
    }

    pub fn state(&self) -> SelectorState {
        self.state
    }

    /// Sample the lines once, then wait one interval if nothing was decided.
    pub fn step(&mut self) -> SelectorState {
        let SelectorState::Polling { elapsed_ms } = self.state else {
            return self.state;
        };

        self.state = if self.recovery_requested() {
            info!("Recovery lines held low after {} ms", elapsed_ms);
            SelectorState::Decided(BootDecision::RemainInLoader)
        } else {
            let interval = self.config.interval_ms.max(1);
            self.delay.delay_ms(interval);
            let elapsed_ms = elapsed_ms.saturating_add(interval);
            if elapsed_ms >= self.config.window_ms {
                SelectorState::Decided(BootDecision::RunApplication)
            } else {
                SelectorState::Polling { elapsed_ms }
            }
        };
        self.state
    }

    /// Decide which image runs.
    ///
    /// Without an application marker the loader stays resident at once, the
    /// lines are never sampled and no time is spent waiting.
    pub fn decide<M: MemoryReader>(&mut self, memory: &M, application: &ImageDescriptor) -> BootDecision {
        if !application_present(memory, application, &self.config) {
            info!("No application marker at {:#x}", application.vector_table_base);
            self.state = SelectorState::Decided(BootDecision::RemainInLoader);
            return BootDecision::RemainInLoader;
        }
        loop {
            if let SelectorState::Decided(decision) = self.step() {
                return decision;
            }
        }
    }

    fn recovery_requested(&mut self) -> bool {
        // Sample both lines on every pass
        let first = line_low(&mut self.first);
        let second = line_low(&mut self.second);
        first && second
    }
}

/// A line that cannot be read counts as released.
fn line_low<P: InputPin>(pin: &mut P) -> bool {
    match pin.is_low() {
        Ok(low) => low,
        Err(_) => {
            warn!("Recovery line read failed");
            false
        }
    }
}
