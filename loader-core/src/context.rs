// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundation.xyz>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Connection state of the maintenance mode.
//!
//! Serves a single client. At most one reply is in flight, the transport
//! reports back with [`InboundEvent::TransmissionComplete`] once the reply
//! left, inbound messages arriving before that are refused as busy.

use embedded_storage_async::nor_flash::NorFlash;
use heapless::Vec;

use crate::engine::{CommandEngine, MIN_RESPONSE_CAPACITY};
use crate::memory::MemoryReader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectionHandle(pub u16);

/// Transport events fed into the context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InboundEvent<'a> {
    Connected(ConnectionHandle),
    Disconnected,
    MessageReceived(&'a [u8]),
    TransmissionComplete,
}

/// What the transport has to do after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Dispatch<'a> {
    /// Nothing to send
    Idle,
    /// Send these bytes to the connected client
    Respond(&'a [u8]),
    /// A reply is still in flight, the message was dropped
    Busy,
    /// No client is connected, the message was dropped
    NotConnected,
}

pub struct LoaderContext<M, const N: usize> {
    engine: CommandEngine<M>,
    scratch: Vec<u8, N>,
    connection: Option<ConnectionHandle>,
    transmitting: bool,
}

impl<M: MemoryReader, const N: usize> LoaderContext<M, N> {
    const CAPACITY_CHECK: () = assert!(N >= MIN_RESPONSE_CAPACITY, "reply buffer too small");

    pub fn new(engine: CommandEngine<M>) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::CAPACITY_CHECK;
        Self {
            engine,
            scratch: Vec::new(),
            connection: None,
            transmitting: false,
        }
    }

    pub fn engine(&self) -> &CommandEngine<M> {
        &self.engine
    }

    pub fn connection(&self) -> Option<ConnectionHandle> {
        self.connection
    }

    pub fn is_transmitting(&self) -> bool {
        self.transmitting
    }

    pub async fn dispatch<'s, F: NorFlash>(&'s mut self, flash: &mut F, event: InboundEvent<'_>) -> Dispatch<'s> {
        match event {
            InboundEvent::Connected(handle) => {
                info!("Client connected, handle {}", handle.0);
                self.connection = Some(handle);
                self.transmitting = false;
                Dispatch::Idle
            }
            InboundEvent::Disconnected => {
                info!("Client disconnected");
                self.connection = None;
                self.transmitting = false;
                Dispatch::Idle
            }
            InboundEvent::TransmissionComplete => {
                self.transmitting = false;
                Dispatch::Idle
            }
            InboundEvent::MessageReceived(message) => {
                if self.connection.is_none() {
                    warn!("Dropping {} bytes, no client", message.len());
                    return Dispatch::NotConnected;
                }
                if self.transmitting {
                    warn!("Dropping {} bytes, reply in flight", message.len());
                    return Dispatch::Busy;
                }
                self.transmitting = true;
                Dispatch::Respond(self.engine.handle(flash, message, &mut self.scratch).await)
            }
        }
    }
}
