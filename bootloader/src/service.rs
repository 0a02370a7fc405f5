// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundation.xyz>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Maintenance mode service: feeds transport events to the loader context
//! and sends its replies back as NUS notifications.

use crate::server::Server;
use consts::{ATT_MTU, BT_MAX_NUM_PKT};
use defmt::{error, warn};
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::Timer;
use embedded_storage_async::nor_flash::NorFlash;
use heapless::Vec;
use loader_core::{ConnectionHandle, Dispatch, InboundEvent, LoaderContext, MemoryReader};
use nrf_softdevice::ble::gatt_server::{notify_value, NotifyValueError};
use nrf_softdevice::ble::Connection;
use nrf_softdevice::RawError;

/// Attempts at queueing one notification before the reply is dropped.
const NOTIFY_ATTEMPTS: u32 = 100;

pub enum TransportEvent {
    Connected(Connection),
    Disconnected,
    Message(Vec<u8, ATT_MTU>),
}

pub type EventChannel = Channel<ThreadModeRawMutex, TransportEvent, BT_MAX_NUM_PKT>;

pub async fn run_loader<M, F, const N: usize>(
    context: &mut LoaderContext<M, N>,
    flash: &mut F,
    server: &Server,
    events: &EventChannel,
) -> !
where
    M: MemoryReader,
    F: NorFlash,
{
    let mut connection: Option<Connection> = None;

    loop {
        match events.receive().await {
            TransportEvent::Connected(conn) => {
                let Some(handle) = conn.handle() else {
                    warn!("Connection closed before it was served");
                    continue;
                };
                context.dispatch(flash, InboundEvent::Connected(ConnectionHandle(handle))).await;
                connection = Some(conn);
            }
            TransportEvent::Disconnected => {
                context.dispatch(flash, InboundEvent::Disconnected).await;
                connection = None;
            }
            TransportEvent::Message(message) => {
                let sent = match context.dispatch(flash, InboundEvent::MessageReceived(&message)).await {
                    Dispatch::Respond(reply) => {
                        if let Some(conn) = &connection {
                            notify(conn, server, reply).await;
                        }
                        true
                    }
                    Dispatch::Idle | Dispatch::Busy | Dispatch::NotConnected => false,
                };
                if sent {
                    context.dispatch(flash, InboundEvent::TransmissionComplete).await;
                }
            }
        }
    }
}

/// Queue `reply` as a TX notification, waiting for room in the SoftDevice
/// queue.
async fn notify(conn: &Connection, server: &Server, reply: &[u8]) {
    for _ in 0..NOTIFY_ATTEMPTS {
        match notify_value(conn, server.nus.get_handle(), reply) {
            Ok(()) => return,
            Err(NotifyValueError::Raw(RawError::Resources)) => Timer::after_millis(1).await,
            Err(NotifyValueError::Raw(RawError::BleGattsSysAttrMissing)) => {
                warn!("Client did not subscribe to TX, reply dropped");
                return;
            }
            Err(e) => {
                error!("Error on nus send {:?}", e);
                return;
            }
        }
    }
    error!("Notification queue stayed full, reply dropped");
}
