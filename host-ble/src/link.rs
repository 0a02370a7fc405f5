// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundation.xyz>
// SPDX-License-Identifier: GPL-3.0-or-later

//! BLE connection to a loader over the Nordic UART Service.

use crate::client::Transport;
use btleplug::api::{Central, CentralEvent, Characteristic, Peripheral as _, ScanFilter, ValueNotification, WriteType};
use btleplug::platform::{Adapter, Peripheral};
use futures::stream::{Stream, StreamExt};
use log::{debug, info, warn};
use std::error::Error;
use std::pin::Pin;
use std::time::Duration;
use uuid::Uuid;

pub const NUS_UUID: Uuid = Uuid::from_u128(consts::NUS_UUID);
const RX_CHARACTERISTIC_UUID: Uuid = Uuid::from_u128(consts::NUS_RX_UUID);
const TX_CHARACTERISTIC_UUID: Uuid = Uuid::from_u128(consts::NUS_TX_UUID);

pub struct BleLink {
    peripheral: Peripheral,
    rx: Characteristic,
    notifications: Pin<Box<dyn Stream<Item = ValueNotification> + Send>>,
    reply_timeout: Duration,
}

impl BleLink {
    /// Scan for a loader advertising `name`, connect and subscribe to its replies.
    pub async fn connect(
        central: &Adapter,
        name: &str,
        scan_timeout: Duration,
        reply_timeout: Duration,
    ) -> Result<Self, Box<dyn Error>> {
        // Each adapter has an event stream, we fetch via events(),
        // simplifying the type, this will return what is essentially a
        // Future<Result<Stream<Item=CentralEvent>>>.
        let mut events = central.events().await?;

        info!("Starting scan...");
        central.start_scan(ScanFilter { services: vec![NUS_UUID] }).await?;

        let discovered = tokio::time::timeout(scan_timeout, async {
            while let Some(event) = events.next().await {
                let CentralEvent::DeviceDiscovered(id) = event else {
                    continue;
                };
                let peripheral = central.peripheral(&id).await?;
                let properties = peripheral.properties().await?;
                let found = properties.and_then(|p| p.local_name).unwrap_or_default();
                debug!("DeviceDiscovered: {found}");
                if found.contains(name) {
                    return Ok(Some(peripheral));
                }
            }
            Ok::<_, btleplug::Error>(None)
        })
        .await;
        central.stop_scan().await?;

        let peripheral = discovered
            .map_err(|_| format!("no loader named {name} found"))??
            .ok_or("adapter event stream ended")?;

        if !peripheral.is_connected().await? {
            info!("Connecting to {name}...");
            peripheral.connect().await?;
        }
        peripheral.discover_services().await?;

        let characteristics = peripheral.characteristics();
        let rx = characteristics
            .iter()
            .find(|c| c.uuid == RX_CHARACTERISTIC_UUID)
            .cloned()
            .ok_or("loader has no NUS RX characteristic")?;
        let tx = characteristics
            .iter()
            .find(|c| c.uuid == TX_CHARACTERISTIC_UUID)
            .cloned()
            .ok_or("loader has no NUS TX characteristic")?;

        peripheral.subscribe(&tx).await?;
        let notifications = peripheral.notifications().await?;
        info!("Connected to {name}");

        Ok(Self {
            peripheral,
            rx,
            notifications,
            reply_timeout,
        })
    }

    pub async fn disconnect(&self) -> Result<(), Box<dyn Error>> {
        info!("Disconnecting...");
        self.peripheral.disconnect().await?;
        Ok(())
    }
}

impl Transport for BleLink {
    async fn request(&mut self, message: &[u8]) -> Result<Vec<u8>, Box<dyn Error>> {
        self.peripheral.write(&self.rx, message, WriteType::WithoutResponse).await?;

        let notifications = &mut self.notifications;
        let reply = tokio::time::timeout(self.reply_timeout, async {
            while let Some(notification) = notifications.next().await {
                if notification.uuid == TX_CHARACTERISTIC_UUID {
                    return Some(notification.value);
                }
                warn!("Ignoring notification from {}", notification.uuid);
            }
            None
        })
        .await;

        match reply {
            Ok(Some(value)) => Ok(value),
            Ok(None) => Err("notification stream closed".into()),
            Err(_) => Err(format!("no reply within {:?}", self.reply_timeout).into()),
        }
    }
}
