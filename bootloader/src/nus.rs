// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Nordic Uart Service ([NUS]) implementation.
//! [NUS]: https://developer.nordicsemi.com/nRF_Connect_SDK/doc/latest/nrf/libraries/bluetooth_services/services/nus.html

use crate::service::{EventChannel, TransportEvent};
use consts::ATT_MTU;
use defmt::{info, warn};
use heapless::Vec;
use nrf_softdevice::gatt_service;

#[gatt_service(uuid = "6E400001-B5A3-F393-E0A9-E50E24DCCA9E")]
pub struct Nus {
    #[characteristic(uuid = "6E400002-B5A3-F393-E0A9-E50E24DCCA9E", write, write_without_response)]
    rx: Vec<u8, ATT_MTU>,

    #[characteristic(uuid = "6E400003-B5A3-F393-E0A9-E50E24DCCA9E", notify)]
    tx: Vec<u8, ATT_MTU>,
}

impl Nus {
    pub(crate) fn handle(&self, event: NusEvent, events: &EventChannel) {
        match event {
            NusEvent::TxCccdWrite { notifications } => {
                info!("Replies enabled: {}", notifications);
            }
            NusEvent::RxWrite(data) => {
                let len = data.len();
                if events.try_send(TransportEvent::Message(data)).is_err() {
                    warn!("Loader queue full, dropping {} bytes", len);
                }
            }
        }
    }

    pub(crate) fn get_handle(&self) -> u16 {
        self.tx_value_handle
    }
}
