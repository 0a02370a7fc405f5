// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::nus::*;
use crate::service::{EventChannel, TransportEvent};
use consts::{ATT_MTU, DEVICE_NAME, SERVICES_LIST, SHORT_NAME};
use defmt::{error, info};
use embassy_time::Timer;
use nrf_softdevice::ble::advertisement_builder::{
    ExtendedAdvertisementBuilder, ExtendedAdvertisementPayload, Flag, ServiceList,
};
use nrf_softdevice::ble::{gatt_server, peripheral};
use nrf_softdevice::gatt_server;
use nrf_softdevice::{raw, Softdevice};

#[gatt_server]
pub struct Server {
    pub nus: Nus,
}

/// SoftDevice setup for a single peripheral link serving one reply at a time.
///
/// The GAP device name keeps the SoftDevice default, clients find the loader
/// by its advertised names.
pub fn initialize_sd() -> &'static mut Softdevice {
    let config = nrf_softdevice::Config {
        clock: Some(raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_XTAL as u8,
            rc_ctiv: 0,
            rc_temp_ctiv: 0,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_20_PPM as u8,
        }),
        conn_gap: Some(raw::ble_gap_conn_cfg_t {
            conn_count: 1,
            event_length: 24,
        }),
        conn_gatt: Some(raw::ble_gatt_conn_cfg_t { att_mtu: ATT_MTU as u16 }),
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: 1,
            periph_role_count: 1,
        }),
        // Replies never overlap
        conn_gatts: Some(raw::ble_gatts_conn_cfg_t { hvn_tx_queue_size: 1 }),
        ..Default::default()
    };

    Softdevice::enable(&config)
}

/// Advertise, serve one client at a time and report connections to the
/// loader service.
pub async fn run_bluetooth(sd: &'static Softdevice, server: &Server, events: &EventChannel) -> ! {
    static ADV_DATA: ExtendedAdvertisementPayload = ExtendedAdvertisementBuilder::new()
        .flags(&[Flag::GeneralDiscovery, Flag::LE_Only])
        .services_128(ServiceList::Complete, &SERVICES_LIST)
        .short_name(SHORT_NAME)
        .build();

    static SCAN_DATA: ExtendedAdvertisementPayload = ExtendedAdvertisementBuilder::new().full_name(DEVICE_NAME).build();

    let adv = peripheral::ConnectableAdvertisement::ScannableUndirected {
        adv_data: &ADV_DATA,
        scan_data: &SCAN_DATA,
    };

    // Set advertising timer in units of 625us (about 50ms with 75 units)
    let config = peripheral::Config {
        interval: 75,
        ..Default::default()
    };

    loop {
        let conn = match peripheral::advertise_connectable(sd, adv, &config).await {
            Ok(conn) => conn,
            Err(e) => {
                error!("Advertising failed: {:?}", e);
                Timer::after_millis(500).await;
                continue;
            }
        };
        info!("advertising done!");

        events.send(TransportEvent::Connected(conn.clone())).await;

        let e = gatt_server::run(&conn, server, |e| server.handle_event(e, events)).await;
        info!("gatt_server run exited: {:?}", e);

        events.send(TransportEvent::Disconnected).await;
    }
}

impl Server {
    fn handle_event(&self, event: ServerEvent, events: &EventChannel) {
        match event {
            ServerEvent::Nus(e) => self.nus.handle(e, events),
        }
    }
}
