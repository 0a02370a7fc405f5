// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

#![no_std]
#![no_main]
mod hw;
mod jump_app;
mod nus;
mod server;
mod service;
mod uicr;

use defmt_rtt as _;
// global logger
use embassy_nrf as _;
// time driver
use panic_probe as _;

use consts::{
    APP_MARKER, APP_MARKER_OFFSET, BASE_APP_ADDR, BASE_BOOTLOADER_ADDR, BOOT_POLL_INTERVAL_MS, BOOT_WAIT_MS, CHUNK_SIZE,
    FLASH_PAGE, IDENTITY_WORDS, MAX_MESSAGE_SIZE, WRITABLE_END_PAGE, WRITABLE_START_PAGE,
};
use core::pin::pin;
use defmt::{error, info};
use embassy_executor::Spawner;
use embassy_nrf::gpio::{Input, Pull};
use embassy_nrf::interrupt;
use embassy_time::Delay;
use jump_app::SoftdeviceRelocator;
use loader_core::{
    BootDecision, CommandEngine, ImageDescriptor, ImageSelector, LoaderContext, MemoryRegion, SelectorConfig,
    SystemMemory, VectorTableRelocator,
};
use nrf_softdevice::{Flash, Softdevice};
use server::Server;
use service::EventChannel;

const REGION: MemoryRegion = match MemoryRegion::new(WRITABLE_START_PAGE, WRITABLE_END_PAGE, FLASH_PAGE, CHUNK_SIZE) {
    Ok(region) => region,
    Err(_) => panic!("invalid writable flash region"),
};

const APPLICATION: ImageDescriptor = ImageDescriptor::at(BASE_APP_ADDR);
const LOADER: ImageDescriptor = ImageDescriptor::at(BASE_BOOTLOADER_ADDR);

const SELECTOR: SelectorConfig = SelectorConfig {
    window_ms: BOOT_WAIT_MS,
    interval_ms: BOOT_POLL_INTERVAL_MS,
    marker_offset: APP_MARKER_OFFSET,
    marker: APP_MARKER,
};

#[embassy_executor::task]
async fn softdevice_task(sd: &'static Softdevice) -> ! {
    info!("SD is running");
    sd.run().await
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let mut conf = embassy_nrf::config::Config::default();
    // The crystal is started below with a bounded wait
    conf.hfclk_source = embassy_nrf::config::HfclkSource::Internal;
    conf.lfclk_source = embassy_nrf::config::LfclkSource::ExternalXtal;

    conf.gpiote_interrupt_priority = interrupt::Priority::P2;
    conf.time_interrupt_priority = interrupt::Priority::P2;

    let p = embassy_nrf::init(conf);

    hw::take_reset_reason().log();

    let mut delay = Delay;
    hw::start_hfclk(&mut delay);

    // SAFETY: only flash and FICR words are read through it
    let memory = unsafe { SystemMemory::new() };

    let decision = {
        // Init the GPIOs used as bootloader trigger
        let boot_a = Input::new(p.P0_11, Pull::Up);
        let boot_b = Input::new(p.P0_12, Pull::Up);
        ImageSelector::new(boot_a, boot_b, &mut delay, SELECTOR).decide(&memory, &APPLICATION)
    };

    if decision == BootDecision::RunApplication {
        info!("Booting application at {:#x}", APPLICATION.entry_address);
        // SAFETY: the marker check found a vector table at the application base
        unsafe { jump_app::launch(&APPLICATION, &memory) }
    }

    info!("Staying in loader");

    // SoftDevice events have to reach the loader's own vector table
    if let Err(e) = SoftdeviceRelocator.relocate(LOADER.vector_table_base) {
        error!("Vector table relocation failed: {}", e);
    }

    let sd = server::initialize_sd();
    let server = Server::new(sd);
    let sd: &'static Softdevice = sd;

    if spawner.spawn(softdevice_task(sd)).is_err() {
        error!("Spawning the softdevice failed");
    }

    let server = match server {
        Ok(server) => server,
        Err(e) => {
            // The executor keeps the SoftDevice running, nothing is served
            error!("Creating the GATT server failed: {:?}", e);
            return;
        }
    };

    let mut flash = Flash::take(sd);
    let events = EventChannel::new();
    let mut context: LoaderContext<SystemMemory, MAX_MESSAGE_SIZE> =
        LoaderContext::new(CommandEngine::new(REGION, memory, IDENTITY_WORDS));

    let ble = server::run_bluetooth(sd, &server, &events);
    let loader = service::run_loader(&mut context, &mut flash, &server, &events);
    info!("Init tasks");

    futures::future::select(pin!(ble), pin!(loader)).await;
}
