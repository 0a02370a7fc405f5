// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundation.xyz>
// SPDX-License-Identifier: GPL-3.0-or-later

mod client;
mod image;
mod link;

use btleplug::api::{Central, Manager as _};
use btleplug::platform::{Adapter, Manager};
use clap::{Parser, Subcommand};
use client::Client;
use consts::{CHUNK_SIZE, FLASH_PAGE, WRITABLE_END_PAGE, WRITABLE_START_PAGE};
use link::BleLink;
use loader_core::MemoryRegion;
use std::error::Error;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(about = "Maintenance client for the BLE loader")]
struct Args {
    #[arg(short, long, default_value_t = String::from("hci0"))]
    adapter: String,
    /// Advertised name of the loader
    #[arg(short, long, default_value_t = String::from(consts::SHORT_NAME))]
    name: String,
    /// Seconds to scan for the loader
    #[arg(long, default_value_t = 30)]
    scan_timeout: u64,
    /// Seconds to wait for each reply
    #[arg(long, default_value_t = 5)]
    reply_timeout: u64,
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// List the available bluetooth adapters
    ListAdapters,
    /// Print the device identity block
    Info,
    /// Send a hex payload and print what comes back
    Echo { payload: HexBytes },
    Erase { page: u8 },
    Read { page: u8, chunk: u8 },
    /// Write 16 hex encoded bytes
    Write { page: u8, chunk: u8, data: HexBytes },
    /// Print a whole page
    Dump { page: u8 },
    /// Program an application image and verify it
    Flash {
        file: PathBuf,
        #[arg(long, default_value_t = WRITABLE_START_PAGE as u8)]
        start_page: u8,
    },
}

/// Bytes given on the command line as hex digits.
#[derive(Debug, Clone, PartialEq, Eq)]
struct HexBytes(Vec<u8>);

#[derive(Debug, PartialEq, Eq)]
enum HexError {
    OddLength,
    InvalidDigit(usize),
}

impl fmt::Display for HexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OddLength => f.write_str("odd number of hex digits"),
            Self::InvalidDigit(at) => write!(f, "invalid hex digit at position {at}"),
        }
    }
}

impl Error for HexError {}

impl FromStr for HexBytes {
    type Err = HexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s).as_bytes();
        if digits.len() % 2 != 0 {
            return Err(HexError::OddLength);
        }
        digits
            .chunks_exact(2)
            .enumerate()
            .map(|(i, pair)| {
                std::str::from_utf8(pair)
                    .ok()
                    .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                    .ok_or(HexError::InvalidDigit(2 * i))
            })
            .collect::<Result<_, _>>()
            .map(HexBytes)
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn region() -> Result<MemoryRegion, Box<dyn Error>> {
    MemoryRegion::new(WRITABLE_START_PAGE, WRITABLE_END_PAGE, FLASH_PAGE, CHUNK_SIZE).map_err(|e| e.to_string().into())
}

/// Connect to the wanted adapter or the first one by default.
async fn select_adapter(adapter_list: Vec<Adapter>, wanted: &str) -> Result<Adapter, Box<dyn Error>> {
    for adapter in adapter_list.iter() {
        if let Ok(info) = adapter.adapter_info().await {
            if info.contains(wanted) {
                println!("Wanted adapter found: {}", info);
                return Ok(adapter.clone());
            }
        }
    }
    let first = adapter_list.into_iter().next().ok_or("No Bluetooth adapters found")?;
    println!(
        "Wanted adapter not found, using first available one: {}",
        first.adapter_info().await?
    );
    Ok(first)
}

async fn run(client: &mut Client<BleLink>, command: Cmd) -> Result<(), Box<dyn Error>> {
    match command {
        Cmd::ListAdapters => {}
        Cmd::Info => println!("Identity: {}", to_hex(&client.device_info().await?)),
        Cmd::Echo { payload } => println!("{}", to_hex(&client.echo(&payload.0).await?)),
        Cmd::Erase { page } => {
            client.erase_page(page).await?;
            println!("Page {page} erased");
        }
        Cmd::Read { page, chunk } => println!("{}", to_hex(&client.read_chunk(page, chunk).await?)),
        Cmd::Write { page, chunk, data } => {
            let payload: [u8; loader_core::CHUNK_SIZE] = data
                .0
                .as_slice()
                .try_into()
                .map_err(|_| format!("a chunk is {} bytes, got {}", loader_core::CHUNK_SIZE, data.0.len()))?;
            client.write_chunk(page, chunk, payload).await?;
            println!("Chunk {chunk} of page {page} written");
        }
        Cmd::Dump { page } => {
            let bytes = client.dump_page(page).await?;
            for (index, line) in bytes.chunks(loader_core::CHUNK_SIZE).enumerate() {
                let address = page as usize * FLASH_PAGE as usize + index * loader_core::CHUNK_SIZE;
                println!("{address:08x}: {}", to_hex(line));
            }
        }
        Cmd::Flash { file, start_page } => {
            let image = tokio::fs::read(&file).await?;
            println!("Flashing {} ({} bytes) at page {start_page}", file.display(), image.len());
            let crc = client.flash_image(&image, start_page).await?;
            println!("Done, CRC-32 {crc:#010x}");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    pretty_env_logger::init();

    let args = Args::parse();

    let manager = Manager::new().await?;
    let adapter_list = manager.adapters().await?;
    if adapter_list.is_empty() {
        eprintln!("No Bluetooth adapters found");
    }
    if let Cmd::ListAdapters = args.command {
        println!("List of available bluetooth adapters:");
        for adapter in adapter_list.iter() {
            println!("- {}", adapter.adapter_info().await?);
        }
        return Ok(());
    }

    let central = select_adapter(adapter_list, &args.adapter).await?;
    let link = BleLink::connect(
        &central,
        &args.name,
        Duration::from_secs(args.scan_timeout),
        Duration::from_secs(args.reply_timeout),
    )
    .await?;

    let mut client = Client::new(link, region()?);
    let result = run(&mut client, args.command).await;
    client.into_inner().disconnect().await?;
    result
}
