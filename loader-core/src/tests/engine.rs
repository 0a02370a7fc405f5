// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundation.xyz>
// SPDX-License-Identifier: GPL-3.0-or-later

use futures::executor::block_on;
use heapless::Vec;

use super::doubles::{FakeFlash, FakeMemory};
use super::{test_region, IDENTITY_WORDS};
use crate::engine::CommandEngine;
use crate::region::MemoryRegion;

const FLASH_BYTES: usize = 128 * 1024;

fn engine() -> CommandEngine<FakeMemory> {
    let memory = FakeMemory::default()
        .with_word(0x1000_0060, 0x0102_0304)
        .with_word(0x1000_0064, 0xA0B0_C0D0)
        .with_word(0x1000_00A4, 0xDEAD_BEEF);
    CommandEngine::new(test_region(), memory, IDENTITY_WORDS)
}

fn run(engine: &CommandEngine<FakeMemory>, flash: &mut FakeFlash, message: &[u8]) -> std::vec::Vec<u8> {
    let mut scratch: Vec<u8, 64> = Vec::new();
    block_on(engine.handle(flash, message, &mut scratch)).to_vec()
}

fn write_message(page: u8, chunk: u8, payload: [u8; 16]) -> std::vec::Vec<u8> {
    let mut message = vec![b'w', page, chunk];
    message.extend_from_slice(&payload);
    message
}

/// A chunk written into an erased page reads back unchanged.
#[test]
fn write_then_read_back() {
    let engine = engine();
    let mut flash = FakeFlash::new(FLASH_BYTES);
    let payload: [u8; 16] = core::array::from_fn(|i| i as u8 * 3);

    assert_eq!(run(&engine, &mut flash, &write_message(96, 1, payload)), b"w\x60\x01OK");
    assert_eq!(flash.writes, [(0x18010, payload.to_vec())]);

    let reply = run(&engine, &mut flash, b"r\x60\x01");
    assert_eq!(&reply[..3], b"r\x60\x01");
    assert_eq!(&reply[3..], &payload);
}

/// Erase covers exactly one page and leaves it blank.
#[test]
fn erase_blanks_exactly_one_page() {
    let engine = engine();
    let mut flash = FakeFlash::new(FLASH_BYTES);
    flash.fill(0x17C00, &[0u8; 0x1000]);

    assert_eq!(run(&engine, &mut flash, b"d\x61"), b"d\x61OK");
    assert_eq!(flash.erases, [(0x18400, 0x18800)]);
    assert!(flash.data[0x18400..0x18800].iter().all(|b| *b == 0xFF));
    assert!(flash.data[0x17C00..0x18400].iter().all(|b| *b == 0));
    assert!(flash.data[0x18800..0x18C00].iter().all(|b| *b == 0));

    let reply = run(&engine, &mut flash, b"r\x61\x05");
    assert_eq!(&reply[3..], &[0xFF; 16]);
}

#[test]
fn write_then_read_first_chunk() {
    let engine = engine();
    let mut flash = FakeFlash::new(FLASH_BYTES);
    let payload: [u8; 16] = core::array::from_fn(|i| i as u8 + 1);

    assert_eq!(run(&engine, &mut flash, &write_message(96, 0, payload)), b"w\x60\x00OK");

    let mut expected = b"r\x60\x00".to_vec();
    expected.extend_from_slice(&payload);
    assert_eq!(run(&engine, &mut flash, b"r\x60\x00"), expected);
}

/// Every chunk of the first and last region page keeps its own payload.
#[test]
fn every_chunk_reads_back_on_boundary_pages() {
    let engine = engine();
    let mut flash = FakeFlash::new(FLASH_BYTES);
    let payload = |page: u8, chunk: u8| -> [u8; 16] { core::array::from_fn(|i| page ^ chunk.wrapping_mul(7) ^ i as u8) };

    for page in [96, 107] {
        for chunk in 0..64 {
            assert_eq!(
                run(&engine, &mut flash, &write_message(page, chunk, payload(page, chunk))),
                [b'w', page, chunk, b'O', b'K']
            );
        }
    }
    for page in [96, 107] {
        for chunk in 0..64 {
            let reply = run(&engine, &mut flash, &[b'r', page, chunk]);
            assert_eq!(&reply[..3], &[b'r', page, chunk]);
            assert_eq!(&reply[3..], &payload(page, chunk), "page {page} chunk {chunk}");
        }
    }
    assert_eq!(flash.writes.len(), 128);
}

#[test]
fn erased_page_reads_blank_in_every_chunk() {
    let engine = engine();
    let mut flash = FakeFlash::new(FLASH_BYTES);
    flash.fill(0x18400, &[0x42; 0x400]);

    assert_eq!(run(&engine, &mut flash, b"d\x61"), b"d\x61OK");
    for chunk in 0..64 {
        let reply = run(&engine, &mut flash, &[b'r', 0x61, chunk]);
        assert_eq!(&reply[3..], &[0xFF; 16], "chunk {chunk}");
    }
}

/// With 4 KiB pages a u8 chunk index never leaves the page.
#[test]
fn chunk_index_in_range_on_4k_pages() {
    let region = MemoryRegion::new(25, 38, 4096, 16).unwrap();
    let engine = CommandEngine::new(region, FakeMemory::default(), IDENTITY_WORDS);
    let mut flash = FakeFlash::new(FLASH_BYTES);

    assert_eq!(run(&engine, &mut flash, &write_message(25, 255, [0x3C; 16])), b"w\x19\xffOK");
    assert_eq!(flash.writes, [(25 * 4096 + 255 * 16, vec![0x3C; 16])]);

    let reply = run(&engine, &mut flash, b"r\x19\xff");
    assert_eq!(&reply[3..], &[0x3C; 16]);
}

/// Pages outside the region never reach the flash.
#[test]
fn erase_outside_region_is_rejected() {
    let engine = engine();
    let mut flash = FakeFlash::new(FLASH_BYTES);

    assert_eq!(run(&engine, &mut flash, b"d\x5f"), b"! invalid page");
    assert_eq!(run(&engine, &mut flash, b"d\x6c"), b"! invalid page");
    assert_eq!(run(&engine, &mut flash, &write_message(95, 0, [0; 16])), b"! invalid page");
    assert_eq!(run(&engine, &mut flash, b"r\x6c\x00"), b"! invalid page");
    assert_eq!(flash.calls(), 0);
}

/// Only the twelve region pages can be erased out of all page values.
#[test]
fn every_page_value() {
    let engine = engine();
    let mut flash = FakeFlash::new(FLASH_BYTES);

    for page in 0..=u8::MAX {
        let reply = run(&engine, &mut flash, &[b'd', page]);
        if (96..108).contains(&page) {
            assert_eq!(reply, [b'd', page, b'O', b'K'], "page {page}");
        } else {
            assert_eq!(reply, b"! invalid page", "page {page}");
        }
    }
    assert_eq!(flash.erases.len(), 12);
}

#[test]
fn write_chunk_window() {
    let engine = engine();
    let mut flash = FakeFlash::new(FLASH_BYTES);

    assert_eq!(run(&engine, &mut flash, &write_message(96, 63, [0x5A; 16])), b"w\x60\x3fOK");
    assert_eq!(run(&engine, &mut flash, &write_message(96, 64, [0x5A; 16])), b"! invalid chunk");
    assert_eq!(flash.writes.len(), 1);
}

/// Reads may reach into the following page, writes may not.
#[test]
fn read_chunk_window_spans_two_pages() {
    let engine = engine();
    let mut flash = FakeFlash::new(FLASH_BYTES);
    flash.fill(0x18400 + 63 * 16, &[0x77; 16]);

    let reply = run(&engine, &mut flash, b"r\x60\x7f");
    assert_eq!(&reply[..3], b"r\x60\x7f");
    assert_eq!(&reply[3..], &[0x77; 16]);
    assert_eq!(flash.reads, [(0x18000 + 127 * 16, 16)]);

    assert_eq!(run(&engine, &mut flash, b"r\x60\x80"), b"! invalid chunk");
    assert_eq!(flash.reads.len(), 1);
}

/// Messages of the wrong length are refused before any flash access.
#[test]
fn length_mismatch_touches_nothing() {
    let engine = engine();
    let mut flash = FakeFlash::new(FLASH_BYTES);

    for message in [&b"d"[..], &b"d\x60\x00"[..], &b"r\x60"[..], &b"w\x60\x00\x01"[..], &b"i\x00"[..]] {
        assert_eq!(run(&engine, &mut flash, message), b"! invalid args", "{message:?}");
    }
    let mut long_write = write_message(96, 0, [0; 16]);
    long_write.push(0);
    assert_eq!(run(&engine, &mut flash, &long_write), b"! invalid args");
    assert_eq!(flash.calls(), 0);
}

#[test]
fn unknown_and_empty_messages() {
    let engine = engine();
    let mut flash = FakeFlash::new(FLASH_BYTES);

    assert_eq!(run(&engine, &mut flash, b"z\x60"), b"! Unknown Cmd");
    assert_eq!(run(&engine, &mut flash, b""), b"! Unknown Cmd");
    assert_eq!(flash.calls(), 0);
}

#[test]
fn echo_returns_payload() {
    let engine = engine();
    let mut flash = FakeFlash::new(FLASH_BYTES);

    for len in 1..=64usize {
        let payload: std::vec::Vec<u8> = (0..len).map(|i| (i * 7) as u8).collect();
        let mut message = vec![b'e'];
        message.extend_from_slice(&payload);
        assert_eq!(run(&engine, &mut flash, &message), payload, "len {len}");
    }
    assert_eq!(run(&engine, &mut flash, b"e"), b"");
}

/// An echo larger than the reply buffer is refused.
#[test]
fn echo_larger_than_buffer() {
    let engine = engine();
    let mut flash = FakeFlash::new(FLASH_BYTES);
    let mut scratch: Vec<u8, 20> = Vec::new();

    let mut message = vec![b'e'];
    message.extend_from_slice(&[0x33; 20]);
    assert_eq!(block_on(engine.handle(&mut flash, &message, &mut scratch)), &[0x33; 20]);

    message.push(0x33);
    assert_eq!(block_on(engine.handle(&mut flash, &message, &mut scratch)), b"! invalid args");
}

/// Identity words are sent most significant byte first.
#[test]
fn device_info_is_big_endian() {
    let engine = engine();
    let mut flash = FakeFlash::new(FLASH_BYTES);

    assert_eq!(
        run(&engine, &mut flash, b"i"),
        [b'i', 0x01, 0x02, 0x03, 0x04, 0xA0, 0xB0, 0xC0, 0xD0, 0xDE, 0xAD, 0xBE, 0xEF]
    );
    assert_eq!(flash.calls(), 0);
}

#[cfg(not(feature = "legacy-flash-ack"))]
#[test]
fn flash_failures_are_reported() {
    use embedded_storage::nor_flash::NorFlashErrorKind;

    let engine = engine();
    let mut flash = FakeFlash::new(FLASH_BYTES);
    flash.fail_with = Some(NorFlashErrorKind::Other);

    assert_eq!(run(&engine, &mut flash, b"d\x60"), b"! flash error");
    assert_eq!(run(&engine, &mut flash, &write_message(96, 0, [0; 16])), b"! flash error");
    assert_eq!(run(&engine, &mut flash, b"r\x60\x00"), b"! flash error");
    assert_eq!(flash.calls(), 3);
}

#[cfg(feature = "legacy-flash-ack")]
#[test]
fn flash_failures_are_acknowledged() {
    use embedded_storage::nor_flash::NorFlashErrorKind;

    let engine = engine();
    let mut flash = FakeFlash::new(FLASH_BYTES);
    flash.fail_with = Some(NorFlashErrorKind::Other);

    assert_eq!(run(&engine, &mut flash, b"d\x60"), b"d\x60OK");
    assert_eq!(run(&engine, &mut flash, &write_message(96, 0, [0; 16])), b"w\x60\x00OK");
}
