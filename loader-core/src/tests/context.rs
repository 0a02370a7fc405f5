// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundation.xyz>
// SPDX-License-Identifier: GPL-3.0-or-later

use futures::executor::block_on;

use super::doubles::{FakeFlash, FakeMemory};
use super::{test_region, IDENTITY_WORDS};
use crate::context::{ConnectionHandle, Dispatch, InboundEvent, LoaderContext};
use crate::engine::CommandEngine;

type Context = LoaderContext<FakeMemory, 64>;

fn context() -> Context {
    LoaderContext::new(CommandEngine::new(test_region(), FakeMemory::default(), IDENTITY_WORDS))
}

fn dispatch(context: &mut Context, flash: &mut FakeFlash, event: InboundEvent<'_>) -> Dispatch<'static> {
    match block_on(context.dispatch(flash, event)) {
        Dispatch::Respond(bytes) => Dispatch::Respond(bytes.to_vec().leak()),
        Dispatch::Idle => Dispatch::Idle,
        Dispatch::Busy => Dispatch::Busy,
        Dispatch::NotConnected => Dispatch::NotConnected,
    }
}

#[test]
fn messages_need_a_client() {
    let mut context = context();
    let mut flash = FakeFlash::new(128 * 1024);

    assert_eq!(
        dispatch(&mut context, &mut flash, InboundEvent::MessageReceived(b"d\x60")),
        Dispatch::NotConnected
    );
    assert_eq!(flash.calls(), 0);
    assert!(!context.is_transmitting());
}

/// One reply at a time, the next message waits for the transmission.
#[test]
fn busy_until_transmission_completes() {
    let mut context = context();
    let mut flash = FakeFlash::new(128 * 1024);

    dispatch(&mut context, &mut flash, InboundEvent::Connected(ConnectionHandle(3)));
    assert_eq!(context.connection(), Some(ConnectionHandle(3)));

    assert_eq!(
        dispatch(&mut context, &mut flash, InboundEvent::MessageReceived(b"eping")),
        Dispatch::Respond(b"ping")
    );
    assert!(context.is_transmitting());

    assert_eq!(
        dispatch(&mut context, &mut flash, InboundEvent::MessageReceived(b"d\x60")),
        Dispatch::Busy
    );
    assert_eq!(flash.calls(), 0);

    assert_eq!(
        dispatch(&mut context, &mut flash, InboundEvent::TransmissionComplete),
        Dispatch::Idle
    );
    assert_eq!(
        dispatch(&mut context, &mut flash, InboundEvent::MessageReceived(b"d\x60")),
        Dispatch::Respond(b"d\x60OK")
    );
    assert_eq!(flash.erases.len(), 1);
}

/// A disconnect mid transmission leaves a clean state for the next client.
#[test]
fn disconnect_resets_state() {
    let mut context = context();
    let mut flash = FakeFlash::new(128 * 1024);

    dispatch(&mut context, &mut flash, InboundEvent::Connected(ConnectionHandle(1)));
    dispatch(&mut context, &mut flash, InboundEvent::MessageReceived(b"i"));
    assert!(context.is_transmitting());

    dispatch(&mut context, &mut flash, InboundEvent::Disconnected);
    assert_eq!(context.connection(), None);
    assert!(!context.is_transmitting());
    assert_eq!(
        dispatch(&mut context, &mut flash, InboundEvent::MessageReceived(b"i")),
        Dispatch::NotConnected
    );

    dispatch(&mut context, &mut flash, InboundEvent::Connected(ConnectionHandle(2)));
    assert_eq!(context.connection(), Some(ConnectionHandle(2)));
    assert!(matches!(
        dispatch(&mut context, &mut flash, InboundEvent::MessageReceived(b"i")),
        Dispatch::Respond(_)
    ));
}

#[test]
fn rejections_are_replies_too() {
    let mut context = context();
    let mut flash = FakeFlash::new(128 * 1024);

    dispatch(&mut context, &mut flash, InboundEvent::Connected(ConnectionHandle(1)));
    assert_eq!(
        dispatch(&mut context, &mut flash, InboundEvent::MessageReceived(b"d\x00")),
        Dispatch::Respond(b"! invalid page")
    );
    assert!(context.is_transmitting());
}
