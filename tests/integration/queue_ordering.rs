//! Outbound queue: FIFO drain on connect, no overtaking.

use crate::integration::support::{test_session, Pair};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use widget_bridge::bridge::{Delivery, GuestEvent, LinkState};
use widget_bridge::protocol::HostMessage;
use widget_bridge::sync::{ContextKey, ContextPatch, Theme};

fn update(key: ContextKey, value: Value) -> HostMessage {
    let mut patch = ContextPatch::new();
    patch.insert(key, value);
    HostMessage::Update { patch }
}

#[test]
fn test_queued_messages_drain_in_order_after_init() {
    let session = test_session();
    let pair = Pair::mount(&session, 1);

    let m1 = update(ContextKey::Locale, json!("fr-FR"));
    let m2 = update(ContextKey::Locale, json!("de-DE"));
    let m3 = update(ContextKey::Locale, json!("ja-JP"));
    assert_eq!(pair.instance.send(m1.clone()), Delivery::Queued);
    pair.announce_ready(&session);
    assert_eq!(pair.instance.send(m2.clone()), Delivery::Queued);
    assert_eq!(pair.instance.send(m3.clone()), Delivery::Queued);
    assert_eq!(pair.instance.queued_len(), 4);

    // Read the host's side of the wire directly instead of through the guest.
    let (message, port) = pair.frame.take_next().unwrap();
    assert_eq!(message["type"], "handshake");
    let guest_port = port.unwrap();
    guest_port.post(json!({"type": "handshake-complete"})).unwrap();
    pair.instance.pump();

    let delivered = guest_port.drain();
    assert_eq!(delivered.len(), 4);
    assert_eq!(delivered[0]["type"], "init");
    assert_eq!(delivered[1], m1.to_value());
    assert_eq!(delivered[2], m2.to_value());
    assert_eq!(delivered[3], m3.to_value());
    assert_eq!(pair.instance.queued_len(), 0);
}

#[test]
fn test_guest_sees_final_state_after_queued_changes() {
    let session = test_session();
    let pair = Pair::mount(&session, 1);
    session.store().set_theme(Theme::Dark);
    session.store().set_locale("es-ES");
    session.store().set_theme(Theme::Light);

    pair.announce_ready(&session);
    pair.accept_handshake();
    pair.sync();

    let context = pair.guest.context().unwrap();
    assert_eq!(context, session.store().snapshot());
    assert_eq!(context.locale, "es-ES");
}

#[test]
fn test_urgent_message_cannot_overtake_before_connect() {
    let session = test_session();
    let pair = Pair::mount(&session, 1);
    let heights = Arc::new(Mutex::new(Vec::new()));
    let sink = heights.clone();
    pair.instance.events().subscribe(move |event| {
        if let GuestEvent::HeightChanged(px) = event {
            sink.lock().push(*px);
        }
    });

    pair.announce_ready(&session);
    pair.guest.notify_height(240.0).unwrap();
    pair.deliver_global(&session);
    assert!(heights.lock().is_empty());

    pair.accept_handshake();
    pair.instance.pump();
    pair.guest.notify_height(480.0).unwrap();
    pair.deliver_global(&session);
    assert_eq!(*heights.lock(), vec![480.0]);
}

#[test]
fn test_messages_before_handshake_complete_are_ignored() {
    let session = test_session();
    let pair = Pair::mount(&session, 1);
    pair.announce_ready(&session);
    let (_, port) = pair.frame.take_next().unwrap();
    let guest_port = port.unwrap();

    guest_port
        .post(json!({"type": "set-state", "value": {"early": true}}))
        .unwrap();
    guest_port.post(json!({"type": "handshake-complete"})).unwrap();
    pair.instance.pump();

    assert_eq!(pair.instance.state(), LinkState::Connected);
    assert_eq!(session.store().get(ContextKey::WidgetState), Value::Null);
}

#[test]
fn test_queue_discarded_on_close() {
    let session = test_session();
    let pair = Pair::mount(&session, 1);
    session.store().set_locale("it-IT");
    assert_eq!(pair.instance.queued_len(), 2);

    session.unmount(pair.instance.id());
    assert_eq!(pair.instance.queued_len(), 0);
    assert_eq!(
        pair.instance.send(HostMessage::Handshake),
        Delivery::Dropped
    );

    pair.announce_ready(&session);
    assert_eq!(pair.instance.state(), LinkState::Closed);
    assert_eq!(pair.frame.posted_count(), 0);
}
