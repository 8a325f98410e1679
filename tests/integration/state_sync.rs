//! Snapshot synchronization in both directions.

use crate::integration::support::{test_session, Pair};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use widget_bridge::bridge::GuestEvent;
use widget_bridge::protocol::LogLevel;
use widget_bridge::sync::{ContextKey, Theme, ToolEvent, ToolStatus};

fn record(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[test]
fn test_setter_pushes_once_per_distinct_value() {
    let session = test_session();
    let pair = Pair::connect(&session, 1);
    let pushes = Arc::new(Mutex::new(0));
    let sink = pushes.clone();
    pair.guest.subscribe_context(move |_| *sink.lock() += 1);

    session.store().set_locale("pt-BR");
    session.store().set_locale("pt-BR");
    session.store().set_locale("pt-BR");
    pair.guest.pump();
    assert_eq!(*pushes.lock(), 1);
}

#[test]
fn test_guest_state_reaches_store_and_other_guests() {
    let session = test_session();
    let author = Pair::connect(&session, 1);
    let observer = Pair::connect(&session, 2);

    let host_seen = Arc::new(Mutex::new(Vec::new()));
    let sink = host_seen.clone();
    session
        .store()
        .subscribe(ContextKey::WidgetState, move |v| sink.lock().push(v.clone()));

    author
        .guest
        .set_state(Some(record(&[("tab", json!("settings"))])))
        .unwrap();
    author.instance.pump();

    assert_eq!(*host_seen.lock(), vec![json!({"tab": "settings"})]);

    // The author already holds the value; only the observer gets an update.
    assert_eq!(author.guest.pump(), 0);
    assert_eq!(observer.guest.pump(), 1);
    let expected = Some(record(&[("tab", json!("settings"))]));
    assert_eq!(author.guest.context().unwrap().widget_state, expected);
    assert_eq!(observer.guest.context().unwrap().widget_state, expected);
    assert_eq!(session.store().snapshot().widget_state, expected);
}

#[test]
fn test_setter_called_from_subscriber_keeps_guest_in_step() {
    let session = test_session();
    let pair = Pair::connect(&session, 1);
    let store = session.store().clone();
    session.store().subscribe(ContextKey::Theme, move |value| {
        if value == &json!("dark") {
            store.set_theme(Theme::Light);
        }
    });

    session.store().set_theme(Theme::Dark);
    pair.sync();

    assert_eq!(session.store().snapshot().theme, Theme::Light);
    assert_eq!(pair.guest.context().unwrap(), session.store().snapshot());
}

#[test]
fn test_tool_lifecycle_reaches_guest() {
    let session = test_session();
    let pair = Pair::connect(&session, 1);

    session
        .store()
        .ingest_tool(ToolEvent::Input(json!({"city": "Oslo"})));
    pair.guest.pump();
    let context = pair.guest.context().unwrap();
    assert_eq!(context.tool_input, Some(json!({"city": "Oslo"})));
    assert_eq!(context.tool_status, ToolStatus::InputReady);

    session
        .store()
        .ingest_tool(ToolEvent::Output(json!({"temp": 4})));
    pair.guest.pump();
    let context = pair.guest.context().unwrap();
    assert_eq!(context.tool_result, Some(json!({"temp": 4})));
    assert_eq!(context.tool_status, ToolStatus::Complete);
}

#[tokio::test]
async fn test_tool_call_round_trip() {
    let session = test_session();
    let pair = Pair::connect(&session, 1);

    let requests = Arc::new(Mutex::new(Vec::new()));
    let sink = requests.clone();
    pair.instance.events().subscribe(move |event| {
        if let GuestEvent::ToolCallRequested { call_id, name, args } = event {
            sink.lock().push((*call_id, name.clone(), args.clone()));
        }
    });

    let reply = pair
        .guest
        .call_tool("lookup", Some(record(&[("id", json!(42))])))
        .unwrap();
    pair.instance.pump();

    let (call_id, name, args) = requests.lock().remove(0);
    assert_eq!(name, "lookup");
    assert_eq!(args, Some(record(&[("id", json!(42))])));

    pair.instance
        .respond_tool_call(call_id, Ok(json!({"title": "Answer"})))
        .unwrap();
    pair.guest.pump();
    assert_eq!(reply.await.unwrap(), Ok(json!({"title": "Answer"})));
}

#[test]
fn test_guest_requests_surface_as_events() {
    let session = test_session();
    let pair = Pair::connect(&session, 1);
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    pair.instance
        .events()
        .subscribe(move |event| sink.lock().push(event.clone()));

    pair.guest.open_link("https://docs.example/help").unwrap();
    pair.guest.send_message("Show me more").unwrap();
    pair.guest.log(LogLevel::Warn, json!({"msg": "slow"})).unwrap();
    pair.instance.pump();

    assert_eq!(
        *events.lock(),
        vec![
            GuestEvent::OpenLinkRequested("https://docs.example/help".to_string()),
            GuestEvent::MessageRequested("Show me more".to_string()),
            GuestEvent::Log {
                level: LogLevel::Warn,
                data: json!({"msg": "slow"}),
            },
        ]
    );
}

#[test]
fn test_unsafe_link_is_dropped() {
    let session = test_session();
    let pair = Pair::connect(&session, 1);
    let count = Arc::new(Mutex::new(0));
    let sink = count.clone();
    pair.instance.events().subscribe(move |_| *sink.lock() += 1);

    pair.guest.open_link("javascript:alert(1)").unwrap();
    pair.instance.pump();
    assert_eq!(*count.lock(), 0);
}
