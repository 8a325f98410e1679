//! Shared test doubles: a recording guest frame, a recording parent window, and
//! a helper that drives a full ready/handshake exchange.

use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use widget_bridge::bridge::{GuestFrame, GuestInstance, HostSession, LinkState};
use widget_bridge::config::BridgeConfig;
use widget_bridge::guest::{GuestBridge, ParentWindow};
use widget_bridge::protocol::{Port, WindowId};

pub const HOST_ORIGIN: &str = "https://host.example";
pub const GUEST_ORIGIN: &str = "https://cdn.widgets.io";

/// Host-side view of a frame: records everything posted to it.
pub struct RecordingFrame {
    window: WindowId,
    posted: Mutex<Vec<(Value, Option<Port>)>>,
}

impl RecordingFrame {
    pub fn new(window: u64) -> Arc<Self> {
        Arc::new(Self {
            window: WindowId::new(window),
            posted: Mutex::new(Vec::new()),
        })
    }

    pub fn window(&self) -> WindowId {
        self.window
    }

    pub fn posted_count(&self) -> usize {
        self.posted.lock().len()
    }

    /// Remove the oldest posted message together with its transferred port.
    pub fn take_next(&self) -> Option<(Value, Option<Port>)> {
        let mut posted = self.posted.lock();
        if posted.is_empty() {
            None
        } else {
            Some(posted.remove(0))
        }
    }
}

impl GuestFrame for RecordingFrame {
    fn window_id(&self) -> WindowId {
        self.window
    }

    fn post_message(&self, message: Value, transfer: Option<Port>) {
        self.posted.lock().push((message, transfer));
    }
}

/// Guest-side view of the parent window.
#[derive(Default)]
pub struct RecordingParent {
    posted: Mutex<Vec<Value>>,
}

impl RecordingParent {
    pub fn take_all(&self) -> Vec<Value> {
        std::mem::take(&mut *self.posted.lock())
    }
}

impl ParentWindow for RecordingParent {
    fn post_message(&self, message: Value) {
        self.posted.lock().push(message);
    }
}

pub fn test_config() -> BridgeConfig {
    BridgeConfig {
        host_origin: Some(HOST_ORIGIN.to_string()),
        allowed_origins: vec![GUEST_ORIGIN.to_string()],
        ..BridgeConfig::default()
    }
}

pub fn test_session() -> HostSession {
    HostSession::new(test_config()).expect("valid test config")
}

/// One mounted guest with both sides of the bridge.
pub struct Pair {
    pub instance: Arc<GuestInstance>,
    pub frame: Arc<RecordingFrame>,
    pub guest: GuestBridge,
    pub parent: Arc<RecordingParent>,
}

impl Pair {
    /// Mount a frame without starting the handshake.
    pub fn mount(session: &HostSession, window: u64) -> Self {
        let frame = RecordingFrame::new(window);
        let instance = session.mount(frame.clone());
        let parent = Arc::new(RecordingParent::default());
        let guest = GuestBridge::new(Some(parent.clone() as Arc<dyn ParentWindow>));
        Self {
            instance,
            frame,
            guest,
            parent,
        }
    }

    /// Mount and run ready → handshake → handshake-complete. The guest has
    /// applied `init` when this returns.
    pub fn connect(session: &HostSession, window: u64) -> Self {
        let pair = Self::mount(session, window);
        pair.announce_ready(session);
        pair.accept_handshake();
        pair.instance.pump();
        assert_eq!(pair.instance.state(), LinkState::Connected);
        pair.guest.pump();
        pair
    }

    /// Guest sends `ready`; deliver it on the host's global path.
    pub fn announce_ready(&self, session: &HostSession) {
        self.guest.announce_ready().expect("parent present");
        self.deliver_global(session);
    }

    /// Deliver everything the guest posted to its parent.
    pub fn deliver_global(&self, session: &HostSession) {
        for message in self.parent.take_all() {
            session.route_window_message(GUEST_ORIGIN, self.frame.window(), &message);
        }
    }

    /// Hand the transferred port to the guest.
    pub fn accept_handshake(&self) {
        let (message, port) = self.frame.take_next().expect("handshake posted");
        assert_eq!(message, json!({"type": "handshake"}));
        self.guest
            .accept_handshake(&message, port.expect("port transferred"))
            .expect("handshake accepted");
    }

    /// Run one round: host reads the port, guest reads the port.
    pub fn sync(&self) {
        self.instance.pump();
        self.guest.pump();
    }
}
