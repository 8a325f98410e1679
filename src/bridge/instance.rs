//! Channel / Handshake Manager
//!
//! One [`GuestInstance`] per mounted frame. It owns the dedicated channel, the
//! outbound queue and the paint fence for that frame, and walks the lifecycle
//! `Created → AwaitingReady → Handshaking → Connected → Closed`.
//!
//! Inbound traffic arrives on two paths:
//! - the global window path ([`GuestInstance::handle_window_message`]), which
//!   only ever carries `ready` and, once connected, the urgent allow-list;
//! - the dedicated port ([`GuestInstance::handle_port_message`] / [`GuestInstance::pump`]).

use crate::bridge::fence::{FenceToken, FenceWait, PaintFence};
use crate::error::BridgeError;
use crate::protocol::channel::{MessageChannel, Port, WindowId};
use crate::protocol::message::{GuestMessage, HostMessage, LogLevel};
use crate::security::OriginValidator;
use crate::sync::{DisplayMode, PatchEvent, StateStore, SubscriptionId, Subscribers};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl InstanceId {
    pub fn new(raw: u64) -> Self {
        InstanceId(raw)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "guest-{}", self.0)
    }
}

/// The frame a guest document runs in, as seen from the host.
pub trait GuestFrame: Send + Sync {
    /// Handle compared against the sender of every inbound global-path message.
    fn window_id(&self) -> WindowId;

    /// Post on the frame's global message path, transferring `port` with it.
    fn post_message(&self, message: Value, transfer: Option<Port>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Created,
    AwaitingReady,
    Handshaking,
    Connected,
    Closed,
}

impl LinkState {
    pub fn as_str(self) -> &'static str {
        match self {
            LinkState::Created => "created",
            LinkState::AwaitingReady => "awaiting-ready",
            LinkState::Handshaking => "handshaking",
            LinkState::Connected => "connected",
            LinkState::Closed => "closed",
        }
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to an outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    Queued,
    Dropped,
}

/// Guest-originated events surfaced to host code.
#[derive(Debug, Clone, PartialEq)]
pub enum GuestEvent {
    Connected,
    DisplayModeRequested {
        requested: DisplayMode,
        /// Mode the store applied, or `None` when guest requests are not auto-applied.
        applied: Option<DisplayMode>,
    },
    StateChanged(Option<Map<String, Value>>),
    HeightChanged(f64),
    ToolCallRequested {
        call_id: u64,
        name: String,
        args: Option<Map<String, Value>>,
    },
    OpenLinkRequested(String),
    MessageRequested(String),
    Log {
        level: LogLevel,
        data: Value,
    },
    Closed,
}

struct InstanceInner {
    state: LinkState,
    port: Option<Port>,
    queue: VecDeque<HostMessage>,
}

pub struct GuestInstance {
    id: InstanceId,
    frame: Arc<dyn GuestFrame>,
    validator: Arc<OriginValidator>,
    store: Arc<StateStore>,
    apply_guest_requests: bool,
    inner: Mutex<InstanceInner>,
    fence: PaintFence,
    events: Subscribers<GuestEvent>,
    store_subscription: Mutex<Option<SubscriptionId>>,
}

impl GuestInstance {
    /// Create an instance in `Created`.
    pub fn new(
        id: InstanceId,
        frame: Arc<dyn GuestFrame>,
        validator: Arc<OriginValidator>,
        store: Arc<StateStore>,
        apply_guest_requests: bool,
    ) -> Arc<Self> {
        let instance = Arc::new(Self {
            id,
            frame,
            validator,
            store: store.clone(),
            apply_guest_requests,
            inner: Mutex::new(InstanceInner {
                state: LinkState::Created,
                port: None,
                queue: VecDeque::new(),
            }),
            fence: PaintFence::new(),
            events: Subscribers::new(),
            store_subscription: Mutex::new(None),
        });

        let weak: Weak<GuestInstance> = Arc::downgrade(&instance);
        let subscription = store.subscribe_patches(move |event| {
            if let Some(instance) = weak.upgrade() {
                instance.forward_patch(event);
            }
        });
        *instance.store_subscription.lock() = Some(subscription);
        instance
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn window_id(&self) -> WindowId {
        self.frame.window_id()
    }

    pub fn state(&self) -> LinkState {
        self.inner.lock().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == LinkState::Connected
    }

    pub fn queued_len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    pub fn events(&self) -> &Subscribers<GuestEvent> {
        &self.events
    }

    /// The frame has been attached; start listening for `ready`.
    ///
    /// The `init` snapshot goes to the front of the queue so it precedes every
    /// update once the queue drains.
    pub fn mount(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.state != LinkState::Created {
            warn!(instance = %self.id, state = %inner.state, "mount ignored");
            return false;
        }
        inner.queue.push_front(HostMessage::Init {
            context: self.store.snapshot(),
        });
        inner.state = LinkState::AwaitingReady;
        debug!(instance = %self.id, "awaiting ready");
        true
    }

    /// Entry point for the global window message path.
    pub fn handle_window_message(&self, origin: &str, sender: WindowId, data: &Value) {
        let state = self.state();
        if state == LinkState::Closed {
            trace!(instance = %self.id, "ignoring message after close");
            return;
        }
        if !self
            .validator
            .is_trusted_sender(origin, sender, self.frame.window_id())
        {
            return;
        }
        let message = match GuestMessage::parse(data) {
            Ok(message) => message,
            Err(err) => {
                warn!(instance = %self.id, origin, error = %err, "dropping malformed message");
                return;
            }
        };

        match (state, &message) {
            (LinkState::AwaitingReady, GuestMessage::Ready) => self.begin_handshake(),
            (LinkState::Connected, message) if message.is_urgent() => self.dispatch(message),
            (state, message) => warn!(
                instance = %self.id,
                state = %state,
                kind = message.kind(),
                "message not accepted on global path"
            ),
        }
    }

    /// Entry point for a message read from the dedicated port.
    pub fn handle_port_message(&self, data: &Value) {
        let state = self.state();
        if state == LinkState::Closed {
            trace!(instance = %self.id, "ignoring port message after close");
            return;
        }
        let message = match GuestMessage::parse(data) {
            Ok(message) => message,
            Err(err) => {
                warn!(instance = %self.id, error = %err, "dropping malformed port message");
                return;
            }
        };

        match (state, &message) {
            (LinkState::Handshaking, GuestMessage::HandshakeComplete) => self.complete_handshake(),
            (LinkState::Connected, GuestMessage::HandshakeComplete | GuestMessage::Ready) => {
                warn!(instance = %self.id, kind = message.kind(), "duplicate handshake message")
            }
            (LinkState::Connected, message) => self.dispatch(message),
            (state, message) => warn!(
                instance = %self.id,
                state = %state,
                kind = message.kind(),
                "port message before handshake completed"
            ),
        }
    }

    /// Process every message waiting on the dedicated port. Returns how many
    /// were read.
    pub fn pump(&self) -> usize {
        let pending = {
            let inner = self.inner.lock();
            match inner.port.as_ref() {
                Some(port) => port.drain(),
                None => Vec::new(),
            }
        };
        let count = pending.len();
        for value in &pending {
            self.handle_port_message(value);
        }
        count
    }

    /// Send now if connected, queue if the channel is not up yet, drop after close.
    pub fn send(&self, message: HostMessage) -> Delivery {
        let mut inner = self.inner.lock();
        match inner.state {
            LinkState::Connected => {
                let kind = message.kind();
                let sent = inner
                    .port
                    .as_ref()
                    .map(|port| port.post(message.to_value()));
                match sent {
                    Some(Ok(())) => Delivery::Sent,
                    _ => {
                        warn!(instance = %self.id, kind, "guest channel closed; message dropped");
                        Delivery::Dropped
                    }
                }
            }
            LinkState::Closed => {
                debug!(instance = %self.id, kind = message.kind(), "dropping message after close");
                Delivery::Dropped
            }
            _ => {
                inner.queue.push_back(message);
                Delivery::Queued
            }
        }
    }

    /// Wait for the guest to commit a frame that reflects everything sent so far.
    ///
    /// Resolves immediately when not connected. A later call supersedes this
    /// one, after which this future never completes.
    pub fn await_paint(&self) -> FenceWait {
        let inner = self.inner.lock();
        if inner.state != LinkState::Connected {
            return FenceWait::ready();
        }
        let Some(port) = inner.port.as_ref() else {
            return FenceWait::ready();
        };
        let (token, wait) = self.fence.begin();
        let request = HostMessage::FenceRequest {
            token: token.as_u64(),
        };
        if port.post(request.to_value()).is_err() {
            warn!(instance = %self.id, "guest channel closed; skipping paint fence");
            self.fence.abandon();
            return FenceWait::ready();
        }
        debug!(instance = %self.id, token = token.as_u64(), "paint fence requested");
        wait
    }

    /// Answer a guest `call-tool` request.
    pub fn respond_tool_call(
        &self,
        call_id: u64,
        result: Result<Value, String>,
    ) -> Result<(), BridgeError> {
        if !self.is_connected() {
            warn!(instance = %self.id, call_id, "tool result dropped; guest not connected");
            return Err(BridgeError::NotConnected);
        }
        let message = match result {
            Ok(value) => HostMessage::CallToolResult {
                call_id,
                ok: true,
                value: Some(value),
                error: None,
            },
            Err(error) => HostMessage::CallToolResult {
                call_id,
                ok: false,
                value: None,
                error: Some(error),
            },
        };
        match self.send(message) {
            Delivery::Sent => Ok(()),
            _ => Err(BridgeError::ChannelClosed),
        }
    }

    /// Tear down: release the channel, discard the queue, abandon any fence.
    pub fn close(&self) {
        let port = {
            let mut inner = self.inner.lock();
            if inner.state == LinkState::Closed {
                return;
            }
            inner.state = LinkState::Closed;
            let discarded = inner.queue.len();
            inner.queue.clear();
            if discarded > 0 {
                debug!(instance = %self.id, discarded, "discarded queued messages on close");
            }
            inner.port.take()
        };
        if let Some(port) = port {
            port.close();
        }
        self.fence.abandon();
        if let Some(subscription) = self.store_subscription.lock().take() {
            self.store.unsubscribe_patches(subscription);
        }
        info!(instance = %self.id, "guest instance closed");
        self.events.publish(&GuestEvent::Closed);
        self.events.clear();
    }

    fn begin_handshake(&self) {
        let (near, far) = MessageChannel::pair();
        {
            let mut inner = self.inner.lock();
            if inner.state != LinkState::AwaitingReady {
                return;
            }
            inner.port = Some(near);
            inner.state = LinkState::Handshaking;
        }
        info!(instance = %self.id, "guest ready; channel offered");
        self.frame
            .post_message(HostMessage::Handshake.to_value(), Some(far));
    }

    fn complete_handshake(&self) {
        let drained = {
            let mut inner = self.inner.lock();
            if inner.state != LinkState::Handshaking {
                return;
            }
            inner.state = LinkState::Connected;
            let queue: Vec<HostMessage> = inner.queue.drain(..).collect();
            let Some(port) = inner.port.as_ref() else {
                error!(instance = %self.id, "connected without a channel");
                return;
            };
            let mut delivered = 0usize;
            for message in &queue {
                if port.post(message.to_value()).is_err() {
                    break;
                }
                delivered += 1;
            }
            if delivered < queue.len() {
                warn!(
                    instance = %self.id,
                    undelivered = queue.len() - delivered,
                    "guest channel closed while draining queue"
                );
            }
            delivered
        };
        info!(instance = %self.id, drained, "guest connected");
        self.events.publish(&GuestEvent::Connected);
    }

    fn forward_patch(&self, event: &PatchEvent) {
        if event.origin == Some(self.id) {
            return;
        }
        self.send(HostMessage::Update {
            patch: event.patch.clone(),
        });
    }

    fn dispatch(&self, message: &GuestMessage) {
        match message {
            GuestMessage::FenceAck { token } => {
                if self.fence.resolve(FenceToken::new(*token)) {
                    debug!(instance = %self.id, token, "paint fence resolved");
                } else {
                    debug!(instance = %self.id, token, "ignoring stale fence ack");
                }
            }
            GuestMessage::RequestDisplayMode { mode } => {
                let applied = self
                    .apply_guest_requests
                    .then(|| self.store.set_display_mode(*mode));
                self.events.publish(&GuestEvent::DisplayModeRequested {
                    requested: *mode,
                    applied,
                });
            }
            GuestMessage::SetState { value } => {
                self.store.ingest_app_state(self.id, value.clone());
                self.events.publish(&GuestEvent::StateChanged(value.clone()));
            }
            GuestMessage::NotifyHeight { pixels } => {
                self.events.publish(&GuestEvent::HeightChanged(*pixels));
            }
            GuestMessage::CallTool {
                call_id,
                name,
                args,
            } => {
                debug!(instance = %self.id, call_id, tool = %name, "guest tool call");
                self.events.publish(&GuestEvent::ToolCallRequested {
                    call_id: *call_id,
                    name: name.clone(),
                    args: args.clone(),
                });
            }
            GuestMessage::OpenLink { url } => {
                self.events
                    .publish(&GuestEvent::OpenLinkRequested(url.clone()));
            }
            GuestMessage::SendMessage { content } => {
                self.events
                    .publish(&GuestEvent::MessageRequested(content.clone()));
            }
            GuestMessage::Log { level, data } => {
                self.replay_log(*level, data);
                self.events.publish(&GuestEvent::Log {
                    level: *level,
                    data: data.clone(),
                });
            }
            GuestMessage::Ready | GuestMessage::HandshakeComplete => {}
        }
    }

    fn replay_log(&self, level: LogLevel, data: &Value) {
        let instance = self.id.to_string();
        match level {
            LogLevel::Trace => trace!(target: "widget_bridge::guest", %instance, %data),
            LogLevel::Debug => debug!(target: "widget_bridge::guest", %instance, %data),
            LogLevel::Info => info!(target: "widget_bridge::guest", %instance, %data),
            LogLevel::Warn => warn!(target: "widget_bridge::guest", %instance, %data),
            LogLevel::Error => error!(target: "widget_bridge::guest", %instance, %data),
        }
    }
}

impl fmt::Debug for GuestInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuestInstance")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}
