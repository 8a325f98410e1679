//! Guest runtime
//!
//! [`GuestBridge`] is the capability object guest code holds. It announces
//! `ready` to the parent, accepts the transferred port, keeps a read-only copy
//! of the host snapshot, acknowledges paint fences on frame boundaries and
//! exposes the guest → host calls.

use crate::error::BridgeError;
use crate::protocol::channel::Port;
use crate::protocol::message::{GuestMessage, HostMessage, LogLevel};
use crate::sync::{ContextSnapshot, DisplayMode, SubscriptionId, Subscribers};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// The guest's parent window: the global message path back to the host.
pub trait ParentWindow: Send + Sync {
    fn post_message(&self, message: Value);
}

/// Reply to a `call-tool` request: the tool's value or the host's error text.
pub type ToolReply = Result<Value, String>;

struct GuestInner {
    port: Option<Port>,
    context: Option<ContextSnapshot>,
    pending_acks: Vec<u64>,
    next_call_id: u64,
    calls: HashMap<u64, oneshot::Sender<ToolReply>>,
}

pub struct GuestBridge {
    parent: Option<std::sync::Arc<dyn ParentWindow>>,
    inner: Mutex<GuestInner>,
    context_subscribers: Subscribers<ContextSnapshot>,
}

impl GuestBridge {
    /// `parent` is `None` when the guest runs outside any host.
    pub fn new(parent: Option<std::sync::Arc<dyn ParentWindow>>) -> Self {
        Self {
            parent,
            inner: Mutex::new(GuestInner {
                port: None,
                context: None,
                pending_acks: Vec::new(),
                next_call_id: 1,
                calls: HashMap::new(),
            }),
            context_subscribers: Subscribers::new(),
        }
    }

    pub fn has_host(&self) -> bool {
        self.parent.is_some()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.lock().port.is_some()
    }

    /// Latest snapshot received from the host.
    pub fn context(&self) -> Option<ContextSnapshot> {
        self.inner.lock().context.clone()
    }

    /// Called with the full snapshot after every `init` or `update`.
    pub fn subscribe_context<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ContextSnapshot) + Send + Sync + 'static,
    {
        self.context_subscribers.subscribe(callback)
    }

    pub fn unsubscribe_context(&self, id: SubscriptionId) -> bool {
        self.context_subscribers.unsubscribe(id)
    }

    pub fn announce_ready(&self) -> Result<(), BridgeError> {
        self.post_global(GuestMessage::Ready)
    }

    /// Take the port that arrived with a `handshake` message and confirm it.
    pub fn accept_handshake(&self, message: &Value, port: Port) -> Result<(), BridgeError> {
        if HostMessage::parse(message)? != HostMessage::Handshake {
            return Err(BridgeError::malformed("expected handshake"));
        }
        let mut inner = self.inner.lock();
        if inner.port.is_some() {
            warn!("ignoring second handshake");
            return Err(BridgeError::malformed("already connected"));
        }
        port.post(GuestMessage::HandshakeComplete.to_value())?;
        inner.port = Some(port);
        debug!("handshake complete");
        Ok(())
    }

    /// Apply one message read from the port.
    pub fn handle_port_message(&self, data: &Value) -> Result<(), BridgeError> {
        let message = HostMessage::parse(data)?;
        match message {
            HostMessage::Init { context } => {
                self.inner.lock().context = Some(context.clone());
                self.context_subscribers.publish(&context);
            }
            HostMessage::Update { patch } => {
                let updated = {
                    let mut inner = self.inner.lock();
                    let Some(context) = inner.context.as_mut() else {
                        warn!("update before init ignored");
                        return Ok(());
                    };
                    context.apply(&patch)?;
                    context.clone()
                };
                self.context_subscribers.publish(&updated);
            }
            HostMessage::FenceRequest { token } => {
                self.inner.lock().pending_acks.push(token);
            }
            HostMessage::CallToolResult {
                call_id,
                ok,
                value,
                error,
            } => {
                let waiter = self.inner.lock().calls.remove(&call_id);
                let Some(waiter) = waiter else {
                    warn!(call_id, "tool result for unknown call");
                    return Ok(());
                };
                let reply = if ok {
                    Ok(value.unwrap_or(Value::Null))
                } else {
                    Err(error.unwrap_or_else(|| "tool call failed".to_string()))
                };
                // The caller may have stopped waiting.
                let _ = waiter.send(reply);
            }
            HostMessage::Handshake => {
                return Err(BridgeError::malformed("handshake on established channel"));
            }
        }
        Ok(())
    }

    /// Process every message waiting on the port. Malformed entries are logged
    /// and skipped.
    pub fn pump(&self) -> usize {
        let pending = match self.inner.lock().port.as_ref() {
            Some(port) => port.drain(),
            None => Vec::new(),
        };
        for value in &pending {
            if let Err(err) = self.handle_port_message(value) {
                warn!(error = %err, "dropping host message");
            }
        }
        pending.len()
    }

    /// Frame boundary: acknowledge every fence requested before it. Returns the
    /// number of acks sent.
    pub fn on_animation_frame(&self) -> usize {
        let mut inner = self.inner.lock();
        let tokens = std::mem::take(&mut inner.pending_acks);
        let Some(port) = inner.port.as_ref() else {
            return 0;
        };
        tokens
            .into_iter()
            .filter(|token| {
                port.post(GuestMessage::FenceAck { token: *token }.to_value())
                    .is_ok()
            })
            .count()
    }

    /// Ask the host to run a tool. The receiver yields the host's reply.
    pub fn call_tool(
        &self,
        name: &str,
        args: Option<Map<String, Value>>,
    ) -> Result<oneshot::Receiver<ToolReply>, BridgeError> {
        if name.trim().is_empty() {
            return Err(BridgeError::malformed("tool name is empty"));
        }
        let mut inner = self.inner.lock();
        let call_id = inner.next_call_id;
        let port = inner.port.as_ref().ok_or(BridgeError::HostUnavailable)?;
        port.post(
            GuestMessage::CallTool {
                call_id,
                name: name.to_string(),
                args,
            }
            .to_value(),
        )?;
        let (tx, rx) = oneshot::channel();
        inner.next_call_id += 1;
        inner.calls.insert(call_id, tx);
        Ok(rx)
    }

    pub fn request_display_mode(&self, mode: DisplayMode) -> Result<(), BridgeError> {
        self.post_port(GuestMessage::RequestDisplayMode { mode })
    }

    /// Share app state with the host. The local snapshot takes the value at
    /// once, since the host does not echo it back to its author.
    pub fn set_state(&self, value: Option<Map<String, Value>>) -> Result<(), BridgeError> {
        let updated = {
            let mut inner = self.inner.lock();
            let port = inner.port.as_ref().ok_or(BridgeError::HostUnavailable)?;
            port.post(GuestMessage::SetState { value: value.clone() }.to_value())?;
            inner.context.as_mut().and_then(|context| {
                if context.widget_state == value {
                    return None;
                }
                context.widget_state = value;
                Some(context.clone())
            })
        };
        if let Some(context) = updated {
            self.context_subscribers.publish(&context);
        }
        Ok(())
    }

    /// Report intrinsic height. Travels on the global path so it is not held
    /// behind channel traffic.
    pub fn notify_height(&self, pixels: f64) -> Result<(), BridgeError> {
        self.post_global(GuestMessage::NotifyHeight { pixels })
    }

    pub fn open_link(&self, url: &str) -> Result<(), BridgeError> {
        self.post_port(GuestMessage::OpenLink {
            url: url.to_string(),
        })
    }

    pub fn send_message(&self, content: &str) -> Result<(), BridgeError> {
        self.post_port(GuestMessage::SendMessage {
            content: content.to_string(),
        })
    }

    pub fn log(&self, level: LogLevel, data: Value) -> Result<(), BridgeError> {
        self.post_port(GuestMessage::Log { level, data })
    }

    /// Drop the channel. Outstanding tool calls fail.
    pub fn disconnect(&self) {
        let (port, calls) = {
            let mut inner = self.inner.lock();
            inner.pending_acks.clear();
            (inner.port.take(), std::mem::take(&mut inner.calls))
        };
        if let Some(port) = port {
            port.close();
        }
        for (_, waiter) in calls {
            let _ = waiter.send(Err("host disconnected".to_string()));
        }
    }

    fn post_global(&self, message: GuestMessage) -> Result<(), BridgeError> {
        let parent = self.parent.as_ref().ok_or(BridgeError::HostUnavailable)?;
        parent.post_message(message.to_value());
        Ok(())
    }

    fn post_port(&self, message: GuestMessage) -> Result<(), BridgeError> {
        let inner = self.inner.lock();
        let port = inner.port.as_ref().ok_or(BridgeError::HostUnavailable)?;
        port.post(message.to_value())
    }
}
