//! Window handles and the dedicated two-ended message channel.

use crate::error::BridgeError;
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};

/// Identity of a browsing context that can send messages.
///
/// The host compares the sender handle of every inbound global-path message
/// against the handle of the frame it created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(u64);

impl WindowId {
    pub fn new(raw: u64) -> Self {
        WindowId(raw)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "window-{}", self.0)
    }
}

/// One end of a [`MessageChannel`].
pub struct Port {
    tx: Mutex<Option<UnboundedSender<Value>>>,
    rx: Mutex<UnboundedReceiver<Value>>,
}

impl fmt::Debug for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Port")
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Port {
    /// Send to the other end.
    pub fn post(&self, message: Value) -> Result<(), BridgeError> {
        let guard = self.tx.lock();
        let tx = guard.as_ref().ok_or(BridgeError::ChannelClosed)?;
        tx.send(message).map_err(|_| BridgeError::ChannelClosed)
    }

    /// Next message from the other end, if one is already waiting.
    pub fn try_recv(&self) -> Option<Value> {
        match self.rx.lock().try_recv() {
            Ok(value) => Some(value),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Every message currently waiting, in arrival order.
    pub fn drain(&self) -> Vec<Value> {
        let mut out = Vec::new();
        while let Some(value) = self.try_recv() {
            out.push(value);
        }
        out
    }

    /// Wait for the next message. `None` once the other end is closed and the
    /// buffer is empty.
    pub async fn recv(&mut self) -> Option<Value> {
        self.rx.get_mut().recv().await
    }

    /// Stop sending and receiving. Idempotent.
    pub fn close(&self) {
        self.tx.lock().take();
        self.rx.lock().close();
    }

    pub fn is_closed(&self) -> bool {
        self.tx.lock().as_ref().map_or(true, |tx| tx.is_closed())
    }
}

/// Constructor for a connected pair of ports.
pub struct MessageChannel;

impl MessageChannel {
    pub fn pair() -> (Port, Port) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();
        let near = Port {
            tx: Mutex::new(Some(a_tx)),
            rx: Mutex::new(b_rx),
        };
        let far = Port {
            tx: Mutex::new(Some(b_tx)),
            rx: Mutex::new(a_rx),
        };
        (near, far)
    }
}
