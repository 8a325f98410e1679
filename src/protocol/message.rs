//! Wire messages exchanged between host and guest.
//!
//! Messages are JSON objects tagged by `"type"`. Inbound guest messages go
//! through [`GuestMessage::parse`], which applies shape and range validation;
//! anything that fails is a [`BridgeError::MalformedMessage`].

use crate::error::BridgeError;
use crate::sync::{ContextPatch, ContextSnapshot, DisplayMode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

/// Largest intrinsic height a guest may report, in CSS pixels.
pub const MAX_HEIGHT_PX: f64 = 100_000.0;

/// Guest message types allowed on the global (non-channel) path once connected.
pub const URGENT_GLOBAL_MESSAGES: &[&str] = &["notify-height"];

/// Host → guest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum HostMessage {
    /// Full snapshot; replaces whatever the guest holds.
    Init { context: ContextSnapshot },
    /// Named subset of fields.
    Update { patch: ContextPatch },
    /// Sent on the global path; the far channel port travels alongside it.
    Handshake,
    FenceRequest { token: u64 },
    #[serde(rename_all = "camelCase")]
    CallToolResult {
        call_id: u64,
        ok: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl HostMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            HostMessage::Init { .. } => "init",
            HostMessage::Update { .. } => "update",
            HostMessage::Handshake => "handshake",
            HostMessage::FenceRequest { .. } => "fence-request",
            HostMessage::CallToolResult { .. } => "call-tool-result",
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn parse(value: &Value) -> Result<Self, BridgeError> {
        serde_json::from_value(value.clone())
            .map_err(|e| BridgeError::malformed(format!("host message: {}", e)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// Guest → host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum GuestMessage {
    /// Unauthenticated; only triggers channel creation.
    Ready,
    HandshakeComplete,
    FenceAck { token: u64 },
    RequestDisplayMode { mode: DisplayMode },
    SetState { value: Option<Map<String, Value>> },
    NotifyHeight { pixels: f64 },
    #[serde(rename_all = "camelCase")]
    CallTool {
        call_id: u64,
        name: String,
        #[serde(default)]
        args: Option<Map<String, Value>>,
    },
    OpenLink { url: String },
    SendMessage { content: String },
    Log {
        level: LogLevel,
        #[serde(default)]
        data: Value,
    },
}

impl GuestMessage {
    /// Decode and validate an inbound payload.
    pub fn parse(value: &Value) -> Result<Self, BridgeError> {
        if !value.is_object() {
            return Err(BridgeError::malformed("payload is not an object"));
        }
        let message: GuestMessage = serde_json::from_value(value.clone())
            .map_err(|e| BridgeError::malformed(e.to_string()))?;
        message.validate()?;
        Ok(message)
    }

    fn validate(&self) -> Result<(), BridgeError> {
        match self {
            GuestMessage::NotifyHeight { pixels } => {
                if !pixels.is_finite() || *pixels <= 0.0 || *pixels > MAX_HEIGHT_PX {
                    return Err(BridgeError::malformed(format!(
                        "height out of range: {}",
                        pixels
                    )));
                }
            }
            GuestMessage::CallTool { name, .. } => {
                if name.trim().is_empty() {
                    return Err(BridgeError::malformed("tool name is empty"));
                }
            }
            GuestMessage::OpenLink { url } => {
                let parsed = Url::parse(url)
                    .map_err(|e| BridgeError::malformed(format!("invalid link: {}", e)))?;
                if !matches!(parsed.scheme(), "http" | "https") {
                    return Err(BridgeError::malformed(format!(
                        "link scheme not allowed: {}",
                        parsed.scheme()
                    )));
                }
            }
            _ => {}
        }
        Ok(())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            GuestMessage::Ready => "ready",
            GuestMessage::HandshakeComplete => "handshake-complete",
            GuestMessage::FenceAck { .. } => "fence-ack",
            GuestMessage::RequestDisplayMode { .. } => "request-display-mode",
            GuestMessage::SetState { .. } => "set-state",
            GuestMessage::NotifyHeight { .. } => "notify-height",
            GuestMessage::CallTool { .. } => "call-tool",
            GuestMessage::OpenLink { .. } => "open-link",
            GuestMessage::SendMessage { .. } => "send-message",
            GuestMessage::Log { .. } => "log",
        }
    }

    /// Whether this type may bypass the channel on the global path.
    pub fn is_urgent(&self) -> bool {
        URGENT_GLOBAL_MESSAGES.contains(&self.kind())
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
