//! Error types for the widget bridge.

use thiserror::Error;

/// Protocol and runtime errors.
///
/// Host-side inbound handling never surfaces these to the guest; they are
/// logged and the offending message is dropped. Guest-side calls return them
/// directly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("Rejected origin: {0}")]
    RejectedOrigin(String),

    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Channel not connected")]
    NotConnected,

    #[error("Host unavailable")]
    HostUnavailable,

    #[error("Channel closed")]
    ChannelClosed,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl BridgeError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        BridgeError::MalformedMessage(msg.into())
    }
}

impl From<config::ConfigError> for BridgeError {
    fn from(err: config::ConfigError) -> Self {
        BridgeError::Config(err.to_string())
    }
}
