//! widget-bridge: host/guest protocol for sandboxed widgets
//!
//! A host page embeds a third-party widget in a cross-trust frame. This crate
//! provides origin and content policy checks, the guest bootstrap document,
//! the ready/handshake channel state machine with its outbound queue, a shared
//! context snapshot kept in sync in both directions, and paint fences that let
//! the host wait for the guest to commit a frame.

pub mod bridge;
pub mod cli;
pub mod config;
pub mod document;
pub mod error;
pub mod guest;
pub mod logging;
pub mod protocol;
pub mod security;
pub mod sync;
