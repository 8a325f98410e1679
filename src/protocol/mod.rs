//! Transport primitives and the tagged JSON wire format.

pub mod channel;
pub mod message;

pub use channel::{MessageChannel, Port, WindowId};
pub use message::{GuestMessage, HostMessage, LogLevel, MAX_HEIGHT_PX, URGENT_GLOBAL_MESSAGES};
