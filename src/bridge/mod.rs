//! Host side of the bridge: per-frame handshake and channel management, paint
//! fences, and the session that owns them.

pub mod fence;
pub mod instance;
pub mod session;

pub use fence::{FenceToken, FenceWait, PaintFence};
pub use instance::{Delivery, GuestEvent, GuestFrame, GuestInstance, InstanceId, LinkState};
pub use session::HostSession;
