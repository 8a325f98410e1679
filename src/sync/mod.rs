//! State synchronization: the shared snapshot, its store, and subscriptions.

pub mod snapshot;
pub mod store;
pub mod subscription;

pub use snapshot::{
    ContextKey, ContextPatch, ContextSnapshot, DeviceCapabilities, DisplayMode, SafeAreaInsets,
    Theme, ToolStatus,
};
pub use store::{PatchEvent, StateStore, ToolEvent};
pub use subscription::{KeyedSubscribers, SubscriptionId, Subscribers};
