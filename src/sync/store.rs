//! State Synchronization Store
//!
//! Holds the host-owned [`ContextSnapshot`], notifies host-side subscribers per
//! field, and publishes [`PatchEvent`]s that attached guest instances forward
//! (or queue) as `update` messages.

use crate::bridge::InstanceId;
use crate::config::DisplayConfig;
use crate::sync::snapshot::{
    ContextKey, ContextPatch, ContextSnapshot, DeviceCapabilities, DisplayMode, SafeAreaInsets,
    Theme, ToolStatus,
};
use crate::sync::subscription::{KeyedSubscribers, SubscriptionId, Subscribers};
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Map, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// Tool lifecycle notifications fed into the store.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolEvent {
    /// Arguments still streaming in.
    PartialInput(Value),
    /// Complete arguments.
    Input(Value),
    Output(Value),
    Cancelled,
}

/// One logical change to the snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchEvent {
    pub patch: ContextPatch,
    /// Guest instance that proposed the change, if any. That instance already
    /// holds the value and is not sent an echo.
    pub origin: Option<InstanceId>,
}

pub struct StateStore {
    snapshot: RwLock<ContextSnapshot>,
    fields: KeyedSubscribers<ContextKey, Value>,
    patches: Subscribers<PatchEvent>,
    display: DisplayConfig,
    /// Committed patches not yet delivered, in commit order.
    pending: Mutex<VecDeque<PatchEvent>>,
    delivering: AtomicBool,
}

impl StateStore {
    pub fn new(display: DisplayConfig) -> Self {
        Self::with_snapshot(ContextSnapshot::default(), display)
    }

    pub fn with_snapshot(snapshot: ContextSnapshot, display: DisplayConfig) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
            fields: KeyedSubscribers::new(),
            patches: Subscribers::new(),
            display,
            pending: Mutex::new(VecDeque::new()),
            delivering: AtomicBool::new(false),
        }
    }

    /// Copy of the full snapshot.
    pub fn snapshot(&self) -> ContextSnapshot {
        self.snapshot.read().clone()
    }

    /// Current value of one field.
    pub fn get(&self, key: ContextKey) -> Value {
        self.snapshot.read().get(key)
    }

    /// Called with the new value each time `key` changes.
    pub fn subscribe<F>(&self, key: ContextKey, callback: F) -> SubscriptionId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.fields.subscribe(key, callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.fields.unsubscribe(id)
    }

    /// Called once per logical change with every field that changed.
    pub fn subscribe_patches<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&PatchEvent) + Send + Sync + 'static,
    {
        self.patches.subscribe(callback)
    }

    pub fn unsubscribe_patches(&self, id: SubscriptionId) -> bool {
        self.patches.unsubscribe(id)
    }

    pub fn set_theme(&self, theme: Theme) -> bool {
        self.commit(vec![(ContextKey::Theme, json!(theme))], None)
    }

    pub fn set_locale(&self, locale: impl Into<String>) -> bool {
        let locale = locale.into();
        if locale.trim().is_empty() {
            warn!("ignoring empty locale");
            return false;
        }
        self.commit(vec![(ContextKey::Locale, json!(locale))], None)
    }

    pub fn set_max_height(&self, max_height: Option<f64>) -> bool {
        if let Some(px) = max_height {
            if !is_positive_length(px) {
                warn!(max_height = px, "ignoring invalid max height");
                return false;
            }
        }
        self.commit(vec![(ContextKey::MaxHeight, json!(max_height))], None)
    }

    /// Also re-applies the display-mode policy, so a `pip` widget becomes
    /// `fullscreen` once the viewport narrows to a mobile width.
    pub fn set_viewport_width(&self, width: Option<f64>) -> bool {
        if let Some(px) = width {
            if !is_positive_length(px) {
                warn!(viewport_width = px, "ignoring invalid viewport width");
                return false;
            }
        }
        let current_mode = self.snapshot.read().display_mode;
        let mode = self.effective_display_mode(current_mode, width);
        self.commit(
            vec![
                (ContextKey::ViewportWidth, json!(width)),
                (ContextKey::DisplayMode, json!(mode)),
            ],
            None,
        )
    }

    pub fn set_safe_area(&self, insets: SafeAreaInsets) -> bool {
        let values = [insets.top, insets.right, insets.bottom, insets.left];
        if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
            warn!(?insets, "ignoring invalid safe area insets");
            return false;
        }
        self.commit(vec![(ContextKey::SafeArea, json!(insets))], None)
    }

    pub fn set_device(&self, device: DeviceCapabilities) -> bool {
        self.commit(vec![(ContextKey::Device, json!(device))], None)
    }

    /// Apply a display mode after the layout policy; returns the mode applied.
    pub fn set_display_mode(&self, requested: DisplayMode) -> DisplayMode {
        let width = self.snapshot.read().viewport_width;
        let mode = self.effective_display_mode(requested, width);
        if mode != requested {
            debug!(%requested, applied = %mode, "display mode overridden by layout policy");
        }
        self.commit(vec![(ContextKey::DisplayMode, json!(mode))], None);
        mode
    }

    pub fn set_widget_state(&self, state: Option<Map<String, Value>>) -> bool {
        self.commit(vec![(ContextKey::WidgetState, json!(state))], None)
    }

    /// App state proposed by a guest. Retained even when nobody is subscribed.
    pub fn ingest_app_state(&self, origin: InstanceId, state: Option<Map<String, Value>>) -> bool {
        self.commit(vec![(ContextKey::WidgetState, json!(state))], Some(origin))
    }

    pub fn ingest_tool(&self, event: ToolEvent) -> bool {
        let updates = match event {
            ToolEvent::PartialInput(input) => vec![
                (ContextKey::ToolInput, input),
                (ContextKey::ToolStatus, json!(ToolStatus::Streaming)),
            ],
            ToolEvent::Input(input) => vec![
                (ContextKey::ToolInput, input),
                (ContextKey::ToolStatus, json!(ToolStatus::InputReady)),
            ],
            ToolEvent::Output(result) => vec![
                (ContextKey::ToolResult, result),
                (ContextKey::ToolStatus, json!(ToolStatus::Complete)),
            ],
            ToolEvent::Cancelled => vec![(ContextKey::ToolStatus, json!(ToolStatus::Cancelled))],
        };
        self.commit(updates, None)
    }

    /// `pip` is not offered on mobile-width layouts; it becomes `fullscreen`.
    pub fn effective_display_mode(
        &self,
        requested: DisplayMode,
        viewport_width: Option<f64>,
    ) -> DisplayMode {
        let is_mobile = viewport_width.is_some_and(|w| w < self.display.mobile_breakpoint_px);
        if requested == DisplayMode::Pip && is_mobile {
            DisplayMode::Fullscreen
        } else {
            requested
        }
    }

    /// Apply the changed subset of `updates` as one patch, then notify.
    ///
    /// A commit made from inside a subscriber is delivered after the patch
    /// being delivered, so every listener sees patches in commit order.
    fn commit(&self, updates: Vec<(ContextKey, Value)>, origin: Option<InstanceId>) -> bool {
        {
            let mut snapshot = self.snapshot.write();
            let mut patch = ContextPatch::new();
            for (key, value) in updates {
                if snapshot.get(key) != value {
                    patch.insert(key, value);
                }
            }
            if patch.is_empty() {
                return false;
            }
            if let Err(err) = snapshot.apply(&patch) {
                warn!(error = %err, "rejected context update");
                return false;
            }
            self.pending.lock().push_back(PatchEvent { patch, origin });
        }

        self.deliver_pending();
        true
    }

    fn deliver_pending(&self) {
        loop {
            if self.delivering.swap(true, Ordering::AcqRel) {
                return;
            }
            loop {
                let next = self.pending.lock().pop_front();
                let Some(event) = next else {
                    break;
                };
                for (key, value) in &event.patch {
                    self.fields.publish(*key, value);
                }
                self.patches.publish(&event);
            }
            self.delivering.store(false, Ordering::Release);
            // Another thread may have queued between the last pop and the reset.
            if self.pending.lock().is_empty() {
                return;
            }
        }
    }
}

fn is_positive_length(px: f64) -> bool {
    px.is_finite() && px > 0.0
}
