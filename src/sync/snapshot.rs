//! Context Snapshot: the shared state record pushed from host to guest.

use crate::error::BridgeError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

impl FromStr for Theme {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(BridgeError::malformed(format!("unknown theme: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    #[default]
    Inline,
    Pip,
    Fullscreen,
}

impl DisplayMode {
    pub fn as_str(self) -> &'static str {
        match self {
            DisplayMode::Inline => "inline",
            DisplayMode::Pip => "pip",
            DisplayMode::Fullscreen => "fullscreen",
        }
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DisplayMode {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inline" => Ok(DisplayMode::Inline),
            "pip" => Ok(DisplayMode::Pip),
            "fullscreen" => Ok(DisplayMode::Fullscreen),
            other => Err(BridgeError::malformed(format!(
                "unknown display mode: {}",
                other
            ))),
        }
    }
}

/// Progress of the tool call whose input/result the widget renders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolStatus {
    #[default]
    Idle,
    Streaming,
    InputReady,
    Complete,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SafeAreaInsets {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCapabilities {
    pub hover: bool,
    pub touch: bool,
}

/// Full context record. Host-owned; guests only ever see copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextSnapshot {
    pub theme: Theme,
    pub locale: String,
    pub max_height: Option<f64>,
    pub viewport_width: Option<f64>,
    pub safe_area: SafeAreaInsets,
    pub device: DeviceCapabilities,
    pub display_mode: DisplayMode,
    pub tool_input: Option<Value>,
    pub tool_result: Option<Value>,
    pub tool_status: ToolStatus,
    pub widget_state: Option<Map<String, Value>>,
}

impl Default for ContextSnapshot {
    fn default() -> Self {
        Self {
            theme: Theme::Light,
            locale: "en-US".to_string(),
            max_height: None,
            viewport_width: None,
            safe_area: SafeAreaInsets::default(),
            device: DeviceCapabilities::default(),
            display_mode: DisplayMode::Inline,
            tool_input: None,
            tool_result: None,
            tool_status: ToolStatus::Idle,
            widget_state: None,
        }
    }
}

/// Addressable snapshot fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContextKey {
    Theme,
    Locale,
    MaxHeight,
    ViewportWidth,
    SafeArea,
    Device,
    DisplayMode,
    ToolInput,
    ToolResult,
    ToolStatus,
    WidgetState,
}

impl ContextKey {
    pub const ALL: [ContextKey; 11] = [
        ContextKey::Theme,
        ContextKey::Locale,
        ContextKey::MaxHeight,
        ContextKey::ViewportWidth,
        ContextKey::SafeArea,
        ContextKey::Device,
        ContextKey::DisplayMode,
        ContextKey::ToolInput,
        ContextKey::ToolResult,
        ContextKey::ToolStatus,
        ContextKey::WidgetState,
    ];

    /// Wire name of the field.
    pub fn as_str(self) -> &'static str {
        match self {
            ContextKey::Theme => "theme",
            ContextKey::Locale => "locale",
            ContextKey::MaxHeight => "maxHeight",
            ContextKey::ViewportWidth => "viewportWidth",
            ContextKey::SafeArea => "safeArea",
            ContextKey::Device => "device",
            ContextKey::DisplayMode => "displayMode",
            ContextKey::ToolInput => "toolInput",
            ContextKey::ToolResult => "toolResult",
            ContextKey::ToolStatus => "toolStatus",
            ContextKey::WidgetState => "widgetState",
        }
    }
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named subset of snapshot fields with their new values.
pub type ContextPatch = BTreeMap<ContextKey, Value>;

impl ContextSnapshot {
    fn to_object(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    /// Current value of one field in wire form.
    pub fn get(&self, key: ContextKey) -> Value {
        self.to_object()
            .remove(key.as_str())
            .unwrap_or(Value::Null)
    }

    /// Apply a patch atomically: either every field is replaced or the snapshot
    /// is left untouched and an error is returned.
    pub fn apply(&mut self, patch: &ContextPatch) -> Result<(), BridgeError> {
        let mut object = self.to_object();
        for (key, value) in patch {
            object.insert(key.as_str().to_string(), value.clone());
        }
        let next: ContextSnapshot = serde_json::from_value(Value::Object(object))
            .map_err(|e| BridgeError::malformed(format!("invalid context patch: {}", e)))?;
        *self = next;
        Ok(())
    }
}
