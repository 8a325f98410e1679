//! Integration tests for the widget bridge

mod config_integration;
mod origin_validation;
mod paint_fence;
mod queue_ordering;
mod state_sync;
mod support;
