//! Merge rules: defaults first, later sources override earlier ones.

use crate::security::origin::DEFAULT_LOOPBACK_HOSTS;
use config::builder::DefaultState;
use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

pub const DEFAULT_MOBILE_BREAKPOINT_PX: f64 = 768.0;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("allowed_origins", Vec::<String>::new())?
        .set_default("loopback_hosts", DEFAULT_LOOPBACK_HOSTS.to_vec())?
        .set_default("display.mobile_breakpoint_px", DEFAULT_MOBILE_BREAKPOINT_PX)?
        .set_default("display.apply_guest_requests", true)?
        .set_default("logging.level", "info")?
        .set_default("logging.format", "text")
}
