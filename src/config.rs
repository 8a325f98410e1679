//! Configuration System
//!
//! Layered configuration for a host session: merge-policy defaults, the user's
//! global file, the workspace file, then `WIDGET_BRIDGE__*` environment
//! variables. Validation reports every problem at once.

use crate::error::BridgeError;
use crate::logging::LoggingConfig;
use crate::security::csp::sanitize_domain;
use crate::security::origin::{normalize_origin, DEFAULT_LOOPBACK_HOSTS};
use crate::security::{AllowedOrigins, CspConfig, OriginValidator};
use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

mod merge {
    pub mod merge_policy;
}
mod sources {
    pub mod global_file;
    pub mod workspace_file;
}

pub use merge::merge_policy::DEFAULT_MOBILE_BREAKPOINT_PX;
pub use sources::global_file::global_config_path;
pub use sources::workspace_file::WORKSPACE_CONFIG_FILE;

/// Prefix for environment overrides, e.g. `WIDGET_BRIDGE__DISPLAY__MOBILE_BREAKPOINT_PX`.
pub const ENV_PREFIX: &str = "WIDGET_BRIDGE";

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Origin of the host page. Same-origin script URLs are always allowed.
    #[serde(default)]
    pub host_origin: Option<String>,

    /// Exact origins allowed to serve guest scripts and send messages.
    #[serde(default)]
    pub allowed_origins: Vec<String>,

    /// Hostnames trusted on any port.
    #[serde(default = "default_loopback_hosts")]
    pub loopback_hosts: Vec<String>,

    #[serde(default)]
    pub csp: CspConfig,

    #[serde(default)]
    pub display: DisplayConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Layout policy for guest display modes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Viewports narrower than this are treated as mobile.
    #[serde(default = "default_mobile_breakpoint")]
    pub mobile_breakpoint_px: f64,

    /// Apply `request-display-mode` to the store automatically.
    #[serde(default = "default_true")]
    pub apply_guest_requests: bool,
}

fn default_loopback_hosts() -> Vec<String> {
    DEFAULT_LOOPBACK_HOSTS.iter().map(|h| h.to_string()).collect()
}

fn default_mobile_breakpoint() -> f64 {
    DEFAULT_MOBILE_BREAKPOINT_PX
}

fn default_true() -> bool {
    true
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            mobile_breakpoint_px: default_mobile_breakpoint(),
            apply_guest_requests: default_true(),
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host_origin: None,
            allowed_origins: Vec::new(),
            loopback_hosts: default_loopback_hosts(),
            csp: CspConfig::default(),
            display: DisplayConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    Origin(String, String),
    Csp(String, String),
    Display(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Origin(entry, msg) => write!(f, "Origin '{}': {}", entry, msg),
            ValidationError::Csp(entry, msg) => write!(f, "CSP domain '{}': {}", entry, msg),
            ValidationError::Display(msg) => write!(f, "Display: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl BridgeConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Some(host) = &self.host_origin {
            check_origin(host, &mut errors);
        }
        for origin in &self.allowed_origins {
            check_origin(origin, &mut errors);
        }
        for host in &self.loopback_hosts {
            if host.is_empty() || host.contains([':', '/', ' ']) {
                errors.push(ValidationError::Origin(
                    host.clone(),
                    "loopback entries are bare hostnames".to_string(),
                ));
            }
        }

        for domain in self.csp.connect_domains.iter().chain(&self.csp.resource_domains) {
            if sanitize_domain(domain).is_none() {
                errors.push(ValidationError::Csp(
                    domain.clone(),
                    "expected scheme://host[:port] with no wildcard".to_string(),
                ));
            }
        }

        let breakpoint = self.display.mobile_breakpoint_px;
        if !breakpoint.is_finite() || breakpoint <= 0.0 {
            errors.push(ValidationError::Display(format!(
                "mobile_breakpoint_px must be a positive number, got {}",
                breakpoint
            )));
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            errors.push(ValidationError::Logging(format!(
                "unknown format '{}'",
                self.logging.format
            )));
        }
        if !matches!(self.logging.output.as_str(), "stdout" | "stderr") {
            errors.push(ValidationError::Logging(format!(
                "unknown output '{}'",
                self.logging.output
            )));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Build the origin validator for this configuration.
    pub fn validator(&self) -> OriginValidator {
        OriginValidator::new(
            self.host_origin.as_deref(),
            AllowedOrigins::new(&self.allowed_origins, self.loopback_hosts.clone()),
        )
    }
}

fn check_origin(entry: &str, errors: &mut Vec<ValidationError>) {
    if entry.contains('*') {
        errors.push(ValidationError::Origin(
            entry.to_string(),
            "wildcards are not supported".to_string(),
        ));
        return;
    }
    match normalize_origin(entry) {
        Some(origin) if origin == entry.trim_end_matches('/') => {}
        Some(origin) => errors.push(ValidationError::Origin(
            entry.to_string(),
            format!("expected a bare origin such as '{}'", origin),
        )),
        None => errors.push(ValidationError::Origin(
            entry.to_string(),
            "not an absolute http(s) origin".to_string(),
        )),
    }
}

/// Loads [`BridgeConfig`] from the layered sources.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load with the workspace file from `dir`.
    pub fn load(dir: &Path) -> Result<BridgeConfig, BridgeError> {
        let builder = merge::merge_policy::builder_with_defaults()?;
        let builder = sources::global_file::add_to_builder(builder);
        let builder = sources::workspace_file::add_to_builder(builder, dir);
        Self::finish(builder)
    }

    /// Load with an explicit file in place of the workspace file. The file must exist.
    pub fn load_from_file(path: &Path) -> Result<BridgeConfig, BridgeError> {
        let builder = merge::merge_policy::builder_with_defaults()?;
        let builder = sources::global_file::add_to_builder(builder);
        let builder = builder.add_source(File::from(path).required(true));
        Self::finish(builder)
    }

    fn finish(builder: ConfigBuilder<DefaultState>) -> Result<BridgeConfig, BridgeError> {
        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("allowed_origins")
                    .with_list_parse_key("loopback_hosts")
                    .with_list_parse_key("csp.connect_domains")
                    .with_list_parse_key("csp.resource_domains"),
            )
            .build()?;
        Ok(config.try_deserialize()?)
    }
}
