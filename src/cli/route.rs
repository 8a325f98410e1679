//! CLI route: single route table and run context.

use crate::bridge::HostSession;
use crate::cli::parse::Commands;
use crate::config::{BridgeConfig, ConfigLoader};
use crate::error::BridgeError;
use crate::sync::Theme;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Runtime context for CLI execution. Built from the config dir and optional
/// config path using ConfigLoader only.
pub struct RunContext {
    session: HostSession,
}

impl RunContext {
    pub fn new(dir: &Path, config_path: Option<PathBuf>) -> Result<Self, BridgeError> {
        let config = match config_path {
            Some(ref path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(dir)?,
        };
        Self::from_config(config)
    }

    pub fn from_config(config: BridgeConfig) -> Result<Self, BridgeError> {
        let session = HostSession::new(config)?;
        Ok(Self { session })
    }

    pub fn session(&self) -> &HostSession {
        &self.session
    }

    /// Execute a command and return its stdout text.
    pub fn execute(&self, command: &Commands) -> Result<String, BridgeError> {
        match command {
            Commands::Csp { script_url } => {
                debug!(script_url, "building csp");
                Ok(self.session.csp_for(script_url))
            }
            Commands::Document { script_url, theme } => {
                let theme: Theme = theme.parse()?;
                Ok(self.session.render_document(script_url, theme))
            }
            Commands::CheckUrl { url } => {
                self.session.check_script_url(url)?;
                info!(url, "url allowed");
                Ok("allowed".to_string())
            }
            Commands::Config => toml::to_string(self.session.config())
                .map_err(|e| BridgeError::Config(format!("Failed to render config: {}", e))),
        }
    }
}
