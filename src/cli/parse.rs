//! CLI parse: clap types for widget-bridge. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// widget-bridge CLI - inspect the guest document and trust policy
#[derive(Parser)]
#[command(name = "widget-bridge")]
#[command(about = "Render and check the sandboxed widget bootstrap document")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding widget-bridge.toml
    #[arg(long, default_value = ".")]
    pub dir: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the content security policy for a widget script
    Csp {
        #[arg(long)]
        script_url: String,
    },
    /// Print the bootstrap document for a widget script
    Document {
        #[arg(long)]
        script_url: String,
        /// light or dark
        #[arg(long, default_value = "light")]
        theme: String,
    },
    /// Check whether a URL may be loaded into the guest frame
    CheckUrl { url: String },
    /// Print the effective configuration as TOML
    Config,
}
