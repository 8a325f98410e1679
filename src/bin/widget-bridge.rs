//! widget-bridge CLI Binary
//!
//! Renders and checks guest bootstrap documents against the configured trust policy.

use anyhow::Context;
use clap::Parser;
use std::process;
use tracing::{error, info};
use widget_bridge::cli::{map_error, Cli, RunContext};
use widget_bridge::config::ConfigLoader;
use widget_bridge::error::BridgeError;
use widget_bridge::logging::{init_logging, LoggingConfig};

fn main() {
    let cli = Cli::parse();

    let logging_config = build_logging_config(&cli);
    if let Err(e) = init_logging(Some(&logging_config)) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    info!("widget-bridge CLI starting");

    match run(&cli) {
        Ok(output) => println!("{}", output),
        Err(e) => {
            error!("Command failed: {:#}", e);
            match e.downcast_ref::<BridgeError>() {
                Some(bridge_error) if matches!(bridge_error, BridgeError::RejectedOrigin(_)) => {
                    println!("{}", map_error(bridge_error))
                }
                _ => eprintln!("{:#}", e),
            }
            process::exit(1);
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<String> {
    let context = RunContext::new(&cli.dir, cli.config.clone())
        .context("failed to initialize host session")?;
    let output = context.execute(&cli.command)?;
    Ok(output)
}

/// Build logging configuration from CLI args and config file.
/// Precedence: CLI flags override config file override defaults.
fn build_logging_config(cli: &Cli) -> LoggingConfig {
    let loaded = match cli.config {
        Some(ref path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(&cli.dir),
    };
    let mut config = loaded.map(|c| c.logging).unwrap_or_default();

    if let Some(ref level) = cli.log_level {
        config.level = level.clone();
    }
    if let Some(ref format) = cli.log_format {
        config.format = format.clone();
    }
    config
}
