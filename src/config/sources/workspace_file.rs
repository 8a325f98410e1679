//! Workspace config file source: `<dir>/widget-bridge.toml`.

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::File;
use std::path::Path;

pub const WORKSPACE_CONFIG_FILE: &str = "widget-bridge.toml";

pub fn add_to_builder(builder: ConfigBuilder<DefaultState>, dir: &Path) -> ConfigBuilder<DefaultState> {
    let path = dir.join(WORKSPACE_CONFIG_FILE);
    if path.exists() {
        builder.add_source(File::from(path).required(false))
    } else {
        builder
    }
}
