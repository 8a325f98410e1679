//! Configuration files feeding a host session.

use tempfile::TempDir;
use widget_bridge::bridge::HostSession;
use widget_bridge::config::{ConfigLoader, WORKSPACE_CONFIG_FILE};
use widget_bridge::error::BridgeError;
use widget_bridge::sync::DisplayMode;

#[test]
fn test_session_from_workspace_file() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(
        temp_dir.path().join(WORKSPACE_CONFIG_FILE),
        r#"
host_origin = "https://host.example"
allowed_origins = ["https://cdn.widgets.io"]

[csp]
connect_domains = ["https://api.widgets.io"]
resource_domains = ["https://images.widgets.io"]

[display]
mobile_breakpoint_px = 1024
apply_guest_requests = false
"#,
    )
    .unwrap();

    let config = ConfigLoader::load(temp_dir.path()).unwrap();
    let session = HostSession::new(config).unwrap();

    let csp = session.csp_for("https://cdn.widgets.io/app.js");
    assert!(csp.contains("connect-src 'self' https://cdn.widgets.io https://api.widgets.io"));
    assert!(csp.contains("img-src 'self' data: blob: https://cdn.widgets.io https://images.widgets.io"));

    session.store().set_viewport_width(Some(900.0));
    assert_eq!(
        session.store().set_display_mode(DisplayMode::Pip),
        DisplayMode::Fullscreen
    );
    assert!(!session.config().display.apply_guest_requests);
}

#[test]
fn test_invalid_file_is_rejected_by_session() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("custom.toml");
    std::fs::write(&path, "allowed_origins = [\"https://*.widgets.io\"]\n").unwrap();

    let config = ConfigLoader::load_from_file(&path).unwrap();
    match HostSession::new(config) {
        Err(BridgeError::Config(message)) => assert!(message.contains("https://*.widgets.io")),
        other => panic!("expected config error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_malformed_toml_is_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.toml");
    std::fs::write(&path, "allowed_origins = [\n").unwrap();
    assert!(matches!(
        ConfigLoader::load_from_file(&path),
        Err(BridgeError::Config(_))
    ));
}
