//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::BridgeError;

/// Map domain errors to a string for CLI output.
pub fn map_error(e: &BridgeError) -> String {
    match e {
        BridgeError::RejectedOrigin(_) => "rejected".to_string(),
        other => other.to_string(),
    }
}
