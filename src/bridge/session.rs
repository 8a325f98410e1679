//! Host session: the explicit owner of the validator, the state store, and
//! every mounted guest instance.

use crate::bridge::instance::{GuestFrame, GuestInstance, InstanceId};
use crate::config::BridgeConfig;
use crate::document::build_bootstrap_document;
use crate::error::BridgeError;
use crate::protocol::channel::WindowId;
use crate::security::{build_csp, OriginValidator};
use crate::sync::{StateStore, Theme};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct HostSession {
    config: BridgeConfig,
    validator: Arc<OriginValidator>,
    store: Arc<StateStore>,
    instances: RwLock<HashMap<InstanceId, Arc<GuestInstance>>>,
    next_id: AtomicU64,
}

impl HostSession {
    /// Build a session from a validated configuration.
    pub fn new(config: BridgeConfig) -> Result<Self, BridgeError> {
        config.validate().map_err(|errors| {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            BridgeError::Config(format!(
                "Configuration validation failed:\n{}",
                messages.join("\n")
            ))
        })?;

        let validator = Arc::new(config.validator());
        let store = Arc::new(StateStore::new(config.display.clone()));
        info!(
            allowed_origins = validator.allowed().origins().len(),
            host_origin = validator.host_origin().unwrap_or("-"),
            "host session created"
        );
        Ok(Self {
            config,
            validator,
            store,
            instances: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    pub fn validator(&self) -> &OriginValidator {
        &self.validator
    }

    /// Attach a new guest instance to `frame` and start awaiting its `ready`.
    pub fn mount(&self, frame: Arc<dyn GuestFrame>) -> Arc<GuestInstance> {
        let id = InstanceId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let instance = GuestInstance::new(
            id,
            frame,
            self.validator.clone(),
            self.store.clone(),
            self.config.display.apply_guest_requests,
        );
        self.instances.write().insert(id, instance.clone());
        instance.mount();
        info!(instance = %id, window = %instance.window_id(), "guest mounted");
        instance
    }

    /// Close and forget an instance. Returns `false` if it was not mounted.
    pub fn unmount(&self, id: InstanceId) -> bool {
        let removed = self.instances.write().remove(&id);
        match removed {
            Some(instance) => {
                instance.close();
                true
            }
            None => false,
        }
    }

    pub fn instance(&self, id: InstanceId) -> Option<Arc<GuestInstance>> {
        self.instances.read().get(&id).cloned()
    }

    pub fn instance_count(&self) -> usize {
        self.instances.read().len()
    }

    /// Deliver a global-path message to the instance whose frame sent it.
    /// Returns `false` when no mounted frame matches `sender`.
    pub fn route_window_message(&self, origin: &str, sender: WindowId, data: &Value) -> bool {
        let target = self
            .instances
            .read()
            .values()
            .find(|instance| instance.window_id() == sender)
            .cloned();
        match target {
            Some(instance) => {
                instance.handle_window_message(origin, sender, data);
                true
            }
            None => {
                warn!(origin, sender = %sender, "message from unknown window dropped");
                false
            }
        }
    }

    /// Process pending port traffic for every instance.
    pub fn pump(&self) -> usize {
        let instances: Vec<Arc<GuestInstance>> = self.instances.read().values().cloned().collect();
        instances.iter().map(|instance| instance.pump()).sum()
    }

    /// `Ok` when `script_url` may be loaded into a guest frame.
    pub fn check_script_url(&self, script_url: &str) -> Result<(), BridgeError> {
        if self.validator.is_allowed_url(script_url) {
            Ok(())
        } else {
            Err(BridgeError::RejectedOrigin(script_url.to_string()))
        }
    }

    /// Content policy for a guest loading `script_url`. A rejected URL
    /// contributes no origin of its own.
    pub fn csp_for(&self, script_url: &str) -> String {
        let script_origin = if self.validator.is_allowed_url(script_url) {
            self.validator.resolve_script_origin(script_url)
        } else {
            None
        };
        build_csp(Some(&self.config.csp), script_origin.as_deref())
    }

    /// Bootstrap document for a guest frame.
    pub fn render_document(&self, script_url: &str, theme: Theme) -> String {
        let csp = self.csp_for(script_url);
        debug!(script_url, theme = theme.as_str(), "rendering guest document");
        build_bootstrap_document(&self.validator, script_url, theme.as_str(), &csp)
    }

    /// Close every instance.
    pub fn shutdown(&self) {
        let instances: Vec<Arc<GuestInstance>> =
            self.instances.write().drain().map(|(_, instance)| instance).collect();
        let count = instances.len();
        for instance in instances {
            instance.close();
        }
        info!(closed = count, "host session shut down");
    }
}

impl Drop for HostSession {
    fn drop(&mut self) {
        for (_, instance) in self.instances.get_mut().drain() {
            instance.close();
        }
    }
}
