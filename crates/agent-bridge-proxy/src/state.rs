//! Shared application state.

use std::sync::Arc;

use agent_bridge_core::{BridgeConfig, ConnectionRegistry, ModeSwitch};

/// Everything handlers need, owned by the composition root.
#[derive(Debug)]
pub struct BridgeContext {
    /// Live agent connections and request queues.
    pub registry: Arc<ConnectionRegistry>,
    /// Current streaming mode; read once per request at admission.
    pub mode: ModeSwitch,
    pub config: BridgeConfig,
}

impl BridgeContext {
    #[must_use]
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            registry: Arc::new(ConnectionRegistry::new()),
            mode: ModeSwitch::new(config.initial_mode),
            config,
        }
    }
}

/// Application state shared across all handlers.
pub type AppState = Arc<BridgeContext>;
