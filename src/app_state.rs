//! Shared state injected into every connection task.

use std::sync::Arc;

use crate::config::RelayConfig;
use crate::domain::{Sequencer, SessionRegistry};
use crate::service::Dispatcher;

/// Shared relay state handed to each connection task.
///
/// Cloning is cheap: every field is reference-counted.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Broadcast dispatcher; also owns the registry and sequencer.
    pub dispatcher: Arc<Dispatcher>,
    /// Startup configuration.
    pub config: Arc<RelayConfig>,
}

impl AppState {
    /// Builds fresh state (empty registry, sequence at 0) from `config`.
    #[must_use]
    pub fn new(config: RelayConfig) -> Self {
        let dispatcher = Dispatcher::new(
            Arc::new(SessionRegistry::new()),
            Arc::new(Sequencer::new()),
        );
        Self {
            dispatcher: Arc::new(dispatcher),
            config: Arc::new(config),
        }
    }

    /// Returns the session registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        self.dispatcher.registry()
    }
}
