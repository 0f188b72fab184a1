pub mod config;
pub mod error;
pub mod gateway;
pub mod models;
pub mod registry;
pub mod routes;

use std::sync::Arc;

use config::Config;
use gateway::fanout::ConnectionHub;
use registry::BattleRegistry;

/// Shared application state available to all route handlers and gateway tasks.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub battles: Arc<BattleRegistry>,
    pub hub: Arc<ConnectionHub>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let hub = ConnectionHub::new(config.outbound_capacity);
        Self {
            config: Arc::new(config),
            battles: Arc::new(BattleRegistry::new()),
            hub: Arc::new(hub),
        }
    }
}
