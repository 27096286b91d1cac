//! Wiring of the live-update core from configuration.
//!
//! `LiveServices` owns the store, the hub and the producer-side
//! [`LiveUpdater`]. The ingestion pipeline publishes through `updater`;
//! the HTTP layer reads through `api_server`.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::api::ApiServer;
use crate::config::Config;
use crate::error::{ExplorerError, Result};
use crate::indexer::LiveUpdater;
use crate::store::SharedStateStore;
use crate::websocket::EventHub;

pub struct LiveServices {
    pub store: Arc<SharedStateStore>,
    pub hub: EventHub,
    pub updater: LiveUpdater,
    hub_task: JoinHandle<()>,
}

impl LiveServices {
    /// Spawns the hub on the current runtime and builds the updater from the
    /// `[chain]` and `[mempool]` sections.
    pub fn start(config: &Config) -> Self {
        let store = Arc::new(SharedStateStore::new());
        let (hub, hub_task) = EventHub::spawn(store.clone(), &config.hub);
        let params = config.chain.params();
        let updater = LiveUpdater::new(store.clone(), hub.clone(), params, config.mempool.latest_limit);

        info!(
            window_size = params.window_size,
            reward_window_size = params.reward_window_size,
            latest_limit = config.mempool.latest_limit,
            "Live updater ready"
        );

        Self {
            store,
            hub,
            updater,
            hub_task,
        }
    }

    pub fn api_server(&self) -> ApiServer {
        ApiServer::new(self.store.clone(), self.hub.clone())
    }

    /// Stops the hub and waits for its loop task.
    pub async fn shutdown(self) -> Result<()> {
        self.hub.stop().await;
        self.hub_task
            .await
            .map_err(|e| ExplorerError::Internal(format!("hub task failed: {}", e)))
    }
}
