use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;

use crate::config::Config;
use crate::srs::registry::SessionRegistry;
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    store: Arc<Store>,
    sessions: Arc<SessionRegistry>,
    config: Arc<Config>,
    shutdown_tx: broadcast::Sender<()>,
    started_at: Instant,
}

impl AppState {
    pub fn new(
        store: Arc<Store>,
        sessions: Arc<SessionRegistry>,
        config: &Config,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Self {
        Self {
            store,
            sessions,
            config: Arc::new(config.clone()),
            shutdown_tx,
            started_at: Instant::now(),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn shutdown_rx(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
