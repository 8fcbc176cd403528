//! DataGenesis console core.
//!
//! Client-side library for configuring and monitoring a DataGenesis
//! synthetic-data backend: a polling status aggregator, an
//! auto-reconnecting event channel, and the persisted AI provider
//! configuration. Consumed by a UI layer; no rendering lives here.

pub mod api;
pub mod channel;
pub mod config;
pub mod error;
pub mod logging;
pub mod provider;
pub mod status;

use std::sync::Arc;

pub use config::BackendConfig;
pub use error::AppError;

use api::client::BackendClient;
use provider::ModelConfigStore;
use status::aggregator::StatusAggregator;
use status::probe::{BackendProbe, HealthProbe};

/// Shared context wiring the console core together. Constructed once at
/// process start and passed by reference to every consumer that needs it.
pub struct AppContext {
    pub config: BackendConfig,
    pub client: Arc<BackendClient>,
    pub model_config: Arc<ModelConfigStore>,
    pub status: Arc<StatusAggregator>,
}

impl AppContext {
    /// Build the full context from a backend configuration, loading any
    /// persisted model configuration from the default location.
    pub fn new(config: BackendConfig) -> Self {
        Self::with_store(config, ModelConfigStore::open_default())
    }

    /// Build the context with an explicit store. Tests point this at a
    /// temporary directory.
    pub fn with_store(config: BackendConfig, store: ModelConfigStore) -> Self {
        let client = Arc::new(BackendClient::new(&config));
        let model_config = Arc::new(store);
        let probe: Arc<dyn BackendProbe> = Arc::new(HealthProbe::new(Arc::clone(&client)));
        let status = StatusAggregator::new(probe, Arc::clone(&model_config));
        Self {
            config,
            client,
            model_config,
            status,
        }
    }

    /// Open the event channel for a job or session and wire its state
    /// into the published status snapshots.
    pub fn open_channel(&self, name: impl Into<String>) -> channel::EventChannel {
        let ch = channel::EventChannel::connect(&self.config, name);
        self.status.attach_channel(ch.watch_state());
        ch
    }

    /// Start periodic status polling at the configured interval.
    pub fn start_polling(&self) {
        self.status.start(self.config.poll_interval());
    }
}
