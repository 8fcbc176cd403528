//! Backend connection settings.
//!
//! One `BackendConfig` is constructed at process start and passed by
//! reference to everything that talks to the backend. There is no hidden
//! module-level state; single-instance semantics are the host's choice.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Base URL used when the host supplies nothing (local dev backend).
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Fixed timeout for every health and status request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of seconds between automatic status polls.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;

/// Connection settings for the DataGenesis backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base HTTP URL of the backend, without a trailing slash.
    pub base_url: String,
    /// Base WebSocket URL (`ws://…`). Derived from `base_url` when unset.
    #[serde(default)]
    pub ws_url: Option<String>,
    /// Seconds between automatic status polls. Zero disables periodic
    /// polling; status is then refreshed only by manual force checks.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl BackendConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ws_url: None,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
        }
    }

    /// WebSocket endpoint for a named channel.
    ///
    /// Falls back to the HTTP base with the scheme swapped (`http` → `ws`,
    /// `https` → `wss`) when no explicit WebSocket base is configured.
    pub fn channel_url(&self, channel: &str) -> String {
        let base = self
            .ws_url
            .clone()
            .unwrap_or_else(|| self.base_url.replacen("http", "ws", 1));
        format!("{}/ws/{}", base.trim_end_matches('/'), channel)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_url_from_http_base() {
        let config = BackendConfig::new("http://localhost:8000");
        assert_eq!(config.channel_url("job-1"), "ws://localhost:8000/ws/job-1");
    }

    #[test]
    fn test_channel_url_from_https_base() {
        let config = BackendConfig::new("https://api.datagenesis.example");
        assert_eq!(
            config.channel_url("guest_user"),
            "wss://api.datagenesis.example/ws/guest_user"
        );
    }

    #[test]
    fn test_channel_url_explicit_ws_base() {
        let mut config = BackendConfig::new("https://api.datagenesis.example");
        config.ws_url = Some("wss://stream.datagenesis.example/".into());
        assert_eq!(
            config.channel_url("job-2"),
            "wss://stream.datagenesis.example/ws/job-2"
        );
    }

    #[test]
    fn test_zero_interval_disables_polling() {
        let mut config = BackendConfig::default();
        config.poll_interval_secs = 0;
        assert!(config.poll_interval().is_zero());
    }
}
