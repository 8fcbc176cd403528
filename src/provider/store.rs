//! Durable storage for the active model configuration.
//!
//! One JSON document on disk, one cached copy in memory. The file is read
//! once when the store opens; absence or corruption degrades to "not
//! configured" rather than erroring.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::error::AppError;

use super::ModelConfig;

/// File name of the persisted configuration document.
const CONFIG_FILE: &str = "model_config.json";

/// Single source of truth for the active AI-provider configuration.
pub struct ModelConfigStore {
    path: PathBuf,
    current: RwLock<Option<ModelConfig>>,
}

impl ModelConfigStore {
    /// Open the store at the default location under the host's data
    /// directory.
    pub fn open_default() -> Self {
        let dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("datagenesis");
        Self::open(dir.join(CONFIG_FILE))
    }

    /// Open the store at an explicit path, loading any persisted
    /// configuration.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let current = load_from_disk(&path);
        Self {
            path,
            current: RwLock::new(current),
        }
    }

    /// The active configuration, if any.
    pub fn get(&self) -> Option<ModelConfig> {
        self.current.read().unwrap().clone()
    }

    pub fn is_configured(&self) -> bool {
        self.current.read().unwrap().is_some()
    }

    /// Validate and store a new configuration, fully replacing any prior
    /// one in memory and on disk. Durable state is untouched when
    /// validation fails.
    pub fn set(&self, config: ModelConfig) -> Result<ModelConfig, AppError> {
        config.validate()?;
        let config = config.normalized();

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let serialized = serde_json::to_string_pretty(&config)?;
        std::fs::write(&self.path, serialized)?;

        *self.current.write().unwrap() = Some(config.clone());
        tracing::info!(
            provider = config.provider.as_str(),
            model = %config.model,
            "Model configuration stored"
        );
        Ok(config)
    }

    /// Clear the active configuration from memory and disk.
    pub fn remove(&self) -> Result<(), AppError> {
        *self.current.write().unwrap() = None;
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn load_from_disk(path: &Path) -> Option<ModelConfig> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to read stored model config");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Corrupt model config, ignoring");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{Provider, DEFAULT_OLLAMA_ENDPOINT};

    fn make_store() -> (tempfile::TempDir, ModelConfigStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelConfigStore::open(dir.path().join(CONFIG_FILE));
        (dir, store)
    }

    fn make_valid_config(provider: Provider) -> ModelConfig {
        let (model, api_key) = match provider {
            Provider::Gemini => ("gemini-2.0-flash-exp", "AIzaSy-test"),
            Provider::OpenAi => ("gpt-4o", "sk-test"),
            Provider::Anthropic => ("claude-3-5-sonnet-20241022", "sk-ant-test"),
            Provider::Ollama => ("llama3:8b", ""),
        };
        ModelConfig {
            provider,
            model: model.into(),
            api_key: api_key.into(),
            endpoint: None,
        }
    }

    #[test]
    fn test_round_trip_every_provider() {
        for provider in Provider::ALL {
            let (dir, store) = make_store();
            let stored = store.set(make_valid_config(provider)).unwrap();

            // Simulated restart: a fresh store re-parses durable storage.
            let reloaded = ModelConfigStore::open(store.path());
            assert_eq!(reloaded.get(), Some(stored));
            drop(dir);
        }
    }

    #[test]
    fn test_ollama_round_trip_keeps_default_endpoint() {
        let (_dir, store) = make_store();
        let stored = store.set(make_valid_config(Provider::Ollama)).unwrap();
        assert_eq!(stored.endpoint.as_deref(), Some(DEFAULT_OLLAMA_ENDPOINT));

        let reloaded = ModelConfigStore::open(store.path());
        assert_eq!(
            reloaded.get().unwrap().endpoint.as_deref(),
            Some(DEFAULT_OLLAMA_ENDPOINT)
        );
    }

    #[test]
    fn test_rejected_set_leaves_durable_state_unchanged() {
        let (_dir, store) = make_store();
        store.set(make_valid_config(Provider::Gemini)).unwrap();
        let before = std::fs::read_to_string(store.path()).unwrap();

        let invalid = ModelConfig {
            provider: Provider::OpenAi,
            model: "gpt-4".into(),
            api_key: "".into(),
            endpoint: None,
        };
        assert!(matches!(store.set(invalid), Err(AppError::Validation(_))));

        let after = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(before, after);
        assert_eq!(store.get().unwrap().provider, Provider::Gemini);
    }

    #[test]
    fn test_missing_file_means_not_configured() {
        let (_dir, store) = make_store();
        assert!(!store.is_configured());
        assert_eq!(store.get(), None);
    }

    #[test]
    fn test_corrupt_file_degrades_to_not_configured() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "{not json").unwrap();

        let store = ModelConfigStore::open(&path);
        assert!(!store.is_configured());
    }

    #[test]
    fn test_remove_clears_memory_and_disk() {
        let (_dir, store) = make_store();
        store.set(make_valid_config(Provider::Anthropic)).unwrap();
        store.remove().unwrap();

        assert!(!store.is_configured());
        assert!(!store.path().exists());
        // Removing again is a no-op, not an error.
        store.remove().unwrap();
    }

    #[test]
    fn test_set_replaces_wholesale() {
        let (_dir, store) = make_store();
        store.set(make_valid_config(Provider::Ollama)).unwrap();
        store.set(make_valid_config(Provider::OpenAi)).unwrap();

        let current = store.get().unwrap();
        assert_eq!(current.provider, Provider::OpenAi);
        // No merge: the Ollama endpoint must not survive the replacement.
        assert_eq!(current.endpoint, None);
    }
}
