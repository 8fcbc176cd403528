//! AI provider catalog and the active model configuration.

pub mod store;

pub use store::ModelConfigStore;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::AppError;

/// Default endpoint for a local Ollama instance.
pub const DEFAULT_OLLAMA_ENDPOINT: &str = "http://localhost:11434";

// =============================================================================
// Provider — which AI backend is selected
// =============================================================================

/// Supported AI providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Gemini,
    OpenAi,
    Anthropic,
    Ollama,
}

impl Provider {
    pub const ALL: [Provider; 4] = [
        Provider::Gemini,
        Provider::OpenAi,
        Provider::Anthropic,
        Provider::Ollama,
    ];

    /// Wire and storage identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Gemini => "gemini",
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Ollama => "ollama",
        }
    }

    /// Strict parse from the wire identifier.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.as_str() == s)
    }

    /// Human-readable name for error messages and UI.
    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::Gemini => "Google Gemini",
            Provider::OpenAi => "OpenAI GPT",
            Provider::Anthropic => "Anthropic Claude",
            Provider::Ollama => "Ollama (Local)",
        }
    }

    /// Hosted providers need a key; a local Ollama does not.
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, Provider::Ollama)
    }

    /// Known model identifiers. Ollama additionally accepts free-form
    /// names (the catalog lists `custom` for that path).
    pub fn known_models(&self) -> &'static [&'static str] {
        match self {
            Provider::Gemini => &[
                "gemini-1.5-flash",
                "gemini-1.5-pro",
                "gemini-2.0-flash-exp",
                "gemini-1.0-pro",
            ],
            Provider::OpenAi => &[
                "gpt-4",
                "gpt-4-turbo",
                "gpt-3.5-turbo",
                "gpt-4o",
                "gpt-4o-mini",
            ],
            Provider::Anthropic => &[
                "claude-3-sonnet-20240229",
                "claude-3-haiku-20240307",
                "claude-3-opus-20240229",
                "claude-3-5-sonnet-20241022",
            ],
            Provider::Ollama => &[
                "llama3:8b",
                "llama3:70b",
                "llama3.2:3b",
                "llama2:7b",
                "mistral:7b",
                "codellama:7b",
                "phi3:3.8b",
                "custom",
            ],
        }
    }

    /// Expected key prefix, shown as a hint in configuration forms.
    pub fn api_key_format(&self) -> Option<&'static str> {
        match self {
            Provider::Gemini => Some("AIzaSy..."),
            Provider::OpenAi => Some("sk-..."),
            Provider::Anthropic => Some("sk-ant-..."),
            Provider::Ollama => None,
        }
    }
}

// =============================================================================
// ModelConfig
// =============================================================================

/// Active AI-provider configuration. Replaced wholesale on every change,
/// persisted as a single document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    pub provider: Provider,
    pub model: String,
    pub api_key: String,
    /// Ollama only; defaulted to the local loopback endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub endpoint: Option<String>,
}

impl ModelConfig {
    /// Synchronous validation, applied before anything is stored.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.model.trim().is_empty() {
            return Err(AppError::Validation("Model identifier is required".into()));
        }
        if self.provider.requires_api_key() && self.api_key.trim().is_empty() {
            return Err(AppError::Validation(format!(
                "{} requires an API key",
                self.provider.display_name()
            )));
        }
        if self.provider != Provider::Ollama
            && !self.provider.known_models().contains(&self.model.as_str())
        {
            return Err(AppError::Validation(format!(
                "Unknown {} model: {}",
                self.provider.display_name(),
                self.model
            )));
        }
        Ok(())
    }

    /// Fill defaults that only apply to local providers.
    pub(crate) fn normalized(mut self) -> Self {
        match self.provider {
            Provider::Ollama => {
                if self.endpoint.is_none() {
                    self.endpoint = Some(DEFAULT_OLLAMA_ENDPOINT.into());
                }
            }
            _ => self.endpoint = None,
        }
        self
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn make_config(provider: Provider, model: &str, api_key: &str) -> ModelConfig {
        ModelConfig {
            provider,
            model: model.into(),
            api_key: api_key.into(),
            endpoint: None,
        }
    }

    #[test]
    fn test_provider_round_trip_identifiers() {
        for provider in Provider::ALL {
            assert_eq!(Provider::parse(provider.as_str()), Some(provider));
        }
        assert_eq!(Provider::parse("cohere"), None);
    }

    #[test]
    fn test_provider_serde_uses_wire_names() {
        let wire = serde_json::to_string(&Provider::OpenAi).unwrap();
        assert_eq!(wire, "\"openai\"");
        let parsed: Provider = serde_json::from_str("\"anthropic\"").unwrap();
        assert_eq!(parsed, Provider::Anthropic);
    }

    #[test]
    fn test_validate_requires_api_key_for_hosted_providers() {
        let config = make_config(Provider::OpenAi, "gpt-4", "");
        assert!(matches!(config.validate(), Err(AppError::Validation(_))));

        let config = make_config(Provider::Ollama, "llama3:8b", "");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_hosted_model() {
        let config = make_config(Provider::Gemini, "gemini-9000", "AIzaSy-test");
        assert!(matches!(config.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_validate_allows_free_form_ollama_model() {
        let config = make_config(Provider::Ollama, "my-finetune:latest", "");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_model() {
        let config = make_config(Provider::Ollama, "  ", "");
        assert!(matches!(config.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_normalized_defaults_ollama_endpoint() {
        let config = make_config(Provider::Ollama, "llama3:8b", "").normalized();
        assert_eq!(config.endpoint.as_deref(), Some(DEFAULT_OLLAMA_ENDPOINT));
    }

    #[test]
    fn test_normalized_strips_endpoint_for_hosted_providers() {
        let mut config = make_config(Provider::OpenAi, "gpt-4o", "sk-test");
        config.endpoint = Some("http://localhost:9999".into());
        assert_eq!(config.normalized().endpoint, None);
    }
}
