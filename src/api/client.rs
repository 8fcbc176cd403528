use serde::de::DeserializeOwned;

use crate::config::{BackendConfig, REQUEST_TIMEOUT};
use crate::error::AppError;
use crate::provider::ModelConfig;

use super::types::{
    AgentsStatusResponse, AiStatusResponse, ApplyOutcome, ConfigureRequest, ConfigureResponse,
    TestConnectionResponse,
};

/// Convert any displayable error into `AppError::Backend`.
fn backend_err(e: impl std::fmt::Display) -> AppError {
    AppError::Backend(e.to_string())
}

/// HTTP client that wraps the DataGenesis backend endpoints.
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    /// Create a new `BackendClient` for the configured base URL.
    ///
    /// The underlying `reqwest::Client` carries the fixed 30-second timeout;
    /// a request that outlives it is a transport failure, not a hang.
    pub fn new(config: &BackendConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to build reqwest client");

        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    // --------------------------------------------------------------------
    // Private HTTP helpers
    // --------------------------------------------------------------------

    /// Build a request to the given endpoint path.
    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
    }

    /// Send a request, check the status code, and deserialize the JSON response.
    async fn send_json<T: DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<T, AppError> {
        req.send()
            .await
            .map_err(backend_err)?
            .error_for_status()
            .map_err(backend_err)?
            .json()
            .await
            .map_err(backend_err)
    }

    // --------------------------------------------------------------------
    // Health & status
    // --------------------------------------------------------------------

    /// `GET /api/health` -- raw health document. The probe layer maps
    /// transport failures to an unhealthy outcome.
    pub async fn health(&self) -> Result<serde_json::Value, AppError> {
        self.send_json(self.request(reqwest::Method::GET, "/api/health"))
            .await
    }

    /// `GET /api/agents/status` -- per-agent orchestrator detail.
    pub async fn agents_status(&self) -> Result<AgentsStatusResponse, AppError> {
        self.send_json(self.request(reqwest::Method::GET, "/api/agents/status"))
            .await
    }

    // --------------------------------------------------------------------
    // AI configuration
    // --------------------------------------------------------------------

    /// `POST /api/ai/configure` -- hand the active provider credentials to
    /// the backend.
    pub async fn configure_ai(&self, config: &ModelConfig) -> Result<ConfigureResponse, AppError> {
        let req = self
            .request(reqwest::Method::POST, "/api/ai/configure")
            .json(&ConfigureRequest {
                provider: config.provider.as_str(),
                model: &config.model,
                api_key: &config.api_key,
                endpoint: config.endpoint.as_deref(),
            });
        self.send_json(req).await
    }

    /// `POST /api/ai/test-connection` -- validate the configured provider.
    pub async fn test_connection(&self) -> Result<TestConnectionResponse, AppError> {
        self.send_json(self.request(reqwest::Method::POST, "/api/ai/test-connection"))
            .await
    }

    /// `GET /api/ai/status` -- whether the backend holds a configuration.
    pub async fn ai_status(&self) -> Result<AiStatusResponse, AppError> {
        self.send_json(self.request(reqwest::Method::GET, "/api/ai/status"))
            .await
    }

    /// `GET /api/ai/providers` -- the backend's provider directory.
    pub async fn providers(&self) -> Result<serde_json::Value, AppError> {
        self.send_json(self.request(reqwest::Method::GET, "/api/ai/providers"))
            .await
    }

    /// Push a stored configuration to the backend, then run the connection
    /// test. A failed test is reported but does not undo the configuration.
    pub async fn apply_configuration(
        &self,
        config: &ModelConfig,
    ) -> Result<ApplyOutcome, AppError> {
        let configured = self.configure_ai(config).await?;
        let test = match self.test_connection().await {
            Ok(test) => Some(test),
            Err(e) => {
                tracing::warn!(
                    provider = config.provider.as_str(),
                    error = %e,
                    "AI connection test failed after configure"
                );
                None
            }
        };
        Ok(ApplyOutcome { configured, test })
    }
}
