//! Health probing against the backend.
//!
//! The `BackendProbe` trait is the seam between the aggregator and the
//! transport: the aggregator's polling policy is tested with stub probes,
//! transport mechanics live behind `HealthProbe`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::api::client::BackendClient;
use crate::api::types::AgentsStatusResponse;
use crate::error::AppError;

/// Normalized result of one health probe.
#[derive(Debug, Clone, Default)]
pub struct ProbeOutcome {
    pub healthy: bool,
    /// Parsed response body on transport success; opaque to the probe.
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl ProbeOutcome {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            healthy: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            healthy: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// Probe interface consumed by the status aggregator.
#[async_trait]
pub trait BackendProbe: Send + Sync {
    /// One bounded-time health check. Transport failure is a negative
    /// outcome, never an `Err`.
    async fn health(&self) -> ProbeOutcome;

    /// Secondary probe for per-agent detail. Failures here are the
    /// caller's partial-failure case, so this one does return `Err`.
    async fn agents(&self) -> Result<AgentsStatusResponse, AppError>;
}

/// Live probe backed by the HTTP client.
pub struct HealthProbe {
    client: Arc<BackendClient>,
}

impl HealthProbe {
    pub fn new(client: Arc<BackendClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BackendProbe for HealthProbe {
    async fn health(&self) -> ProbeOutcome {
        match self.client.health().await {
            Ok(body) => ProbeOutcome::ok(body),
            Err(e) => {
                tracing::warn!(error = %e, "Backend health check failed");
                ProbeOutcome::failed(e.to_string())
            }
        }
    }

    async fn agents(&self) -> Result<AgentsStatusResponse, AppError> {
        self.client.agents_status().await
    }
}
