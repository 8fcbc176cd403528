//! Wire types for the DataGenesis backend HTTP API.
//!
//! Every field the console does not strictly need is optional: the backend
//! evolves independently, and an absent key must degrade to "unknown"
//! rather than fail a whole status cycle.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ============================================================================
// Health document
// ============================================================================

/// One entry in the health document's `services` map. The backend mixes
/// shapes here: AI services are objects, infrastructure services are bare
/// labels (`"agents": "active"`).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ServiceEntry {
    Detail(ServiceDetail),
    Label(String),
    /// Anything else — kept so one odd entry cannot poison the document.
    Other(serde_json::Value),
}

/// Per-service detail as reported for AI providers.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceDetail {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub quota_available: Option<bool>,
    #[serde(default)]
    pub quota_preserved: Option<bool>,
}

/// Parsed view over the `GET /api/health` body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HealthBody {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub ai_available: Option<bool>,
    #[serde(default)]
    pub services: BTreeMap<String, ServiceEntry>,
}

impl HealthBody {
    /// Tolerant parse: a missing or malformed body degrades to the empty
    /// document instead of erroring.
    pub fn from_value(value: Option<&serde_json::Value>) -> Self {
        let Some(value) = value else {
            return Self::default();
        };
        match serde_json::from_value(value.clone()) {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(error = %e, "Malformed health body, treating as empty");
                Self::default()
            }
        }
    }

    /// Object-shaped service entry, if present.
    pub fn service_detail(&self, name: &str) -> Option<&ServiceDetail> {
        match self.services.get(name) {
            Some(ServiceEntry::Detail(detail)) => Some(detail),
            _ => None,
        }
    }

    /// Label-shaped service entry, if present.
    pub fn service_label(&self, name: &str) -> Option<&str> {
        match self.services.get(name) {
            Some(ServiceEntry::Label(label)) => Some(label.as_str()),
            _ => None,
        }
    }
}

// ============================================================================
// Agents status
// ============================================================================

/// `GET /api/agents/status` response body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentsStatusResponse {
    #[serde(default)]
    pub orchestrator_status: Option<String>,
    #[serde(default)]
    pub total_agents: Option<u32>,
    #[serde(default)]
    pub agents: BTreeMap<String, AgentStatus>,
}

/// Per-agent status as reported by the orchestrator.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentStatus {
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub performance: Option<f64>,
    #[serde(default)]
    pub last_updated: Option<String>,
}

// ============================================================================
// AI configuration
// ============================================================================

/// `POST /api/ai/configure` request body.
#[derive(Debug, Serialize)]
pub struct ConfigureRequest<'a> {
    pub provider: &'a str,
    pub model: &'a str,
    pub api_key: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<&'a str>,
}

/// `POST /api/ai/configure` response body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigureResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// `POST /api/ai/test-connection` response body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TestConnectionResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// `GET /api/ai/status` response body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AiStatusResponse {
    #[serde(default)]
    pub is_configured: bool,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// Result of pushing a configuration to the backend: the configure call
/// itself plus the non-fatal connection test.
#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    pub configured: ConfigureResponse,
    /// `None` when the connection test failed; the configuration stands.
    pub test: Option<TestConnectionResponse>,
}

// ============================================================================
// Tests
// ============================================================================
