//! System status snapshot types shared with the UI.
//!
//! A `SystemStatus` is recomputed wholesale every poll cycle and published
//! as an immutable snapshot; nothing here is partially mutated in place.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Readiness of the configured AI engine as seen through the health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum AiEngineState {
    Online,
    Offline,
    Unknown,
}

/// Tri-state summary of the whole system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct BackendStatus {
    pub healthy: bool,
    pub last_check: Option<DateTime<Utc>>,
    pub response_time_ms: u64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct AiEngineStatus {
    pub state: AiEngineState,
    pub model_name: String,
    pub quota_preserved: bool,
    pub api_key_configured: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct AgentsStatus {
    pub active: bool,
    pub total: u32,
    pub operational: u32,
    /// Agent name → status label, when the detail probe succeeded.
    pub details: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStatus {
    pub connected: bool,
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OverallStatus {
    pub verdict: Verdict,
    pub message: String,
}

/// The unified status snapshot the UI renders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub backend: BackendStatus,
    pub ai_engine: AiEngineStatus,
    pub agents: AgentsStatus,
    pub event_channel: ChannelStatus,
    pub overall: OverallStatus,
}

impl Default for SystemStatus {
    /// Fresh state before the first poll cycle: everything unknown or
    /// inactive, which the verdict rule maps to unhealthy.
    fn default() -> Self {
        Self {
            backend: BackendStatus {
                healthy: false,
                last_check: None,
                response_time_ms: 0,
                error: None,
            },
            ai_engine: AiEngineStatus {
                state: AiEngineState::Unknown,
                model_name: String::new(),
                quota_preserved: false,
                api_key_configured: false,
            },
            agents: AgentsStatus {
                active: false,
                total: 0,
                operational: 0,
                details: None,
            },
            event_channel: ChannelStatus {
                connected: false,
                state: "disconnected".into(),
            },
            overall: OverallStatus {
                verdict: Verdict::Unhealthy,
                message: "Status not yet checked".into(),
            },
        }
    }
}

/// Compute the overall verdict from the three sub-checks, evaluated in
/// priority order: backend reachability, AI engine readiness, agent
/// activity. Pure function of its inputs; no hidden state.
pub fn compute_overall(
    backend_healthy: bool,
    ai_state: AiEngineState,
    agents_active: bool,
) -> OverallStatus {
    if !backend_healthy {
        return OverallStatus {
            verdict: Verdict::Unhealthy,
            message: "Backend unreachable".into(),
        };
    }
    if ai_state == AiEngineState::Online && agents_active {
        return OverallStatus {
            verdict: Verdict::Healthy,
            message: "All systems operational".into(),
        };
    }
    let message = if ai_state != AiEngineState::Online {
        "AI engine not ready"
    } else {
        "Agent system inactive"
    };
    OverallStatus {
        verdict: Verdict::Degraded,
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unhealthy_backend_dominates() {
        let overall = compute_overall(false, AiEngineState::Online, true);
        assert_eq!(overall.verdict, Verdict::Unhealthy);
    }

    #[test]
    fn test_healthy_requires_all_three() {
        let overall = compute_overall(true, AiEngineState::Online, true);
        assert_eq!(overall.verdict, Verdict::Healthy);
    }

    #[test]
    fn test_degraded_when_ai_not_online() {
        for state in [AiEngineState::Offline, AiEngineState::Unknown] {
            let overall = compute_overall(true, state, true);
            assert_eq!(overall.verdict, Verdict::Degraded);
        }
    }

    #[test]
    fn test_degraded_when_agents_inactive() {
        let overall = compute_overall(true, AiEngineState::Online, false);
        assert_eq!(overall.verdict, Verdict::Degraded);
        assert_eq!(overall.message, "Agent system inactive");
    }

    #[test]
    fn test_default_snapshot_is_unhealthy() {
        let status = SystemStatus::default();
        assert_eq!(status.overall.verdict, Verdict::Unhealthy);
        assert_eq!(status.ai_engine.state, AiEngineState::Unknown);
        assert!(status.backend.last_check.is_none());
    }
}
