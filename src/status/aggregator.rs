//! Periodic status aggregation with a single-flight guard.
//!
//! The aggregator owns the authoritative `SystemStatus` and replaces it
//! wholesale at the end of every poll cycle. At most one cycle is in
//! flight at any time; a check requested while one is running is dropped,
//! not queued. One failed cycle never stops future cycles.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::api::types::{AgentsStatusResponse, HealthBody};
use crate::channel::ChannelState;
use crate::error::AppError;
use crate::provider::{ModelConfig, ModelConfigStore, Provider};

use super::probe::BackendProbe;
use super::types::{
    compute_overall, AgentsStatus, AiEngineState, AiEngineStatus, BackendStatus, ChannelStatus,
    SystemStatus,
};

/// Maintains one authoritative `SystemStatus` via periodic polling.
pub struct StatusAggregator {
    probe: Arc<dyn BackendProbe>,
    model_config: Arc<ModelConfigStore>,
    /// Live channel state, when an event channel has been attached.
    channel_state: Mutex<Option<watch::Receiver<ChannelState>>>,
    status_tx: watch::Sender<SystemStatus>,
    /// Single-flight guard: true while a cycle is in progress.
    checking: AtomicBool,
    poll_cancel: Mutex<Option<CancellationToken>>,
}

impl StatusAggregator {
    pub fn new(probe: Arc<dyn BackendProbe>, model_config: Arc<ModelConfigStore>) -> Arc<Self> {
        let (status_tx, _) = watch::channel(SystemStatus::default());
        Arc::new(Self {
            probe,
            model_config,
            channel_state: Mutex::new(None),
            status_tx,
            checking: AtomicBool::new(false),
            poll_cancel: Mutex::new(None),
        })
    }

    /// Wire an event channel's state into the published snapshots.
    pub fn attach_channel(&self, rx: watch::Receiver<ChannelState>) {
        *self.channel_state.lock().unwrap() = Some(rx);
    }

    /// Subscribe to status snapshots.
    pub fn subscribe(&self) -> watch::Receiver<SystemStatus> {
        self.status_tx.subscribe()
    }

    /// Latest published snapshot.
    pub fn current(&self) -> SystemStatus {
        self.status_tx.borrow().clone()
    }

    /// Start polling: one immediate cycle, then one every `interval`.
    /// A zero interval disables periodic polling; the status is then only
    /// refreshed by `force_check`. Restarting replaces any previous loop.
    pub fn start(self: &Arc<Self>, interval: Duration) {
        self.stop();
        let token = CancellationToken::new();
        *self.poll_cancel.lock().unwrap() = Some(token.clone());

        let aggregator = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = aggregator.force_check() => {}
            }
            if interval.is_zero() {
                return;
            }

            let mut ticker = tokio::time::interval(interval);
            // The first tick of an interval fires immediately; the initial
            // cycle above already covered it.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => aggregator.force_check().await,
                }
            }
            tracing::info!("Status polling loop exited");
        });
    }

    /// Stop periodic polling. Safe to call when not started.
    pub fn stop(&self) {
        if let Some(token) = self.poll_cancel.lock().unwrap().take() {
            token.cancel();
        }
    }

    /// Run one poll cycle now, unless a cycle is already in flight (in
    /// which case this request is silently dropped).
    pub async fn force_check(&self) {
        if self
            .checking
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("Status check already in flight, dropping request");
            return;
        }

        let status = match self.run_cycle().await {
            Ok(status) => status,
            Err(e) => {
                tracing::error!(error = %e, "Status cycle failed, reporting backend unhealthy");
                self.unhealthy_snapshot(0, e.to_string())
            }
        };
        self.status_tx.send_replace(status);
        self.checking.store(false, Ordering::SeqCst);
    }

    async fn run_cycle(&self) -> Result<SystemStatus, AppError> {
        let started = Instant::now();
        let outcome = self.probe.health().await;
        let response_time_ms = started.elapsed().as_millis() as u64;

        if !outcome.healthy {
            let error = outcome
                .error
                .unwrap_or_else(|| "Backend reported unhealthy".into());
            return Ok(self.unhealthy_snapshot(response_time_ms, error));
        }

        let config = self.model_config.get();
        let body = HealthBody::from_value(outcome.data.as_ref());
        let ai_engine = derive_ai_engine(&body, config.as_ref());
        let mut agents = derive_agents(&body);

        // Secondary probe refines agent detail; its failure must not fail
        // the cycle.
        match self.probe.agents().await {
            Ok(detail) => refine_agents(&mut agents, &detail),
            Err(e) => {
                tracing::warn!(error = %e, "Agents status probe failed, keeping health-derived values");
            }
        }

        let overall = compute_overall(true, ai_engine.state, agents.active);
        Ok(SystemStatus {
            backend: BackendStatus {
                healthy: true,
                last_check: Some(Utc::now()),
                response_time_ms,
                error: None,
            },
            ai_engine,
            agents,
            event_channel: self.channel_status(),
            overall,
        })
    }

    /// Snapshot for an unreachable backend: AI forced offline, agents
    /// inactive, channel state carried through untouched.
    fn unhealthy_snapshot(&self, response_time_ms: u64, error: String) -> SystemStatus {
        let config = self.model_config.get();
        SystemStatus {
            backend: BackendStatus {
                healthy: false,
                last_check: Some(Utc::now()),
                response_time_ms,
                error: Some(error),
            },
            ai_engine: AiEngineStatus {
                state: AiEngineState::Offline,
                model_name: configured_model(config.as_ref()),
                quota_preserved: false,
                api_key_configured: api_key_configured(config.as_ref()),
            },
            agents: AgentsStatus {
                active: false,
                total: 0,
                operational: 0,
                details: None,
            },
            event_channel: self.channel_status(),
            overall: compute_overall(false, AiEngineState::Offline, false),
        }
    }

    fn channel_status(&self) -> ChannelStatus {
        let guard = self.channel_state.lock().unwrap();
        match guard.as_ref() {
            Some(rx) => {
                let state = *rx.borrow();
                ChannelStatus {
                    connected: state.is_connected(),
                    state: state.as_str().to_string(),
                }
            }
            None => self.status_tx.borrow().event_channel.clone(),
        }
    }
}

impl Drop for StatusAggregator {
    fn drop(&mut self) {
        self.stop();
    }
}

// =============================================================================
// Derivation
// =============================================================================

/// Map a service status literal to an engine state. Only `online` and
/// `ready` count as online; any other present value is offline, an absent
/// entry is unknown.
fn engine_state_from_status(status: Option<&str>) -> AiEngineState {
    match status {
        Some("online") | Some("ready") => AiEngineState::Online,
        Some(_) => AiEngineState::Offline,
        None => AiEngineState::Unknown,
    }
}

fn derive_ai_engine(body: &HealthBody, config: Option<&ModelConfig>) -> AiEngineStatus {
    let provider_key = config
        .map(|c| c.provider.as_str())
        .unwrap_or(Provider::Gemini.as_str());
    let service = body.service_detail(provider_key);

    let state = match service {
        Some(detail) => engine_state_from_status(detail.status.as_deref()),
        // The backend only reports the providers it hosts adapters for;
        // fall back to the aggregate availability flag.
        None => match body.ai_available {
            Some(true) => AiEngineState::Online,
            Some(false) => AiEngineState::Offline,
            None => AiEngineState::Unknown,
        },
    };

    let model_name = config
        .map(|c| c.model.clone())
        .or_else(|| service.and_then(|d| d.model.clone()))
        .unwrap_or_default();

    AiEngineStatus {
        state,
        model_name,
        quota_preserved: service.and_then(|d| d.quota_preserved).unwrap_or(false),
        api_key_configured: api_key_configured(config),
    }
}

fn derive_agents(body: &HealthBody) -> AgentsStatus {
    AgentsStatus {
        active: body.service_label("agents") == Some("active"),
        total: 0,
        operational: 0,
        details: None,
    }
}

fn refine_agents(agents: &mut AgentsStatus, detail: &AgentsStatusResponse) {
    if let Some(status) = detail.orchestrator_status.as_deref() {
        agents.active = status == "active";
    }

    let operational = detail
        .agents
        .values()
        .filter(|a| a.status.as_deref() == Some("active"))
        .count() as u32;
    let total = detail.total_agents.unwrap_or(detail.agents.len() as u32);
    agents.operational = operational;
    agents.total = total.max(operational);

    if !detail.agents.is_empty() {
        agents.details = Some(
            detail
                .agents
                .iter()
                .map(|(name, a)| {
                    let status = a.status.clone().unwrap_or_else(|| "unknown".into());
                    (name.clone(), status)
                })
                .collect(),
        );
    }
}

fn configured_model(config: Option<&ModelConfig>) -> String {
    config.map(|c| c.model.clone()).unwrap_or_default()
}

fn api_key_configured(config: Option<&ModelConfig>) -> bool {
    match config {
        Some(c) => c.provider == Provider::Ollama || !c.api_key.trim().is_empty(),
        None => false,
    }
}

// =============================================================================
// Tests
// =============================================================================
