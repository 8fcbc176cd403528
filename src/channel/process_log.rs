//! Bounded progress log derived from the event stream.
//!
//! Generation runs push a steady stream of progress frames; the UI keeps
//! only the most recent slice of them. `ProcessLog` is a FIFO ring: at
//! capacity the oldest entry is evicted, insertion order is preserved.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use super::message::{ChannelMessage, AGENT_UPDATE, GENERATION_UPDATE};

/// Capacity of the full process logger.
pub const FULL_LOG_CAPACITY: usize = 50;
/// Capacity of the compact monitor view.
pub const MONITOR_CAPACITY: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Scores attached to the final phases of a generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct GenerationMetrics {
    pub quality_score: Option<f64>,
    pub privacy_score: Option<f64>,
    pub bias_score: Option<f64>,
}

/// One rendered progress line.
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ProcessLogEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    pub step: String,
    /// Percent complete; -1 when the frame carried no progress figure.
    pub progress: i32,
    pub agent: Option<String>,
    pub metrics: Option<GenerationMetrics>,
}

impl ProcessLogEntry {
    /// Build a log entry from a progress frame. Returns `None` for message
    /// kinds that carry no progress payload.
    pub fn from_message(msg: &ChannelMessage) -> Option<Self> {
        if msg.kind != GENERATION_UPDATE && msg.kind != AGENT_UPDATE {
            return None;
        }
        let data = &msg.payload;
        let step = data
            .get("step")
            .and_then(|v| v.as_str())
            .unwrap_or("update")
            .to_string();
        let message = data
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let progress = data
            .get("progress")
            .and_then(|v| v.as_i64())
            .map(|p| p.clamp(-1, 100) as i32)
            .unwrap_or(-1);

        Some(Self {
            id: Uuid::new_v4().to_string(),
            timestamp: msg.received_at,
            level: derive_level(&message, &step),
            agent: derive_agent(&step),
            metrics: parse_metrics(data),
            message,
            step,
            progress,
        })
    }
}

/// Keyword → agent attribution for a progress step.
fn derive_agent(step: &str) -> Option<String> {
    const AGENTS: &[(&str, &str)] = &[
        ("domain", "Domain Expert"),
        ("privacy", "Privacy Agent"),
        ("bias", "Bias Detector"),
        ("relationship", "Relationship Agent"),
        ("quality", "Quality Agent"),
    ];
    let step = step.to_lowercase();
    AGENTS
        .iter()
        .find(|(keyword, _)| step.contains(keyword))
        .map(|(_, name)| (*name).to_string())
}

/// Level heuristics mirror the backend's progress messages: completion
/// markers read as success, failures as error, fallback paths as warning.
fn derive_level(message: &str, step: &str) -> LogLevel {
    let text = format!("{} {}", message.to_lowercase(), step.to_lowercase());
    if text.contains("error") || text.contains("failed") {
        LogLevel::Error
    } else if text.contains("warning") || text.contains("fallback") {
        LogLevel::Warning
    } else if text.contains("complete") || text.contains("✅") || step == "completion" {
        LogLevel::Success
    } else {
        LogLevel::Info
    }
}

fn parse_metrics(data: &serde_json::Value) -> Option<GenerationMetrics> {
    let metrics = data.get("metrics")?;
    Some(GenerationMetrics {
        quality_score: metrics.get("quality_score").and_then(|v| v.as_f64()),
        privacy_score: metrics.get("privacy_score").and_then(|v| v.as_f64()),
        bias_score: metrics.get("bias_score").and_then(|v| v.as_f64()),
    })
}

// =============================================================================
// ProcessLog
// =============================================================================

/// FIFO ring of the most recent log entries.
#[derive(Debug)]
pub struct ProcessLog {
    entries: VecDeque<ProcessLogEntry>,
    capacity: usize,
}

impl ProcessLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Full-size logger used by the generation log view.
    pub fn full() -> Self {
        Self::new(FULL_LOG_CAPACITY)
    }

    /// Compact logger used by the monitor widget.
    pub fn monitor() -> Self {
        Self::new(MONITOR_CAPACITY)
    }

    /// Record a progress frame; at capacity the oldest entry is evicted.
    /// Returns the stored entry, or `None` when the frame kind carries no
    /// progress payload.
    pub fn record(&mut self, msg: &ChannelMessage) -> Option<&ProcessLogEntry> {
        let entry = ProcessLogEntry::from_message(msg)?;
        self.push(entry);
        self.entries.back()
    }

    pub fn push(&mut self, entry: ProcessLogEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Entries in arrival order, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &ProcessLogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

// =============================================================================
// Tests
// =============================================================================
