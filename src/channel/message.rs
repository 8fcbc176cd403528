//! Inbound frame parsing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Message kind pushed during a generation run.
pub const GENERATION_UPDATE: &str = "generation_update";
/// Message kind pushed when an individual agent changes state.
pub const AGENT_UPDATE: &str = "agent_update";

/// Raw frame shape pushed by the backend job runner. The server-side
/// timestamp is deliberately ignored; arrival time is assigned locally.
#[derive(Debug, Deserialize)]
struct WireFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// A typed, client-timestamped message from the event stream.
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ChannelMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

impl ChannelMessage {
    /// Parse one inbound text frame. Returns `None` (after logging) on
    /// malformed JSON or a missing `type` discriminator — a bad frame is
    /// dropped, never an excuse to tear down the connection.
    pub fn parse(text: &str) -> Option<Self> {
        match serde_json::from_str::<WireFrame>(text) {
            Ok(frame) => Some(Self {
                kind: frame.kind,
                payload: frame.data,
                received_at: Utc::now(),
            }),
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed event frame");
                None
            }
        }
    }
}
