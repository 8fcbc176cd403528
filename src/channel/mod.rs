//! Auto-reconnecting event stream client.
//!
//! One `EventChannel` owns one logical subscription, named after the job
//! or session it follows. The connection task drives an explicit state
//! machine (disconnected → connecting → connected → … → failed) and the
//! reconnect policy is a pure function, kept apart from transport
//! mechanics so it can be tested without a socket.

pub mod message;
pub mod process_log;

pub use message::ChannelMessage;
pub use process_log::{ProcessLog, ProcessLogEntry};

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;
use ts_rs::TS;

use crate::config::BackendConfig;

/// Maximum automatic reconnect attempts before the channel fails terminally.
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Upper bound on the reconnect delay.
const MAX_RECONNECT_DELAY_MS: u64 = 10_000;

// =============================================================================
// State machine
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
    /// Terminal: reconnect attempts exhausted. Only an explicit new
    /// channel leaves this state.
    Failed,
}

impl ChannelState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelState::Disconnected => "disconnected",
            ChannelState::Connecting => "connecting",
            ChannelState::Connected => "connected",
            ChannelState::Failed => "failed",
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ChannelState::Connected)
    }
}

/// Exponential backoff for a given attempt number, capped at 10 s.
fn reconnect_delay(attempt: u32) -> Duration {
    Duration::from_millis((1000u64 << attempt).min(MAX_RECONNECT_DELAY_MS))
}

/// Decide whether another reconnect should be scheduled after a drop.
///
/// The attempt counter is incremented first, then the delay derived from
/// it. `None` once attempts are exhausted — the caller must go terminal.
fn next_reconnect(attempts: u32) -> Option<(u32, Duration)> {
    if attempts >= MAX_RECONNECT_ATTEMPTS {
        return None;
    }
    let attempt = attempts + 1;
    Some((attempt, reconnect_delay(attempt)))
}

// =============================================================================
// Shared channel state
// =============================================================================

struct ChannelShared {
    state_tx: watch::Sender<ChannelState>,
    last_message_tx: watch::Sender<Option<ChannelMessage>>,
    /// Most-recently-registered subscriber; replaced on each `subscribe`.
    subscriber: Mutex<Option<mpsc::UnboundedSender<ChannelMessage>>>,
}

impl ChannelShared {
    fn set_state(&self, state: ChannelState) {
        self.state_tx.send_replace(state);
    }

    /// Parse and fan out one inbound text frame. Malformed frames are
    /// dropped inside `ChannelMessage::parse`.
    fn deliver(&self, text: &str) {
        let Some(msg) = ChannelMessage::parse(text) else {
            return;
        };
        self.last_message_tx.send_replace(Some(msg.clone()));

        let mut slot = self.subscriber.lock().unwrap();
        if let Some(tx) = slot.as_ref() {
            if tx.send(msg).is_err() {
                // Receiver dropped; forget it so the next subscribe wins.
                *slot = None;
            }
        }
    }
}

// =============================================================================
// EventChannel
// =============================================================================

/// Handle to one live event stream subscription.
pub struct EventChannel {
    name: String,
    shared: Arc<ChannelShared>,
    outbound_tx: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
}

impl EventChannel {
    /// Open a channel against the configured backend and start its
    /// connection task.
    pub fn connect(config: &BackendConfig, channel: impl Into<String>) -> Self {
        let name = channel.into();
        let url = config.channel_url(&name);
        Self::connect_url(name, url)
    }

    /// Open a channel against an explicit WebSocket URL.
    pub fn connect_url(name: String, url: String) -> Self {
        let (state_tx, _) = watch::channel(ChannelState::Disconnected);
        let (last_message_tx, _) = watch::channel(None);
        let shared = Arc::new(ChannelShared {
            state_tx,
            last_message_tx,
            subscriber: Mutex::new(None),
        });
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        tokio::spawn(run_connection(
            url,
            name.clone(),
            Arc::clone(&shared),
            outbound_rx,
            cancel.clone(),
        ));

        Self {
            name,
            shared,
            outbound_tx,
            cancel,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ChannelState {
        *self.shared.state_tx.borrow()
    }

    /// Observe state transitions.
    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.shared.state_tx.subscribe()
    }

    /// Passive observer holding the most recent message.
    pub fn watch_last_message(&self) -> watch::Receiver<Option<ChannelMessage>> {
        self.shared.last_message_tx.subscribe()
    }

    /// Register the message handler. Replaces any previous subscriber —
    /// the most recent registration receives the stream, in arrival order.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ChannelMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.shared.subscriber.lock().unwrap() = Some(tx);
        rx
    }

    /// Fire-and-forget send. Dropped with a warning unless connected;
    /// nothing is queued for later delivery.
    pub fn send<T: Serialize>(&self, frame: &T) {
        if self.state() != ChannelState::Connected {
            tracing::warn!(
                channel = %self.name,
                state = self.state().as_str(),
                "Dropping outbound frame: channel not connected"
            );
            return;
        }
        match serde_json::to_string(frame) {
            Ok(text) => {
                let _ = self.outbound_tx.send(text);
            }
            Err(e) => {
                tracing::warn!(channel = %self.name, error = %e, "Dropping unserializable outbound frame");
            }
        }
    }

    /// Convenience keepalive; the backend answers with a `pong` frame.
    pub fn ping(&self) {
        self.send(&serde_json::json!({ "type": "ping" }));
    }

    /// Tear down: cancel any pending reconnect timer and close the
    /// transport. Safe to call from any state; a terminal `Failed` state
    /// is left as-is.
    pub fn disconnect(&self) {
        self.cancel.cancel();
        if self.state() != ChannelState::Failed {
            self.shared.set_state(ChannelState::Disconnected);
        }
    }
}

impl Drop for EventChannel {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// =============================================================================
// Connection task
// =============================================================================

async fn run_connection(
    url: String,
    name: String,
    shared: Arc<ChannelShared>,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
) {
    let mut attempts: u32 = 0;
    loop {
        // No await between this check and the state write, so teardown can
        // never be overwritten with `Connecting`.
        if cancel.is_cancelled() {
            shared.set_state(ChannelState::Disconnected);
            return;
        }
        shared.set_state(ChannelState::Connecting);
        let connected = tokio::select! {
            _ = cancel.cancelled() => {
                shared.set_state(ChannelState::Disconnected);
                return;
            }
            result = connect_async(url.as_str()) => result,
        };

        match connected {
            Ok((ws, _)) => {
                attempts = 0;
                shared.set_state(ChannelState::Connected);
                tracing::info!(channel = %name, "Event channel connected");

                let (mut sink, mut stream) = ws.split();
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            let _ = sink.close().await;
                            shared.set_state(ChannelState::Disconnected);
                            return;
                        }
                        outbound = outbound_rx.recv() => match outbound {
                            Some(text) => {
                                if let Err(e) = sink.send(WsMessage::Text(text)).await {
                                    tracing::warn!(channel = %name, error = %e, "Outbound send failed");
                                }
                            }
                            // Handle dropped: the channel is going away.
                            None => {
                                let _ = sink.close().await;
                                shared.set_state(ChannelState::Disconnected);
                                return;
                            }
                        },
                        frame = stream.next() => match frame {
                            Some(Ok(WsMessage::Text(text))) => shared.deliver(&text),
                            Some(Ok(WsMessage::Close(_))) | None => break,
                            // Binary and control frames are not protocol messages.
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                tracing::warn!(channel = %name, error = %e, "Event channel transport error");
                                break;
                            }
                        }
                    }
                }
                shared.set_state(ChannelState::Disconnected);
                tracing::info!(channel = %name, "Event channel disconnected");
            }
            Err(e) => {
                tracing::warn!(channel = %name, error = %e, "Event channel connect failed");
                shared.set_state(ChannelState::Disconnected);
            }
        }

        match next_reconnect(attempts) {
            Some((attempt, delay)) => {
                attempts = attempt;
                tracing::info!(
                    channel = %name,
                    attempt = attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Scheduling reconnect"
                );
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            None => {
                tracing::warn!(channel = %name, "Reconnect attempts exhausted, channel failed");
                shared.set_state(ChannelState::Failed);
                return;
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_reconnect_delay_sequence() {
        let mut attempts = 0;
        let mut delays = Vec::new();
        while let Some((attempt, delay)) = next_reconnect(attempts) {
            attempts = attempt;
            delays.push(delay.as_millis() as u64);
        }
        assert_eq!(delays, vec![2000, 4000, 8000]);
        // No fourth automatic attempt.
        assert_eq!(attempts, MAX_RECONNECT_ATTEMPTS);
        assert!(next_reconnect(attempts).is_none());
    }

    #[test]
    fn test_reconnect_delay_is_capped() {
        assert_eq!(reconnect_delay(4), Duration::from_millis(10_000));
        assert_eq!(reconnect_delay(10), Duration::from_millis(10_000));
    }

    #[test]
    fn test_successful_open_resets_attempts() {
        // A reset counter starts the sequence over at 2000ms.
        let (attempt, delay) = next_reconnect(0).unwrap();
        assert_eq!(attempt, 1);
        assert_eq!(delay, Duration::from_millis(2000));
    }

    async fn serve_frames(listener: TcpListener, frames: Vec<String>) {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        for frame in frames {
            ws.send(WsMessage::Text(frame)).await.unwrap();
        }
        let _ = ws.close(None).await;
    }

    #[tokio::test]
    async fn test_delivers_messages_in_arrival_order() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let frames = (0..3)
            .map(|i| {
                format!(
                    r#"{{"type":"generation_update","data":{{"progress":{}}},"timestamp":"x"}}"#,
                    i
                )
            })
            .collect();
        let server = tokio::spawn(serve_frames(listener, frames));

        let channel = EventChannel::connect_url("job-1".into(), format!("ws://{}/ws/job-1", addr));
        let mut rx = channel.subscribe();
        for i in 0..3 {
            let msg = rx.recv().await.unwrap();
            assert_eq!(msg.kind, "generation_update");
            assert_eq!(msg.payload["progress"], serde_json::json!(i));
        }

        server.await.unwrap();
        channel.disconnect();
    }

    #[tokio::test]
    async fn test_malformed_frame_does_not_break_the_stream() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let frames = vec![
            "{broken".to_string(),
            r#"{"type":"agent_update","data":{"step":"privacy"},"timestamp":"x"}"#.to_string(),
        ];
        let server = tokio::spawn(serve_frames(listener, frames));

        let channel = EventChannel::connect_url("job-2".into(), format!("ws://{}/ws/job-2", addr));
        let mut rx = channel.subscribe();
        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.kind, "agent_update");

        server.await.unwrap();
        channel.disconnect();
    }

    #[tokio::test]
    async fn test_last_message_observer_sees_newest() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let frames = vec![
            r#"{"type":"generation_update","data":{"progress":10}}"#.to_string(),
            r#"{"type":"generation_update","data":{"progress":20}}"#.to_string(),
        ];
        let server = tokio::spawn(serve_frames(listener, frames));

        let channel = EventChannel::connect_url("job-3".into(), format!("ws://{}/ws/job-3", addr));
        let mut rx = channel.subscribe();
        // Drain both through the active subscriber first.
        rx.recv().await.unwrap();
        rx.recv().await.unwrap();

        let last = channel.watch_last_message().borrow().clone().unwrap();
        assert_eq!(last.payload["progress"], serde_json::json!(20));

        server.await.unwrap();
        channel.disconnect();
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_exhaustion_goes_terminal() {
        // Bind then drop to obtain a port that refuses connections.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let channel = EventChannel::connect_url("job-4".into(), format!("ws://{}/ws/job-4", addr));
        let mut state_rx = channel.watch_state();
        state_rx
            .wait_for(|s| *s == ChannelState::Failed)
            .await
            .unwrap();
        assert_eq!(channel.state(), ChannelState::Failed);

        // Sending into a failed channel is a warned no-op.
        channel.ping();
    }

    #[tokio::test]
    async fn test_disconnect_cancels_pending_reconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let channel = EventChannel::connect_url("job-5".into(), format!("ws://{}/ws/job-5", addr));
        let mut state_rx = channel.watch_state();
        // Wait for the first failed connect, then tear down while the
        // reconnect timer is pending.
        state_rx
            .wait_for(|s| *s == ChannelState::Disconnected)
            .await
            .unwrap();
        channel.disconnect();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(channel.state(), ChannelState::Disconnected);
    }

    #[tokio::test]
    async fn test_send_before_connect_is_noop() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let channel = EventChannel::connect_url("job-6".into(), format!("ws://{}/ws/job-6", addr));
        assert_ne!(channel.state(), ChannelState::Connected);
        // Must not panic or queue.
        channel.ping();
        channel.disconnect();
    }
}
