//! Streaming: SSE transport workers and the stream supervisor.
//!
//! One worker task per active stream drives a single SSE connection; the
//! supervisor owns the registry of all streams and fans parsed events out to
//! subscribers. Subscribers are plain unbounded channels: there is no
//! back-pressure between a worker and its subscribers, and a subscriber that
//! falls behind accumulates messages in its inbox.

mod supervisor;
pub(crate) mod transport;

pub use supervisor::StreamSupervisor;
pub(crate) use supervisor::{StartStreamRequest, SupervisorConfig};

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::AuthKind;
use crate::error::GeminiError;

pub type StreamId = String;

/// Allocate a 16-character lowercase-hex stream id.
pub(crate) fn new_stream_id() -> StreamId {
    let full = Uuid::new_v4().simple().to_string();
    full[..16].to_string()
}

/// Lifecycle of one stream record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamStatus {
    /// Registered; the worker has not yet received a 2xx response.
    Starting,
    /// Data is flowing.
    Active,
    Completed,
    Errored,
    Stopped,
}

impl std::fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Starting => "starting",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Errored => "errored",
            Self::Stopped => "stopped",
        };
        write!(f, "{name}")
    }
}

/// What a subscriber receives. Per stream, every `Event` precedes the single
/// terminal `Complete` / `Error` / `Stopped`.
#[derive(Debug, Clone)]
pub enum StreamMessage {
    Event { stream_id: StreamId, data: Value },
    Complete { stream_id: StreamId },
    Error { stream_id: StreamId, error: GeminiError },
    Stopped { stream_id: StreamId },
}

impl StreamMessage {
    pub fn stream_id(&self) -> &str {
        match self {
            Self::Event { stream_id, .. }
            | Self::Complete { stream_id }
            | Self::Error { stream_id, .. }
            | Self::Stopped { stream_id } => stream_id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Event { .. })
    }
}

/// A registered consumer: an id plus a channel the supervisor can send to
/// and whose closure it can observe (the lifecycle watch).
#[derive(Debug, Clone)]
pub struct SubscriberHandle {
    id: Uuid,
    tx: mpsc::UnboundedSender<StreamMessage>,
}

impl SubscriberHandle {
    /// Create a subscriber and the receiving half of its inbox. Dropping the
    /// receiver counts as subscriber termination.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<StreamMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { id: Uuid::new_v4(), tx }, rx)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) fn send(&self, message: StreamMessage) {
        // Fire-and-forget: a dead subscriber is removed by its watch.
        let _ = self.tx.send(message);
    }

    pub(crate) async fn closed(&self) {
        self.tx.closed().await
    }
}

/// Snapshot of one stream record.
#[derive(Debug, Clone)]
pub struct StreamInfo {
    pub id: StreamId,
    pub status: StreamStatus,
    pub model: String,
    pub subscriber_count: usize,
    pub auth_kind: AuthKind,
    /// Time since the stream was registered.
    pub elapsed: Duration,
}

/// Registry-wide counters.
#[derive(Debug, Clone, Default)]
pub struct SupervisorStats {
    /// Live streams currently registered.
    pub total: usize,
    /// Configured capacity; `None` means unbounded.
    pub max_streams: Option<usize>,
    pub by_status: HashMap<StreamStatus, usize>,
    pub total_subscribers: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_ids_are_16_lowercase_hex_chars() {
        for _ in 0..16 {
            let id = new_stream_id();
            assert_eq!(id.len(), 16);
            assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        }
    }

    #[test]
    fn terminal_classification() {
        let id = new_stream_id();
        assert!(!StreamMessage::Event { stream_id: id.clone(), data: Value::Null }.is_terminal());
        assert!(StreamMessage::Complete { stream_id: id.clone() }.is_terminal());
        assert!(StreamMessage::Stopped { stream_id: id }.is_terminal());
    }
}
