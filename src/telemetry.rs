//! Structured telemetry emission.
//!
//! Every request and stream emits start/stop/exception events on named
//! channels. Emission is fire-and-forget: each event becomes a `tracing`
//! event, and optionally lands on a subscriber channel (multi-producer,
//! single-subscriber by convention) for programmatic observation. When
//! telemetry is disabled by config, the emitter is a no-op.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::types::{Content, Part};

/// Coarse classification of request contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentsKind {
    Text,
    Multimodal,
    Unknown,
}

impl ContentsKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Multimodal => "multimodal",
            Self::Unknown => "unknown",
        }
    }
}

/// `multimodal` when any part is non-text, otherwise `text`.
pub fn classify_contents(contents: &[Content]) -> ContentsKind {
    let has_non_text = contents
        .iter()
        .flat_map(|c| c.parts.iter())
        .any(|p| !matches!(p, Part::Text { .. }));
    if has_non_text {
        ContentsKind::Multimodal
    } else {
        ContentsKind::Text
    }
}

/// Metadata shared by every event of one request or stream.
#[derive(Debug, Clone)]
pub struct RequestMeta {
    pub url: String,
    pub method: &'static str,
    pub model: String,
    /// Facade operation, e.g. `generate_content`.
    pub function: &'static str,
    pub contents_type: ContentsKind,
}

/// One telemetry event; the variant is the channel.
#[derive(Debug, Clone)]
pub enum TelemetryEvent {
    RequestStart {
        meta: RequestMeta,
        system_time: DateTime<Utc>,
    },
    RequestStop {
        meta: RequestMeta,
        status: u16,
        duration_ms: u64,
    },
    RequestException {
        meta: RequestMeta,
        reason: String,
        system_time: DateTime<Utc>,
    },
    StreamStart {
        meta: RequestMeta,
        stream_id: String,
        system_time: DateTime<Utc>,
    },
    StreamChunk {
        meta: RequestMeta,
        stream_id: String,
        chunk_size: usize,
        system_time: DateTime<Utc>,
    },
    StreamStop {
        meta: RequestMeta,
        stream_id: String,
        total_duration_ms: u64,
        total_chunks: u64,
    },
    StreamException {
        meta: RequestMeta,
        stream_id: String,
        reason: String,
        system_time: DateTime<Utc>,
    },
}

impl TelemetryEvent {
    /// Channel name, e.g. `request.start`.
    pub fn channel(&self) -> &'static str {
        match self {
            Self::RequestStart { .. } => "request.start",
            Self::RequestStop { .. } => "request.stop",
            Self::RequestException { .. } => "request.exception",
            Self::StreamStart { .. } => "stream.start",
            Self::StreamChunk { .. } => "stream.chunk",
            Self::StreamStop { .. } => "stream.stop",
            Self::StreamException { .. } => "stream.exception",
        }
    }

    fn meta(&self) -> &RequestMeta {
        match self {
            Self::RequestStart { meta, .. }
            | Self::RequestStop { meta, .. }
            | Self::RequestException { meta, .. }
            | Self::StreamStart { meta, .. }
            | Self::StreamChunk { meta, .. }
            | Self::StreamStop { meta, .. }
            | Self::StreamException { meta, .. } => meta,
        }
    }
}

/// The emitter handed to transports and workers.
#[derive(Debug, Clone)]
pub struct Telemetry {
    enabled: bool,
    sink: Option<mpsc::UnboundedSender<TelemetryEvent>>,
}

impl Telemetry {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            sink: None,
        }
    }

    pub fn disabled() -> Self {
        Self::new(false)
    }

    /// Attach a channel that receives every emitted event.
    pub fn with_sink(mut self, sink: mpsc::UnboundedSender<TelemetryEvent>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Fire-and-forget: a closed sink is ignored.
    pub fn emit(&self, event: TelemetryEvent) {
        if !self.enabled {
            return;
        }
        let meta = event.meta();
        tracing::debug!(
            target: "geminix::telemetry",
            channel = event.channel(),
            url = %meta.url,
            method = meta.method,
            model = %meta.model,
            function = meta.function,
            contents_type = meta.contents_type.as_str(),
        );
        if let Some(sink) = &self.sink {
            let _ = sink.send(event);
        }
    }
}
