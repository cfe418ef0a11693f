//! SSE connection worker.
//!
//! Each streaming request runs as one isolated task driving a single
//! connection: open the POST with `alt=sse`, pump byte chunks through the
//! incremental parser, and hand every event to the caller-supplied callback.
//! Connection attempts retry on the exponential schedule; once a 2xx
//! response has started delivering data, failures are terminal. The callback
//! observes every data event followed by exactly one `Complete` or `Error`;
//! cooperative cancellation produces no terminal (the supervisor reports the
//! stop itself).

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL, HeaderValue};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::auth::{AuthStrategy, request_url};
use crate::error::GeminiError;
use crate::retry::RetryPolicy;
use crate::sse::{SseEvent, SseParser};
use crate::telemetry::{ContentsKind, RequestMeta, Telemetry, TelemetryEvent};

/// What the per-event callback receives.
#[derive(Debug)]
pub(crate) enum TransportEvent {
    /// The connection handshake succeeded (2xx received).
    Open,
    Data(SseEvent),
    Complete,
    Error(GeminiError),
}

/// Callback verdict after a data event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disposition {
    Continue,
    Stop,
}

#[derive(Clone)]
pub(crate) struct StreamConnection {
    pub http: reqwest::Client,
    pub strategy: Arc<dyn AuthStrategy>,
    pub telemetry: Telemetry,
    pub retry: RetryPolicy,
    /// Handshake deadline and inter-chunk timeout.
    pub chunk_timeout: Duration,
}

pub(crate) struct StreamRequest {
    pub stream_id: String,
    pub path: String,
    pub body: Value,
    pub model: String,
    pub contents_type: ContentsKind,
}

impl StreamConnection {
    /// Drive one stream to completion. `on_event` is invoked for every
    /// emitted event and exactly one terminal, unless `cancel` fires first.
    pub async fn run<F>(&self, request: StreamRequest, cancel: CancellationToken, mut on_event: F)
    where
        F: FnMut(TransportEvent) -> Disposition + Send,
    {
        let url = sse_url(request_url(self.strategy.as_ref(), &request.path));
        let meta = RequestMeta {
            url: url.clone(),
            method: "POST",
            model: request.model.clone(),
            function: "stream_generate_content",
            contents_type: request.contents_type,
        };

        let headers = match self.build_headers() {
            Ok(headers) => headers,
            Err(err) => {
                self.emit_exception(&meta, &request.stream_id, &err);
                on_event(TransportEvent::Error(err));
                return;
            }
        };

        let response = match self
            .connect(&url, &headers, &request.body, &request.stream_id, &cancel)
            .await
        {
            Ok(Some(response)) => response,
            Ok(None) => return, // cancelled mid-handshake
            Err(err) => {
                self.emit_exception(&meta, &request.stream_id, &err);
                on_event(TransportEvent::Error(err));
                return;
            }
        };

        on_event(TransportEvent::Open);
        self.telemetry.emit(TelemetryEvent::StreamStart {
            meta: meta.clone(),
            stream_id: request.stream_id.clone(),
            system_time: chrono::Utc::now(),
        });

        self.pump(response, &meta, &request.stream_id, &cancel, &mut on_event)
            .await;
    }

    fn build_headers(&self) -> Result<reqwest::header::HeaderMap, GeminiError> {
        let mut headers = self.strategy.headers()?;
        if !headers.contains_key(ACCEPT) {
            headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        }
        if !headers.contains_key(CACHE_CONTROL) {
            headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        }
        Ok(headers)
    }

    /// Connection attempt loop. `Ok(None)` means cancellation won the race.
    /// Retries connect failures and 5xx responses, never 4xx, and never
    /// anything after a 2xx has been returned.
    async fn connect(
        &self,
        url: &str,
        headers: &reqwest::header::HeaderMap,
        body: &Value,
        stream_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<reqwest::Response>, GeminiError> {
        let mut attempt: u32 = 0;
        loop {
            let send = self.http.post(url).headers(headers.clone()).json(body).send();
            let outcome = tokio::select! {
                _ = cancel.cancelled() => return Ok(None),
                result = tokio::time::timeout(self.chunk_timeout, send) => result,
            };

            let error = match outcome {
                Err(_elapsed) => GeminiError::Network("timeout".to_string()),
                Ok(Err(err)) => GeminiError::from(err),
                Ok(Ok(response)) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(Some(response));
                    }
                    let body = response.text().await.ok();
                    let parsed = body.as_deref().and_then(|t| serde_json::from_str(t).ok());
                    GeminiError::api(status.as_u16(), parsed)
                }
            };

            if !error.is_retryable() || attempt >= self.retry.max_retries {
                return Err(error);
            }
            tracing::warn!(
                target: "geminix::streaming",
                stream_id,
                attempt,
                error = %error,
                "stream connect failed, retrying"
            );
            tokio::select! {
                _ = cancel.cancelled() => return Ok(None),
                _ = self.retry.wait(attempt) => {}
            }
            attempt += 1;
        }
    }

    /// Read chunks until completion, error, timeout, or cancellation.
    async fn pump<F>(
        &self,
        response: reqwest::Response,
        meta: &RequestMeta,
        stream_id: &str,
        cancel: &CancellationToken,
        on_event: &mut F,
    ) where
        F: FnMut(TransportEvent) -> Disposition + Send,
    {
        let started = Instant::now();
        let mut parser = SseParser::new();
        let mut byte_stream = response.bytes_stream();
        let mut total_chunks: u64 = 0;

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!(target: "geminix::streaming", stream_id, "stream cancelled");
                    return;
                }
                next = tokio::time::timeout(self.chunk_timeout, byte_stream.next()) => next,
            };

            match next {
                Err(_elapsed) => {
                    let err = GeminiError::Network("stream_timeout".to_string());
                    self.emit_exception(meta, stream_id, &err);
                    on_event(TransportEvent::Error(err));
                    return;
                }
                Ok(Some(Err(err))) => {
                    let err = GeminiError::from(err);
                    self.emit_exception(meta, stream_id, &err);
                    on_event(TransportEvent::Error(err));
                    return;
                }
                Ok(Some(Ok(bytes))) => {
                    for event in parser.parse_chunk(&bytes) {
                        total_chunks += 1;
                        if self.deliver(event, meta, stream_id, on_event) == Disposition::Stop {
                            self.emit_stop(meta, stream_id, started, total_chunks);
                            on_event(TransportEvent::Complete);
                            return;
                        }
                    }
                }
                Ok(None) => {
                    // Clean close: flush whatever the buffer still holds.
                    for event in parser.finalize() {
                        total_chunks += 1;
                        if self.deliver(event, meta, stream_id, on_event) == Disposition::Stop {
                            break;
                        }
                    }
                    self.emit_stop(meta, stream_id, started, total_chunks);
                    on_event(TransportEvent::Complete);
                    return;
                }
            }
        }
    }

    /// Deliver one parsed event; `Stop` when the callback asks to stop or
    /// the event is the end-of-stream marker.
    fn deliver<F>(
        &self,
        event: SseEvent,
        meta: &RequestMeta,
        stream_id: &str,
        on_event: &mut F,
    ) -> Disposition
    where
        F: FnMut(TransportEvent) -> Disposition + Send,
    {
        self.telemetry.emit(TelemetryEvent::StreamChunk {
            meta: meta.clone(),
            stream_id: stream_id.to_string(),
            chunk_size: event.data.to_string().len(),
            system_time: chrono::Utc::now(),
        });
        let done = event.is_done();
        let disposition = on_event(TransportEvent::Data(event));
        if done { Disposition::Stop } else { disposition }
    }

    fn emit_stop(&self, meta: &RequestMeta, stream_id: &str, started: Instant, chunks: u64) {
        self.telemetry.emit(TelemetryEvent::StreamStop {
            meta: meta.clone(),
            stream_id: stream_id.to_string(),
            total_duration_ms: started.elapsed().as_millis() as u64,
            total_chunks: chunks,
        });
    }

    fn emit_exception(&self, meta: &RequestMeta, stream_id: &str, err: &GeminiError) {
        self.telemetry.emit(TelemetryEvent::StreamException {
            meta: meta.clone(),
            stream_id: stream_id.to_string(),
            reason: err.to_string(),
            system_time: chrono::Utc::now(),
        });
    }
}

/// Append `alt=sse`, respecting an existing query string.
fn sse_url(url: String) -> String {
    if url.contains('?') {
        format!("{url}&alt=sse")
    } else {
        format!("{url}?alt=sse")
    }
}
