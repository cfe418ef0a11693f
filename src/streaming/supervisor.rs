//! Process-wide stream registry.
//!
//! A single long-lived actor task owns every `StreamRecord`; workers and
//! callers interact with it only through its command mailbox, so registry
//! reads and writes are serialized with no shared mutable state. Because
//! worker events and terminal transitions flow through the same mailbox,
//! each subscriber observes data events in parse order with the terminal
//! message last.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::auth::AuthStrategy;
use crate::config::AuthKind;
use crate::error::GeminiError;
use crate::normalize::normalize_keys;
use crate::retry::RetryPolicy;
use crate::telemetry::{ContentsKind, Telemetry};

use super::transport::{Disposition, StreamConnection, StreamRequest, TransportEvent};
use super::{
    StreamId, StreamInfo, StreamMessage, StreamStatus, SubscriberHandle, SupervisorStats,
    new_stream_id,
};

/// Everything a worker needs to open connections.
pub(crate) struct SupervisorConfig {
    pub http: reqwest::Client,
    pub strategy: Arc<dyn AuthStrategy>,
    pub telemetry: Telemetry,
    pub retry: RetryPolicy,
    pub chunk_timeout: Duration,
    pub max_streams: Option<usize>,
}

/// A fully-constructed streaming request, ready to spawn.
pub(crate) struct StartStreamRequest {
    pub path: String,
    pub body: Value,
    pub model: String,
    pub contents_type: ContentsKind,
}

enum Command {
    Start {
        request: StartStreamRequest,
        subscriber: SubscriberHandle,
        reply: oneshot::Sender<Result<StreamId, GeminiError>>,
    },
    Subscribe {
        id: StreamId,
        subscriber: SubscriberHandle,
        reply: oneshot::Sender<Result<(), GeminiError>>,
    },
    Unsubscribe {
        id: StreamId,
        subscriber: Uuid,
        reply: oneshot::Sender<()>,
    },
    Stop {
        id: StreamId,
        reply: oneshot::Sender<Result<(), GeminiError>>,
    },
    Info {
        id: StreamId,
        reply: oneshot::Sender<Result<StreamInfo, GeminiError>>,
    },
    List {
        reply: oneshot::Sender<Vec<StreamId>>,
    },
    Stats {
        reply: oneshot::Sender<SupervisorStats>,
    },
    Worker {
        id: StreamId,
        event: TransportEvent,
    },
    SubscriberGone {
        id: StreamId,
        subscriber: Uuid,
    },
}

struct StreamRecord {
    status: StreamStatus,
    model: String,
    auth_kind: AuthKind,
    started_at: Instant,
    subscribers: HashMap<Uuid, SubscriberHandle>,
    /// Cancels the worker and every subscriber watch for this record.
    cancel: CancellationToken,
}

/// Cloneable handle to the supervisor actor.
#[derive(Clone)]
pub struct StreamSupervisor {
    tx: mpsc::UnboundedSender<Command>,
}

fn supervisor_gone() -> GeminiError {
    GeminiError::Config("stream supervisor is not running".to_string())
}

impl StreamSupervisor {
    pub(crate) fn spawn(config: SupervisorConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let actor = Supervisor {
            config,
            streams: HashMap::new(),
            tx: tx.clone(),
        };
        tokio::spawn(actor.run(rx));
        Self { tx }
    }

    pub(crate) async fn start_stream(
        &self,
        request: StartStreamRequest,
        subscriber: SubscriberHandle,
    ) -> Result<StreamId, GeminiError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Start {
                request,
                subscriber,
                reply,
            })
            .map_err(|_| supervisor_gone())?;
        rx.await.map_err(|_| supervisor_gone())?
    }

    /// Register an additional subscriber on a running stream. Idempotent per
    /// subscriber id.
    pub async fn subscribe(
        &self,
        stream_id: &str,
        subscriber: SubscriberHandle,
    ) -> Result<(), GeminiError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Subscribe {
                id: stream_id.to_string(),
                subscriber,
                reply,
            })
            .map_err(|_| supervisor_gone())?;
        rx.await.map_err(|_| supervisor_gone())?
    }

    /// Remove a subscriber. When the last one leaves, the stream is torn
    /// down. Unknown stream or subscriber ids are not an error.
    pub async fn unsubscribe(&self, stream_id: &str, subscriber: Uuid) -> Result<(), GeminiError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Unsubscribe {
                id: stream_id.to_string(),
                subscriber,
                reply,
            })
            .map_err(|_| supervisor_gone())?;
        rx.await.map_err(|_| supervisor_gone())
    }

    /// Terminate a stream, notifying remaining subscribers with `Stopped`.
    pub async fn stop_stream(&self, stream_id: &str) -> Result<(), GeminiError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Stop {
                id: stream_id.to_string(),
                reply,
            })
            .map_err(|_| supervisor_gone())?;
        rx.await.map_err(|_| supervisor_gone())?
    }

    pub async fn stream_info(&self, stream_id: &str) -> Result<StreamInfo, GeminiError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Info {
                id: stream_id.to_string(),
                reply,
            })
            .map_err(|_| supervisor_gone())?;
        rx.await.map_err(|_| supervisor_gone())?
    }

    pub async fn list_streams(&self) -> Result<Vec<StreamId>, GeminiError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::List { reply })
            .map_err(|_| supervisor_gone())?;
        rx.await.map_err(|_| supervisor_gone())
    }

    pub async fn stats(&self) -> Result<SupervisorStats, GeminiError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Stats { reply })
            .map_err(|_| supervisor_gone())?;
        rx.await.map_err(|_| supervisor_gone())
    }
}

/// The actor state: single writer of the registry.
struct Supervisor {
    config: SupervisorConfig,
    streams: HashMap<StreamId, StreamRecord>,
    tx: mpsc::UnboundedSender<Command>,
}

impl Supervisor {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = rx.recv().await {
            match command {
                Command::Start {
                    request,
                    subscriber,
                    reply,
                } => {
                    let _ = reply.send(self.handle_start(request, subscriber));
                }
                Command::Subscribe {
                    id,
                    subscriber,
                    reply,
                } => {
                    let _ = reply.send(self.handle_subscribe(&id, subscriber));
                }
                Command::Unsubscribe {
                    id,
                    subscriber,
                    reply,
                } => {
                    self.remove_subscriber(&id, subscriber);
                    let _ = reply.send(());
                }
                Command::Stop { id, reply } => {
                    let _ = reply.send(self.handle_stop(&id));
                }
                Command::Info { id, reply } => {
                    let _ = reply.send(self.handle_info(&id));
                }
                Command::List { reply } => {
                    let _ = reply.send(self.streams.keys().cloned().collect());
                }
                Command::Stats { reply } => {
                    let _ = reply.send(self.handle_stats());
                }
                Command::Worker { id, event } => {
                    self.handle_worker_event(&id, event);
                }
                Command::SubscriberGone { id, subscriber } => {
                    tracing::debug!(
                        target: "geminix::streaming",
                        stream_id = %id,
                        subscriber = %subscriber,
                        "subscriber terminated"
                    );
                    self.remove_subscriber(&id, subscriber);
                }
            }
        }
    }

    fn handle_start(
        &mut self,
        request: StartStreamRequest,
        subscriber: SubscriberHandle,
    ) -> Result<StreamId, GeminiError> {
        if let Some(limit) = self.config.max_streams
            && self.streams.len() >= limit
        {
            return Err(GeminiError::CapacityExceeded { limit });
        }

        let id = new_stream_id();
        let cancel = CancellationToken::new();
        let mut subscribers = HashMap::new();
        Self::spawn_watch(&self.tx, &id, &subscriber, &cancel);
        subscribers.insert(subscriber.id(), subscriber);

        let record = StreamRecord {
            status: StreamStatus::Starting,
            model: request.model.clone(),
            auth_kind: self.config.strategy.kind(),
            started_at: Instant::now(),
            subscribers,
            cancel: cancel.clone(),
        };
        self.streams.insert(id.clone(), record);
        self.spawn_worker(&id, request, cancel);

        tracing::debug!(target: "geminix::streaming", stream_id = %id, "stream registered");
        Ok(id)
    }

    fn spawn_worker(&self, id: &StreamId, request: StartStreamRequest, cancel: CancellationToken) {
        let connection = StreamConnection {
            http: self.config.http.clone(),
            strategy: self.config.strategy.clone(),
            telemetry: self.config.telemetry.clone(),
            retry: self.config.retry.clone(),
            chunk_timeout: self.config.chunk_timeout,
        };
        let stream_request = StreamRequest {
            stream_id: id.clone(),
            path: request.path,
            body: request.body,
            model: request.model,
            contents_type: request.contents_type,
        };
        let command_tx = self.tx.clone();
        let worker_id = id.clone();
        tokio::spawn(async move {
            let callback_id = worker_id.clone();
            connection
                .run(stream_request, cancel, move |event| {
                    let _ = command_tx.send(Command::Worker {
                        id: callback_id.clone(),
                        event,
                    });
                    Disposition::Continue
                })
                .await;
        });
    }

    /// Watch the subscriber's channel; its closure is the death notification.
    fn spawn_watch(
        tx: &mpsc::UnboundedSender<Command>,
        id: &StreamId,
        subscriber: &SubscriberHandle,
        cancel: &CancellationToken,
    ) {
        let command_tx = tx.clone();
        let stream_id = id.clone();
        let subscriber = subscriber.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = subscriber.closed() => {
                    let _ = command_tx.send(Command::SubscriberGone {
                        id: stream_id,
                        subscriber: subscriber.id(),
                    });
                }
            }
        });
    }

    fn handle_subscribe(
        &mut self,
        id: &StreamId,
        subscriber: SubscriberHandle,
    ) -> Result<(), GeminiError> {
        let tx = self.tx.clone();
        let Some(record) = self.streams.get_mut(id) else {
            return Err(GeminiError::StreamNotFound(id.clone()));
        };
        if !record.subscribers.contains_key(&subscriber.id()) {
            Self::spawn_watch(&tx, id, &subscriber, &record.cancel);
            record.subscribers.insert(subscriber.id(), subscriber);
        }
        Ok(())
    }

    fn remove_subscriber(&mut self, id: &StreamId, subscriber: Uuid) {
        let Some(record) = self.streams.get_mut(id) else {
            return;
        };
        record.subscribers.remove(&subscriber);
        if record.subscribers.is_empty() {
            tracing::debug!(
                target: "geminix::streaming",
                stream_id = %id,
                "last subscriber left, tearing stream down"
            );
            self.teardown(id);
        }
    }

    fn handle_stop(&mut self, id: &StreamId) -> Result<(), GeminiError> {
        let Some(record) = self.streams.get_mut(id) else {
            return Err(GeminiError::StreamNotFound(id.clone()));
        };
        record.status = StreamStatus::Stopped;
        Self::broadcast(record, StreamMessage::Stopped { stream_id: id.clone() });
        self.teardown(id);
        Ok(())
    }

    fn handle_info(&self, id: &StreamId) -> Result<StreamInfo, GeminiError> {
        let record = self
            .streams
            .get(id)
            .ok_or_else(|| GeminiError::StreamNotFound(id.clone()))?;
        Ok(StreamInfo {
            id: id.clone(),
            status: record.status,
            model: record.model.clone(),
            subscriber_count: record.subscribers.len(),
            auth_kind: record.auth_kind,
            elapsed: record.started_at.elapsed(),
        })
    }

    fn handle_stats(&self) -> SupervisorStats {
        let mut by_status: HashMap<StreamStatus, usize> = HashMap::new();
        let mut total_subscribers = 0;
        for record in self.streams.values() {
            *by_status.entry(record.status).or_default() += 1;
            total_subscribers += record.subscribers.len();
        }
        SupervisorStats {
            total: self.streams.len(),
            max_streams: self.config.max_streams,
            by_status,
            total_subscribers,
        }
    }

    fn handle_worker_event(&mut self, id: &StreamId, event: TransportEvent) {
        let Some(record) = self.streams.get_mut(id) else {
            // The stream was stopped or torn down while the event was in
            // flight; late worker messages are dropped.
            return;
        };
        match event {
            TransportEvent::Open => {
                record.status = StreamStatus::Active;
            }
            TransportEvent::Data(event) => {
                // Same canonical form as unary responses.
                Self::broadcast(
                    record,
                    StreamMessage::Event {
                        stream_id: id.clone(),
                        data: normalize_keys(event.data),
                    },
                );
            }
            TransportEvent::Complete => {
                record.status = StreamStatus::Completed;
                Self::broadcast(record, StreamMessage::Complete { stream_id: id.clone() });
                self.teardown(id);
            }
            TransportEvent::Error(error) => {
                record.status = StreamStatus::Errored;
                Self::broadcast(
                    record,
                    StreamMessage::Error {
                        stream_id: id.clone(),
                        error,
                    },
                );
                self.teardown(id);
            }
        }
    }

    fn broadcast(record: &StreamRecord, message: StreamMessage) {
        for subscriber in record.subscribers.values() {
            subscriber.send(message.clone());
        }
    }

    /// Remove the record and cancel its worker and watches.
    fn teardown(&mut self, id: &StreamId) {
        if let Some(record) = self.streams.remove(id) {
            record.cancel.cancel();
        }
    }
}
