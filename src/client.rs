//! The client facade.
//!
//! `GeminiClient` routes every operation through the auth strategy, the
//! unary HTTP transport, and the stream supervisor. Construction resolves
//! and validates credentials once; after that, each call picks its model
//! and builds a request body in the wire shape.

use serde_json::{Value, json};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::auth::strategy_for;
use crate::config::{Config, ConfigBuilder};
use crate::error::GeminiError;
use crate::http::{HttpTransport, RequestContext};
use crate::normalize::normalize_model_name;
use crate::retry::RetryPolicy;
use crate::streaming::{
    StartStreamRequest, StreamId, StreamInfo, StreamSupervisor, SubscriberHandle, SupervisorConfig,
    SupervisorStats,
};
use crate::telemetry::{ContentsKind, Telemetry, TelemetryEvent, classify_contents};
use crate::types::{
    Content, Contents, EmbedContentRequest, EmbedContentResponse, EmbedOptions,
    GenerateContentRequest, GenerateContentResponse, GenerateOptions, ListModelsOptions,
    ListModelsResponse, Model, TokenCount,
};

const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";

/// Client for the Gemini API and Vertex AI.
#[derive(Clone)]
pub struct GeminiClient {
    config: Config,
    transport: HttpTransport,
    supervisor: StreamSupervisor,
}

impl GeminiClient {
    pub fn builder() -> GeminiClientBuilder {
        GeminiClientBuilder::new()
    }

    /// Build a client from the process environment.
    pub fn from_env() -> Result<Self, GeminiError> {
        Self::new(Config::from_env()?)
    }

    /// Build a client from a resolved configuration.
    pub fn new(config: Config) -> Result<Self, GeminiError> {
        Self::with_telemetry_sink(config, None)
    }

    fn with_telemetry_sink(
        config: Config,
        sink: Option<mpsc::UnboundedSender<TelemetryEvent>>,
    ) -> Result<Self, GeminiError> {
        config.validate()?;
        let auth = config
            .auth
            .as_ref()
            .ok_or_else(|| GeminiError::Config("no auth configuration".to_string()))?;
        let strategy = strategy_for(auth, config.base_url.as_deref())?;

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| GeminiError::Config(format!("failed to build HTTP client: {e}")))?;

        let mut telemetry = Telemetry::new(config.telemetry_enabled);
        if let Some(sink) = sink {
            telemetry = telemetry.with_sink(sink);
        }

        let transport = HttpTransport::new(
            http.clone(),
            strategy.clone(),
            telemetry.clone(),
            config.timeout,
        );
        let supervisor = StreamSupervisor::spawn(SupervisorConfig {
            http,
            strategy,
            telemetry,
            retry: RetryPolicy::default().with_max_retries(config.max_retries),
            chunk_timeout: config.timeout,
            max_streams: config.max_streams,
        });

        Ok(Self {
            config,
            transport,
            supervisor,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The supervisor handle, for callers that manage streams directly.
    pub fn supervisor(&self) -> &StreamSupervisor {
        &self.supervisor
    }

    /// Pick the model for a call and reduce it to its bare id (action paths
    /// add the `models/` segment themselves).
    fn model_for(&self, requested: Option<&str>) -> String {
        let model = requested.unwrap_or(&self.config.default_model);
        model.strip_prefix("models/").unwrap_or(model).to_string()
    }

    fn generate_body(
        contents: Contents,
        opts: &GenerateOptions,
    ) -> Result<(Value, ContentsKind), GeminiError> {
        let messages = contents.into_messages()?;
        let kind = classify_contents(&messages);
        let request = GenerateContentRequest::build(messages, opts);
        let body = serde_json::to_value(&request)
            .map_err(|e| GeminiError::InvalidInput(format!("unserializable request: {e}")))?;
        Ok((body, kind))
    }

    fn decode<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, GeminiError> {
        serde_json::from_value(value)
            .map_err(|e| GeminiError::InvalidResponse(format!("unexpected response shape: {e}")))
    }

    /// Unary content generation.
    pub async fn generate_content(
        &self,
        contents: impl Into<Contents>,
        opts: &GenerateOptions,
    ) -> Result<GenerateContentResponse, GeminiError> {
        let model = self.model_for(opts.model.as_deref());
        let (body, kind) = Self::generate_body(contents.into(), opts)?;
        let value = self
            .transport
            .post(
                &format!("models/{model}:generateContent"),
                &body,
                RequestContext {
                    model,
                    function: "generate_content",
                    contents_type: kind,
                },
            )
            .await?;
        Self::decode(value)
    }

    /// Streaming content generation. Parsed response chunks reach
    /// `subscriber` as `StreamMessage::Event`s, followed by exactly one
    /// terminal message.
    pub async fn stream_generate_content(
        &self,
        contents: impl Into<Contents>,
        opts: &GenerateOptions,
        subscriber: SubscriberHandle,
    ) -> Result<StreamId, GeminiError> {
        let model = self.model_for(opts.model.as_deref());
        let (body, kind) = Self::generate_body(contents.into(), opts)?;
        self.supervisor
            .start_stream(
                StartStreamRequest {
                    path: format!("models/{model}:streamGenerateContent"),
                    body,
                    model,
                    contents_type: kind,
                },
                subscriber,
            )
            .await
    }

    /// Count the tokens a request would consume.
    pub async fn count_tokens(
        &self,
        contents: impl Into<Contents>,
        opts: &GenerateOptions,
    ) -> Result<TokenCount, GeminiError> {
        let model = self.model_for(opts.model.as_deref());
        let messages = contents.into().into_messages()?;
        let kind = classify_contents(&messages);
        let body = json!({ "contents": messages });
        let value = self
            .transport
            .post(
                &format!("models/{model}:countTokens"),
                &body,
                RequestContext {
                    model,
                    function: "count_tokens",
                    contents_type: kind,
                },
            )
            .await?;
        Self::decode(value)
    }

    /// List available models, one page at a time.
    pub async fn list_models(
        &self,
        opts: &ListModelsOptions,
    ) -> Result<ListModelsResponse, GeminiError> {
        opts.validate()?;
        let path = format!("models{}", opts.to_query());
        let value = self
            .transport
            .get(
                &path,
                RequestContext {
                    model: String::new(),
                    function: "list_models",
                    contents_type: ContentsKind::Unknown,
                },
            )
            .await?;
        Self::decode(value)
    }

    /// Fetch one model. Bare names are normalized to `models/<name>`.
    pub async fn get_model(&self, name: &str) -> Result<Model, GeminiError> {
        let path = normalize_model_name(name);
        let value = self
            .transport
            .get(
                &path,
                RequestContext {
                    model: path.clone(),
                    function: "get_model",
                    contents_type: ContentsKind::Unknown,
                },
            )
            .await?;
        Self::decode(value)
    }

    /// Embed content with one of the embedding models.
    pub async fn embed_content(
        &self,
        contents: impl Into<Contents>,
        opts: &EmbedOptions,
    ) -> Result<EmbedContentResponse, GeminiError> {
        let model = {
            let requested = opts.model.as_deref().unwrap_or(DEFAULT_EMBEDDING_MODEL);
            requested.strip_prefix("models/").unwrap_or(requested).to_string()
        };
        let messages = contents.into().into_messages()?;
        let kind = classify_contents(&messages);
        // embedContent takes a single content; merge message parts in order.
        let content = Content {
            role: None,
            parts: messages.into_iter().flat_map(|m| m.parts).collect(),
        };
        let request = EmbedContentRequest {
            model: normalize_model_name(&model),
            content,
            task_type: opts.task_type.clone(),
            title: opts.title.clone(),
            output_dimensionality: opts.output_dimensionality,
        };
        let body = serde_json::to_value(&request)
            .map_err(|e| GeminiError::InvalidInput(format!("unserializable request: {e}")))?;
        let value = self
            .transport
            .post(
                &format!("models/{model}:embedContent"),
                &body,
                RequestContext {
                    model,
                    function: "embed_content",
                    contents_type: kind,
                },
            )
            .await?;
        Self::decode(value)
    }

    // Stream management passthroughs.

    pub async fn subscribe(
        &self,
        stream_id: &str,
        subscriber: SubscriberHandle,
    ) -> Result<(), GeminiError> {
        self.supervisor.subscribe(stream_id, subscriber).await
    }

    pub async fn unsubscribe(&self, stream_id: &str, subscriber: Uuid) -> Result<(), GeminiError> {
        self.supervisor.unsubscribe(stream_id, subscriber).await
    }

    pub async fn stop_stream(&self, stream_id: &str) -> Result<(), GeminiError> {
        self.supervisor.stop_stream(stream_id).await
    }

    pub async fn get_stream_info(&self, stream_id: &str) -> Result<StreamInfo, GeminiError> {
        self.supervisor.stream_info(stream_id).await
    }

    pub async fn list_streams(&self) -> Result<Vec<StreamId>, GeminiError> {
        self.supervisor.list_streams().await
    }

    pub async fn stream_stats(&self) -> Result<SupervisorStats, GeminiError> {
        self.supervisor.stats().await
    }
}

/// Builder over config resolution plus client-only wiring.
pub struct GeminiClientBuilder {
    config: ConfigBuilder,
    telemetry_sink: Option<mpsc::UnboundedSender<TelemetryEvent>>,
}

impl GeminiClientBuilder {
    pub fn new() -> Self {
        Self {
            config: ConfigBuilder::new(),
            telemetry_sink: None,
        }
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config = self.config.api_key(key);
        self
    }

    pub fn vertex_token(
        mut self,
        access_token: impl Into<String>,
        project_id: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        self.config = self.config.vertex_token(access_token, project_id, location);
        self
    }

    pub fn auth(mut self, auth: crate::config::AuthConfig) -> Self {
        self.config = self.config.auth(auth);
        self
    }

    pub fn default_model(mut self, model: impl Into<String>) -> Self {
        self.config = self.config.default_model(model);
        self
    }

    pub fn timeout(mut self, timeout: std::time::Duration) -> Self {
        self.config = self.config.timeout(timeout);
        self
    }

    pub fn telemetry_enabled(mut self, enabled: bool) -> Self {
        self.config = self.config.telemetry_enabled(enabled);
        self
    }

    /// Receive every telemetry event on a channel.
    pub fn telemetry_sink(mut self, sink: mpsc::UnboundedSender<TelemetryEvent>) -> Self {
        self.telemetry_sink = Some(sink);
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config = self.config.max_retries(retries);
        self
    }

    pub fn max_streams(mut self, limit: usize) -> Self {
        self.config = self.config.max_streams(limit);
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config = self.config.base_url(base_url);
        self
    }

    pub fn build(self) -> Result<GeminiClient, GeminiError> {
        let config = self.config.resolve()?;
        GeminiClient::with_telemetry_sink(config, self.telemetry_sink)
    }
}

impl Default for GeminiClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
