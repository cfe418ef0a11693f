//! # geminix
//!
//! A client library for Google's generative-AI service, targeting both the
//! public Gemini API (API-key auth) and Vertex AI (OAuth bearer-token auth).
//! Both back-ends expose the same logical surface; they differ in URL shape,
//! headers, and credential placement, which the auth strategies absorb.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use geminix::{GeminiClient, GenerateOptions};
//!
//! // Credentials from GEMINI_API_KEY or Vertex environment variables.
//! let client = GeminiClient::from_env()?;
//! let response = client
//!     .generate_content("What is 2+2?", &GenerateOptions::new())
//!     .await?;
//! println!("{}", response.text().unwrap_or_default());
//! ```
//!
//! ## Streaming
//!
//! Streaming responses are fanned out by a process-wide supervisor. Each
//! subscriber is an unbounded channel; the supervisor watches its lifetime
//! and tears the stream down when the last subscriber goes away.
//!
//! ```rust,ignore
//! use geminix::{GeminiClient, GenerateOptions, StreamMessage, SubscriberHandle};
//!
//! let client = GeminiClient::from_env()?;
//! let (subscriber, mut rx) = SubscriberHandle::channel();
//! let stream_id = client
//!     .stream_generate_content("Count 1 to 3", &GenerateOptions::new(), subscriber)
//!     .await?;
//! while let Some(message) = rx.recv().await {
//!     match message {
//!         StreamMessage::Event { data, .. } => println!("chunk: {data}"),
//!         StreamMessage::Complete { .. } => break,
//!         StreamMessage::Error { error, .. } => return Err(error.into()),
//!         StreamMessage::Stopped { .. } => break,
//!     }
//! }
//! ```
//!
//! Responses are presented in canonical snake_case form; the camelCase wire
//! shape never leaks past the HTTP boundary.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod normalize;
pub mod retry;
pub mod sse;
pub mod streaming;
pub mod telemetry;
pub mod types;

mod http;

pub use client::{GeminiClient, GeminiClientBuilder};
pub use config::{AuthConfig, AuthKind, Config, Credentials};
pub use error::GeminiError;
pub use sse::{SseEvent, SseParser};
pub use streaming::{
    StreamId, StreamInfo, StreamMessage, StreamStatus, StreamSupervisor, SubscriberHandle,
    SupervisorStats,
};
pub use telemetry::{ContentsKind, Telemetry, TelemetryEvent};
pub use types::{
    Blob, Candidate, Content, Contents, EmbedContentResponse, EmbedOptions,
    GenerateContentResponse, GenerateOptions, GenerationConfig, HarmBlockThreshold, HarmCategory,
    ListModelsOptions, ListModelsResponse, Model, Part, SafetySetting, TokenCount, Tool,
    ToolConfig, UsageMetadata,
};

/// Commonly used items.
pub mod prelude {
    pub use crate::client::{GeminiClient, GeminiClientBuilder};
    pub use crate::error::GeminiError;
    pub use crate::streaming::{StreamMessage, SubscriberHandle};
    pub use crate::types::{
        Content, Contents, GenerateContentResponse, GenerateOptions, GenerationConfig, Part,
    };
}
