//! Request and response types.
//!
//! Requests serialize to the wire's camelCase shape; responses deserialize
//! from the canonical snake_case form produced at the HTTP boundary (the
//! camelCase wire spellings remain accepted through serde aliases).

mod content;
mod model;
mod request;
mod response;

pub use content::{Blob, Content, Contents, Part};
pub use model::{
    ContentEmbedding, EmbedContentResponse, ListModelsOptions, ListModelsResponse, Model,
    TokenCount,
};
pub use request::{
    EmbedContentRequest, EmbedOptions, FunctionCallingConfig, GenerateContentRequest,
    GenerateOptions, GenerationConfig, HarmBlockThreshold, HarmCategory, SafetySetting, Tool,
    ToolConfig,
};
pub use response::{
    Candidate, CitationMetadata, GenerateContentResponse, PromptFeedback, SafetyRating,
    UsageMetadata,
};
