//! Request bodies and per-call options.
//!
//! Request types serialize straight to the wire: camelCase keys, with null
//! and empty-list fields dropped.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::content::Content;

fn none_or_empty<T>(field: &Option<Vec<T>>) -> bool {
    field.as_ref().map(Vec::is_empty).unwrap_or(true)
}

/// Body of `generateContent` / `streamGenerateContent`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "none_or_empty")]
    pub tools: Option<Vec<Tool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_config: Option<ToolConfig>,
    #[serde(skip_serializing_if = "none_or_empty")]
    pub safety_settings: Option<Vec<SafetySetting>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

impl GenerateContentRequest {
    pub(crate) fn build(contents: Vec<Content>, opts: &GenerateOptions) -> Self {
        Self {
            contents,
            tools: opts.tools.clone(),
            tool_config: opts.tool_config.clone(),
            safety_settings: opts.safety_settings.clone(),
            system_instruction: opts.system_instruction.clone(),
            generation_config: opts.generation_config.clone(),
        }
    }
}

/// Sampling and output controls, serialized under `generationConfig`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "none_or_empty")]
    pub stop_sequences: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate_count: Option<u32>,
}

impl GenerationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_top_p(mut self, top_p: f64) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn with_top_k(mut self, top_k: i32) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = Some(max_output_tokens);
        self
    }

    pub fn with_stop_sequences(mut self, stop_sequences: Vec<String>) -> Self {
        self.stop_sequences = Some(stop_sequences);
        self
    }

    pub fn with_response_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.response_mime_type = Some(mime_type.into());
        self
    }

    /// Request-side plumbing only; the schema travels to the service as-is.
    pub fn with_response_schema(mut self, schema: Value) -> Self {
        self.response_schema = Some(schema);
        self
    }

    pub fn with_candidate_count(mut self, count: u32) -> Self {
        self.candidate_count = Some(count);
        self
    }
}

/// Harm category for a safety setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HarmCategory {
    #[serde(rename = "HARM_CATEGORY_HARASSMENT")]
    Harassment,
    #[serde(rename = "HARM_CATEGORY_HATE_SPEECH")]
    HateSpeech,
    #[serde(rename = "HARM_CATEGORY_SEXUALLY_EXPLICIT")]
    SexuallyExplicit,
    #[serde(rename = "HARM_CATEGORY_DANGEROUS_CONTENT")]
    DangerousContent,
    #[serde(rename = "HARM_CATEGORY_CIVIC_INTEGRITY")]
    CivicIntegrity,
}

/// Blocking threshold for a safety setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HarmBlockThreshold {
    #[serde(rename = "BLOCK_NONE")]
    BlockNone,
    #[serde(rename = "BLOCK_ONLY_HIGH")]
    BlockOnlyHigh,
    #[serde(rename = "BLOCK_MEDIUM_AND_ABOVE")]
    BlockMediumAndAbove,
    #[serde(rename = "BLOCK_LOW_AND_ABOVE")]
    BlockLowAndAbove,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetySetting {
    pub category: HarmCategory,
    pub threshold: HarmBlockThreshold,
}

/// A tool declaration, forwarded to the service untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tool(pub Value);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_calling_config: Option<FunctionCallingConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionCallingConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "none_or_empty")]
    pub allowed_function_names: Option<Vec<String>>,
}

/// Per-call options for generation and token counting.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Overrides the client's default model.
    pub model: Option<String>,
    pub generation_config: Option<GenerationConfig>,
    pub safety_settings: Option<Vec<SafetySetting>>,
    pub system_instruction: Option<Content>,
    pub tools: Option<Vec<Tool>>,
    pub tool_config: Option<ToolConfig>,
}

impl GenerateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_generation_config(mut self, config: GenerationConfig) -> Self {
        self.generation_config = Some(config);
        self
    }

    pub fn with_safety_settings(mut self, settings: Vec<SafetySetting>) -> Self {
        self.safety_settings = Some(settings);
        self
    }

    pub fn with_system_instruction(mut self, instruction: Content) -> Self {
        self.system_instruction = Some(instruction);
        self
    }

    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_tool_config(mut self, config: ToolConfig) -> Self {
        self.tool_config = Some(config);
        self
    }
}

/// Body of `embedContent`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedContentRequest {
    /// Resource name of the embedding model, e.g. `models/text-embedding-004`.
    pub model: String,
    pub content: Content,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dimensionality: Option<u32>,
}

/// Per-call options for `embed_content`.
#[derive(Debug, Clone, Default)]
pub struct EmbedOptions {
    pub model: Option<String>,
    /// Task-type optimization hint (e.g. `RETRIEVAL_QUERY`).
    pub task_type: Option<String>,
    /// Context title; helps embedding quality for document tasks.
    pub title: Option<String>,
    pub output_dimensionality: Option<u32>,
}

impl EmbedOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_task_type(mut self, task_type: impl Into<String>) -> Self {
        self.task_type = Some(task_type.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_output_dimensionality(mut self, dimensions: u32) -> Self {
        self.output_dimensionality = Some(dimensions);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_serializes_to_camel_case_and_drops_empty_fields() {
        let request = GenerateContentRequest::build(
            vec![Content::user("hi")],
            &GenerateOptions::new()
                .with_generation_config(
                    GenerationConfig::new()
                        .with_temperature(0.7)
                        .with_max_output_tokens(256),
                )
                .with_safety_settings(vec![]),
        );

        let encoded = serde_json::to_value(&request).unwrap();
        assert_eq!(
            encoded,
            json!({
                "contents": [{"role": "user", "parts": [{"text": "hi"}]}],
                "generationConfig": {"temperature": 0.7, "maxOutputTokens": 256}
            })
        );
    }

    #[test]
    fn generation_config_uses_wire_key_names() {
        let config = GenerationConfig::new()
            .with_top_p(0.9)
            .with_top_k(40)
            .with_stop_sequences(vec!["END".to_string()])
            .with_response_mime_type("application/json")
            .with_response_schema(json!({"type": "object"}))
            .with_candidate_count(2);

        let encoded = serde_json::to_value(&config).unwrap();
        assert_eq!(encoded["topP"], 0.9);
        assert_eq!(encoded["topK"], 40);
        assert_eq!(encoded["stopSequences"], json!(["END"]));
        assert_eq!(encoded["responseMimeType"], "application/json");
        assert_eq!(encoded["responseSchema"], json!({"type": "object"}));
        assert_eq!(encoded["candidateCount"], 2);
    }

    #[test]
    fn safety_settings_use_service_enum_names() {
        let setting = SafetySetting {
            category: HarmCategory::HateSpeech,
            threshold: HarmBlockThreshold::BlockMediumAndAbove,
        };
        let encoded = serde_json::to_value(&setting).unwrap();
        assert_eq!(
            encoded,
            json!({"category": "HARM_CATEGORY_HATE_SPEECH", "threshold": "BLOCK_MEDIUM_AND_ABOVE"})
        );
    }

    #[test]
    fn embed_request_carries_the_model_resource_name() {
        let request = EmbedContentRequest {
            model: "models/text-embedding-004".to_string(),
            content: Content::user("embed me"),
            task_type: Some("RETRIEVAL_QUERY".to_string()),
            title: None,
            output_dimensionality: Some(256),
        };
        let encoded = serde_json::to_value(&request).unwrap();
        assert_eq!(encoded["model"], "models/text-embedding-004");
        assert_eq!(encoded["taskType"], "RETRIEVAL_QUERY");
        assert_eq!(encoded["outputDimensionality"], 256);
        assert!(encoded.get("title").is_none());
    }
}
