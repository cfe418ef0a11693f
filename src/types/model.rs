//! Model discovery, token counting, and embedding response types.

use serde::{Deserialize, Serialize};

use crate::error::GeminiError;

/// Model metadata as returned by the service (canonical form).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    /// Resource name, e.g. `models/gemini-2.0-flash`.
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_model_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_token_limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_token_limit: Option<u32>,
    #[serde(default)]
    pub supported_generation_methods: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<i32>,
}

impl Model {
    /// Bare model id without the `models/` prefix.
    pub fn id(&self) -> &str {
        self.name.strip_prefix("models/").unwrap_or(&self.name)
    }

    pub fn supports(&self, method: &str) -> bool {
        self.supported_generation_methods
            .iter()
            .any(|m| m == method)
    }
}

/// One page of `list_models`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListModelsResponse {
    #[serde(default)]
    pub models: Vec<Model>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// Pagination options for `list_models`.
#[derive(Debug, Clone, Default)]
pub struct ListModelsOptions {
    /// Models per page, 1–1000.
    pub page_size: Option<u32>,
    pub page_token: Option<String>,
}

impl ListModelsOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn with_page_token(mut self, token: impl Into<String>) -> Self {
        self.page_token = Some(token.into());
        self
    }

    pub(crate) fn validate(&self) -> Result<(), GeminiError> {
        if let Some(size) = self.page_size
            && !(1..=1000).contains(&size)
        {
            return Err(GeminiError::InvalidInput(format!(
                "page_size must be between 1 and 1000, got {size}"
            )));
        }
        Ok(())
    }

    pub(crate) fn to_query(&self) -> String {
        let mut params = Vec::new();
        if let Some(size) = self.page_size {
            params.push(format!("pageSize={size}"));
        }
        if let Some(token) = &self.page_token {
            params.push(format!("pageToken={token}"));
        }
        if params.is_empty() {
            String::new()
        } else {
            format!("?{}", params.join("&"))
        }
    }
}

/// Result of `count_tokens`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenCount {
    pub total_tokens: u64,
}

/// Result of `embed_content`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedContentResponse {
    pub embedding: ContentEmbedding,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentEmbedding {
    #[serde(default)]
    pub values: Vec<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize_keys;
    use serde_json::json;

    #[test]
    fn model_decodes_from_normalized_wire_shape() {
        let normalized = normalize_keys(json!({
            "name": "models/gemini-2.0-flash",
            "displayName": "Gemini 2.0 Flash",
            "inputTokenLimit": 1048576,
            "outputTokenLimit": 8192,
            "supportedGenerationMethods": ["generateContent", "countTokens"]
        }));
        let model: Model = serde_json::from_value(normalized).unwrap();
        assert_eq!(model.id(), "gemini-2.0-flash");
        assert!(model.supports("generateContent"));
        assert!(!model.supports("embedContent"));
    }

    #[test]
    fn page_size_bounds() {
        assert!(ListModelsOptions::new().with_page_size(1).validate().is_ok());
        assert!(ListModelsOptions::new().with_page_size(1000).validate().is_ok());
        assert!(ListModelsOptions::new().with_page_size(0).validate().is_err());
        assert!(ListModelsOptions::new().with_page_size(1001).validate().is_err());
        assert!(ListModelsOptions::new().validate().is_ok());
    }

    #[test]
    fn query_string_uses_wire_parameter_names() {
        let query = ListModelsOptions::new()
            .with_page_size(50)
            .with_page_token("tok123")
            .to_query();
        assert_eq!(query, "?pageSize=50&pageToken=tok123");
        assert_eq!(ListModelsOptions::new().to_query(), "");
    }

    #[test]
    fn token_count_decodes_from_normalized_body() {
        let normalized = normalize_keys(json!({"totalTokens": 31}));
        let count: TokenCount = serde_json::from_value(normalized).unwrap();
        assert_eq!(count.total_tokens, 31);
    }
}
