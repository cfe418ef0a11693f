//! Message content: roles, parts, and inline media.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GeminiError;

/// One message in a conversation: a role plus an ordered list of parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    /// A single-part user message, the wrapped form of a plain-string input.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Some("user".to_string()),
            parts: vec![Part::text(text)],
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Some("model".to_string()),
            parts: vec![Part::text(text)],
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Some("system".to_string()),
            parts: vec![Part::text(text)],
        }
    }

    /// Concatenated text of every text part.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// One unit of content. The wire encodes the variant by its single key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename(serialize = "inlineData"), alias = "inlineData")]
        inline_data: Blob,
    },
    FileData {
        #[serde(rename(serialize = "fileData"), alias = "fileData")]
        file_data: Value,
    },
    FunctionCall {
        #[serde(rename(serialize = "functionCall"), alias = "functionCall")]
        function_call: Value,
    },
    FunctionResponse {
        #[serde(rename(serialize = "functionResponse"), alias = "functionResponse")]
        function_response: Value,
    },
    /// Parts this client does not model (executable code, thoughts, ...).
    /// Preserved as raw JSON so unknown response shapes never fail decoding.
    Other(Value),
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Inline media from raw bytes; the payload is base64-encoded.
    pub fn inline_data(bytes: &[u8], mime_type: impl Into<String>) -> Self {
        Self::InlineData {
            inline_data: Blob {
                mime_type: mime_type.into(),
                data: BASE64.encode(bytes),
            },
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text { .. })
    }
}

/// Base64-encoded media payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blob {
    #[serde(rename(serialize = "mimeType"), alias = "mimeType")]
    pub mime_type: String,
    pub data: String,
}

impl Blob {
    pub fn decode(&self) -> Result<Vec<u8>, GeminiError> {
        BASE64
            .decode(&self.data)
            .map_err(|e| GeminiError::InvalidInput(format!("invalid base64 payload: {e}")))
    }
}

/// Caller-facing input: a plain prompt string or an explicit message list.
///
/// Anything else is not representable, so the only runtime validation left
/// is rejecting an empty message list.
#[derive(Debug, Clone)]
pub enum Contents {
    Text(String),
    Messages(Vec<Content>),
}

impl Contents {
    /// The message list a request carries: strings become a single user
    /// message; an empty list is invalid.
    pub fn into_messages(self) -> Result<Vec<Content>, GeminiError> {
        match self {
            Self::Text(text) => Ok(vec![Content::user(text)]),
            Self::Messages(messages) => {
                if messages.is_empty() {
                    return Err(GeminiError::InvalidInput(
                        "contents must not be empty".to_string(),
                    ));
                }
                Ok(messages)
            }
        }
    }
}

impl From<&str> for Contents {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Contents {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<Content>> for Contents {
    fn from(messages: Vec<Content>) -> Self {
        Self::Messages(messages)
    }
}

impl From<Content> for Contents {
    fn from(message: Content) -> Self {
        Self::Messages(vec![message])
    }
}
