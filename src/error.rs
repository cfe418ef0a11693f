//! Error handling for the Gemini client.
//!
//! Every fallible operation in this crate returns `Result<T, GeminiError>`.
//! Expected failures are never signalled through panics; a failure inside a
//! streaming worker terminates that stream only and reaches its subscribers
//! as a `StreamMessage::Error`.

use serde_json::Value;

/// All error conditions surfaced by this crate.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GeminiError {
    /// Missing or invalid credentials, or an unknown auth kind.
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport-level failure: DNS, connection refused, TLS, read timeout.
    #[error("network error: {0}")]
    Network(String),

    /// Non-2xx response carrying the API's structured error payload (or a
    /// synthesized `{"message": "HTTP <status>"}` when the body had none).
    #[error("API error {status}: {detail}")]
    Api { status: u16, detail: Value },

    /// 2xx response whose body was not valid JSON or did not match the
    /// expected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Caller-supplied contents or options are malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Operation targeted a stream id that is not in the registry.
    #[error("stream not found: {0}")]
    StreamNotFound(String),

    /// The supervisor's `max_streams` limit has been reached.
    #[error("stream capacity exceeded (limit: {limit})")]
    CapacityExceeded { limit: usize },

    /// Reserved for unrecoverable SSE parse failures. The current parser
    /// drops malformed events instead of failing, so this is never produced.
    #[error("parse error: {0}")]
    Parse(String),
}

impl GeminiError {
    /// Build an API error from a status code and the decoded error body.
    ///
    /// When the body carries the API's `{"error": {...}}` envelope, the inner
    /// object becomes the detail; otherwise a minimal detail is synthesized.
    pub fn api(status: u16, body: Option<Value>) -> Self {
        let detail = body
            .and_then(|mut v| v.get_mut("error").map(Value::take))
            .unwrap_or_else(|| serde_json::json!({ "message": format!("HTTP {status}") }));
        Self::Api { status, detail }
    }

    pub(crate) fn missing_credential(field: &str) -> Self {
        Self::Config(format!("missing credential: {field}"))
    }

    /// Whether the streaming transport may retry after this error.
    ///
    /// Unary requests never retry; 4xx responses are permanent everywhere.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// HTTP status code, when this error originated from a response.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The API's human-readable message, when present in the error detail.
    pub fn api_message(&self) -> Option<&str> {
        match self {
            Self::Api { detail, .. } => detail.get("message").and_then(Value::as_str),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for GeminiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Network("timeout".to_string())
        } else if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn api_error_extracts_structured_detail() {
        let body = json!({"error": {"code": 404, "message": "model not found", "status": "NOT_FOUND"}});
        let err = GeminiError::api(404, Some(body));
        assert_eq!(err.status_code(), Some(404));
        assert_eq!(err.api_message(), Some("model not found"));
    }

    #[test]
    fn api_error_synthesizes_detail_without_body() {
        let err = GeminiError::api(503, None);
        assert_eq!(err.api_message(), Some("HTTP 503"));
    }

    #[test]
    fn retryability_follows_status_class() {
        assert!(GeminiError::Network("connection refused".into()).is_retryable());
        assert!(GeminiError::api(500, None).is_retryable());
        assert!(!GeminiError::api(404, None).is_retryable());
        assert!(!GeminiError::Config("no credentials".into()).is_retryable());
        assert!(!GeminiError::InvalidInput("empty contents".into()).is_retryable());
    }

    #[test]
    fn missing_credential_names_the_field() {
        let err = GeminiError::missing_credential("access_token");
        assert!(err.to_string().contains("missing credential: access_token"));
    }
}
