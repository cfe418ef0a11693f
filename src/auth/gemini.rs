//! Gemini API (keyed) strategy.
//!
//! Credentials travel in the `x-goog-api-key` header; the base URL is the
//! public generative-language endpoint under `v1beta`.

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};

use crate::config::AuthKind;
use crate::error::GeminiError;

use super::AuthStrategy;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug)]
pub struct GeminiStrategy {
    api_key: SecretString,
    base_url: String,
}

impl GeminiStrategy {
    pub fn new(api_key: SecretString, base_url_override: Option<&str>) -> Self {
        Self {
            api_key,
            base_url: base_url_override.unwrap_or(GEMINI_BASE_URL).to_string(),
        }
    }
}

impl AuthStrategy for GeminiStrategy {
    fn kind(&self) -> AuthKind {
        AuthKind::Gemini
    }

    fn base_url(&self) -> String {
        self.base_url.clone()
    }

    fn headers(&self) -> Result<HeaderMap, GeminiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let key = HeaderValue::from_str(self.api_key.expose_secret())
            .map_err(|_| GeminiError::Config("API key contains invalid header bytes".to_string()))?;
        headers.insert("x-goog-api-key", key);
        Ok(headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_carry_the_api_key() {
        let strategy = GeminiStrategy::new(SecretString::from("abc"), None);
        let headers = strategy.headers().unwrap();
        assert_eq!(
            headers.get("x-goog-api-key").and_then(|v| v.to_str().ok()),
            Some("abc")
        );
        assert_eq!(
            headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()),
            Some("application/json")
        );
    }

    #[test]
    fn base_url_override_wins() {
        let strategy = GeminiStrategy::new(SecretString::from("abc"), Some("http://localhost:9"));
        assert_eq!(strategy.base_url(), "http://localhost:9");
    }

    #[test]
    fn action_path_is_the_model_action() {
        let strategy = GeminiStrategy::new(SecretString::from("abc"), None);
        assert_eq!(
            strategy.action_path("gemini-2.0-flash", "countTokens"),
            "models/gemini-2.0-flash:countTokens"
        );
    }
}
