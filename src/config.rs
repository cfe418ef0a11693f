//! Client configuration and credential discovery.
//!
//! Sources, in priority order: explicit builder values, then environment
//! variables. Auto-detection prefers the Gemini API key over Vertex
//! credentials when both are present.
//!
//! Environment reads go through an injectable lookup so tests can resolve
//! against a plain map instead of mutating the process environment.

use std::collections::HashMap;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::error::GeminiError;

pub const GEMINI_API_KEY: &str = "GEMINI_API_KEY";
pub const VERTEX_ACCESS_TOKEN: &str = "VERTEX_ACCESS_TOKEN";
pub const VERTEX_PROJECT_ID: &str = "VERTEX_PROJECT_ID";
pub const VERTEX_LOCATION: &str = "VERTEX_LOCATION";
pub const VERTEX_JSON_FILE: &str = "VERTEX_JSON_FILE";
pub const VERTEX_SERVICE_ACCOUNT: &str = "VERTEX_SERVICE_ACCOUNT";
pub const GOOGLE_CLOUD_PROJECT: &str = "GOOGLE_CLOUD_PROJECT";
pub const GOOGLE_CLOUD_LOCATION: &str = "GOOGLE_CLOUD_LOCATION";

/// Which back-end a set of credentials targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthKind {
    /// Public Gemini API, authenticated with an API key.
    Gemini,
    /// Vertex AI, authenticated with an OAuth access token.
    Vertex,
}

impl std::fmt::Display for AuthKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gemini => write!(f, "gemini"),
            Self::Vertex => write!(f, "vertex"),
        }
    }
}

/// Signed credential material for one back-end.
///
/// Vertex token acquisition (signing a service-account JWT and exchanging it
/// for an access token) is a separate producer; this client consumes the
/// resulting token.
#[derive(Clone)]
pub enum Credentials {
    ApiKey {
        key: SecretString,
    },
    VertexToken {
        access_token: SecretString,
        project_id: String,
        location: String,
    },
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApiKey { key } => f
                .debug_struct("ApiKey")
                .field("key_present", &!key.expose_secret().is_empty())
                .finish(),
            Self::VertexToken {
                access_token,
                project_id,
                location,
            } => f
                .debug_struct("VertexToken")
                .field(
                    "access_token_present",
                    &!access_token.expose_secret().is_empty(),
                )
                .field("project_id", project_id)
                .field("location", location)
                .finish(),
        }
    }
}

/// A resolved auth selection: one kind, one set of credentials.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub kind: AuthKind,
    pub credentials: Credentials,
}

impl AuthConfig {
    pub fn gemini(api_key: impl Into<String>) -> Self {
        Self {
            kind: AuthKind::Gemini,
            credentials: Credentials::ApiKey {
                key: SecretString::from(api_key.into()),
            },
        }
    }

    pub fn vertex(
        access_token: impl Into<String>,
        project_id: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            kind: AuthKind::Vertex,
            credentials: Credentials::VertexToken {
                access_token: SecretString::from(access_token.into()),
                project_id: project_id.into(),
                location: location.into(),
            },
        }
    }
}

/// Resolved client configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Auth selection; `validate` rejects configs without one.
    pub auth: Option<AuthConfig>,
    /// Model used when a call does not name one.
    pub default_model: String,
    /// HTTP receive timeout. Also the streaming inter-chunk timeout.
    pub timeout: Duration,
    /// When false, the telemetry emitter becomes a no-op.
    pub telemetry_enabled: bool,
    /// Streaming connect retries (the unary client never retries).
    pub max_retries: u32,
    /// Supervisor capacity; `None` means unbounded.
    pub max_streams: Option<usize>,
    /// Base URL override for both back-ends (testing and proxies).
    pub base_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auth: None,
            default_model: "gemini-2.0-flash".to_string(),
            timeout: Duration::from_millis(30_000),
            telemetry_enabled: true,
            max_retries: 3,
            max_streams: None,
            base_url: None,
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Resolve a configuration from the process environment alone.
    pub fn from_env() -> Result<Self, GeminiError> {
        ConfigBuilder::new().resolve()
    }

    /// Fails when no credential source resolves, or when the resolved
    /// credentials are incomplete (the error names the missing field).
    pub fn validate(&self) -> Result<(), GeminiError> {
        let Some(auth) = &self.auth else {
            return Err(GeminiError::Config(
                "no credential source resolved; set GEMINI_API_KEY, Vertex credentials, \
                 or configure auth explicitly"
                    .to_string(),
            ));
        };
        match &auth.credentials {
            Credentials::ApiKey { key } => {
                if key.expose_secret().is_empty() {
                    return Err(GeminiError::missing_credential("api_key"));
                }
            }
            Credentials::VertexToken {
                access_token,
                project_id,
                location,
            } => {
                if access_token.expose_secret().is_empty() {
                    return Err(GeminiError::missing_credential("access_token"));
                }
                if project_id.is_empty() {
                    return Err(GeminiError::missing_credential("project_id"));
                }
                if location.is_empty() {
                    return Err(GeminiError::missing_credential("location"));
                }
            }
        }
        Ok(())
    }
}

/// Builder that layers explicit values over environment discovery.
pub struct ConfigBuilder {
    auth: Option<AuthConfig>,
    default_model: Option<String>,
    timeout: Option<Duration>,
    telemetry_enabled: Option<bool>,
    max_retries: Option<u32>,
    max_streams: Option<usize>,
    base_url: Option<String>,
    env: Option<HashMap<String, String>>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            auth: None,
            default_model: None,
            timeout: None,
            telemetry_enabled: None,
            max_retries: None,
            max_streams: None,
            base_url: None,
            env: None,
        }
    }

    /// Select a strategy explicitly, skipping auto-detection.
    pub fn auth(mut self, auth: AuthConfig) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Shorthand for explicit Gemini API-key auth.
    pub fn api_key(self, key: impl Into<String>) -> Self {
        self.auth(AuthConfig::gemini(key))
    }

    /// Shorthand for explicit Vertex bearer-token auth.
    pub fn vertex_token(
        self,
        access_token: impl Into<String>,
        project_id: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        self.auth(AuthConfig::vertex(access_token, project_id, location))
    }

    pub fn default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn telemetry_enabled(mut self, enabled: bool) -> Self {
        self.telemetry_enabled = Some(enabled);
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    pub fn max_streams(mut self, limit: usize) -> Self {
        self.max_streams = Some(limit);
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Resolve environment lookups against `vars` instead of the process
    /// environment. Intended for tests.
    pub fn env_map(mut self, vars: HashMap<String, String>) -> Self {
        self.env = Some(vars);
        self
    }

    fn env_var(&self, key: &str) -> Option<String> {
        let value = match &self.env {
            Some(map) => map.get(key).cloned(),
            None => std::env::var(key).ok(),
        };
        value.filter(|v| !v.is_empty())
    }

    fn detect_auth(&self) -> Option<AuthConfig> {
        // Documented preference: Gemini wins when both are configured.
        if let Some(key) = self.env_var(GEMINI_API_KEY) {
            return Some(AuthConfig::gemini(key));
        }

        let project = self
            .env_var(VERTEX_PROJECT_ID)
            .or_else(|| self.env_var(GOOGLE_CLOUD_PROJECT));
        let location = self
            .env_var(VERTEX_LOCATION)
            .or_else(|| self.env_var(GOOGLE_CLOUD_LOCATION));

        if let Some(token) = self.env_var(VERTEX_ACCESS_TOKEN) {
            return Some(AuthConfig::vertex(
                token,
                project.unwrap_or_default(),
                location.unwrap_or_default(),
            ));
        }

        // A service-account source classifies the strategy as Vertex, but
        // token production happens outside this client; validation will name
        // the missing token.
        if self.env_var(VERTEX_JSON_FILE).is_some()
            || self.env_var(VERTEX_SERVICE_ACCOUNT).is_some()
        {
            return Some(AuthConfig::vertex(
                String::new(),
                project.unwrap_or_default(),
                location.unwrap_or_default(),
            ));
        }

        None
    }

    /// Layer explicit values over environment discovery and validate.
    pub fn resolve(self) -> Result<Config, GeminiError> {
        let auth = self.auth.clone().or_else(|| self.detect_auth());
        let config = Config {
            auth,
            default_model: self
                .default_model
                .unwrap_or_else(|| Config::default().default_model),
            timeout: self.timeout.unwrap_or_else(|| Config::default().timeout),
            telemetry_enabled: self.telemetry_enabled.unwrap_or(true),
            max_retries: self.max_retries.unwrap_or(3),
            max_streams: self.max_streams,
            base_url: self.base_url,
        };
        config.validate()?;
        Ok(config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn resolves_gemini_from_env() {
        let config = ConfigBuilder::new()
            .env_map(env(&[(GEMINI_API_KEY, "abc")]))
            .resolve()
            .unwrap();
        let auth = config.auth.unwrap();
        assert_eq!(auth.kind, AuthKind::Gemini);
    }

    #[test]
    fn resolves_vertex_from_env() {
        let config = ConfigBuilder::new()
            .env_map(env(&[
                (VERTEX_ACCESS_TOKEN, "tok"),
                (VERTEX_PROJECT_ID, "proj"),
                (VERTEX_LOCATION, "us-central1"),
            ]))
            .resolve()
            .unwrap();
        assert_eq!(config.auth.unwrap().kind, AuthKind::Vertex);
    }

    #[test]
    fn vertex_falls_back_to_google_cloud_vars() {
        let config = ConfigBuilder::new()
            .env_map(env(&[
                (VERTEX_ACCESS_TOKEN, "tok"),
                (GOOGLE_CLOUD_PROJECT, "proj"),
                (GOOGLE_CLOUD_LOCATION, "europe-west4"),
            ]))
            .resolve()
            .unwrap();
        match config.auth.unwrap().credentials {
            Credentials::VertexToken {
                project_id,
                location,
                ..
            } => {
                assert_eq!(project_id, "proj");
                assert_eq!(location, "europe-west4");
            }
            other => panic!("unexpected credentials: {other:?}"),
        }
    }

    #[test]
    fn gemini_wins_when_both_are_present() {
        let config = ConfigBuilder::new()
            .env_map(env(&[
                (GEMINI_API_KEY, "abc"),
                (VERTEX_ACCESS_TOKEN, "tok"),
                (VERTEX_PROJECT_ID, "proj"),
                (VERTEX_LOCATION, "us-central1"),
            ]))
            .resolve()
            .unwrap();
        assert_eq!(config.auth.unwrap().kind, AuthKind::Gemini);
    }

    #[test]
    fn explicit_auth_skips_detection() {
        let config = ConfigBuilder::new()
            .vertex_token("tok", "proj", "us-central1")
            .env_map(env(&[(GEMINI_API_KEY, "abc")]))
            .resolve()
            .unwrap();
        assert_eq!(config.auth.unwrap().kind, AuthKind::Vertex);
    }

    #[test]
    fn no_credentials_fails_validation() {
        let err = ConfigBuilder::new().env_map(env(&[])).resolve().unwrap_err();
        assert!(matches!(err, GeminiError::Config(_)));
    }

    #[test]
    fn service_account_source_requires_a_token() {
        let err = ConfigBuilder::new()
            .env_map(env(&[
                (VERTEX_JSON_FILE, "/etc/sa.json"),
                (VERTEX_PROJECT_ID, "proj"),
                (VERTEX_LOCATION, "us-central1"),
            ]))
            .resolve()
            .unwrap_err();
        assert!(err.to_string().contains("missing credential: access_token"));
    }

    #[test]
    fn incomplete_vertex_credentials_name_the_field() {
        let err = ConfigBuilder::new()
            .env_map(env(&[(VERTEX_ACCESS_TOKEN, "tok")]))
            .resolve()
            .unwrap_err();
        assert!(err.to_string().contains("missing credential: project_id"));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let config = ConfigBuilder::new().api_key("super-secret").resolve().unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("key_present"));
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = ConfigBuilder::new().api_key("k").resolve().unwrap();
        assert_eq!(config.default_model, "gemini-2.0-flash");
        assert_eq!(config.timeout, Duration::from_millis(30_000));
        assert!(config.telemetry_enabled);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.max_streams, None);
    }
}
