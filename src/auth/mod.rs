//! Authentication strategies.
//!
//! Both back-ends expose the same logical surface but differ in URL shape,
//! headers, and credential placement. A strategy turns credentials plus a
//! logical path into an absolute URL and a header set.

mod gemini;
mod vertex;

pub use gemini::GeminiStrategy;
pub use vertex::VertexStrategy;

use std::sync::Arc;

use reqwest::header::HeaderMap;

use crate::config::{AuthConfig, AuthKind, Credentials};
use crate::error::GeminiError;

/// Per-back-end URL and header construction.
pub trait AuthStrategy: Send + Sync + std::fmt::Debug {
    fn kind(&self) -> AuthKind;

    /// Base URL including the API version segment (and, for Vertex, the
    /// project/location/publisher prefix).
    fn base_url(&self) -> String;

    /// Headers carrying the credential and content type.
    fn headers(&self) -> Result<HeaderMap, GeminiError>;

    /// Path for a model action, e.g. `models/gemini-2.0-flash:generateContent`.
    fn action_path(&self, model: &str, endpoint: &str) -> String {
        format!("models/{model}:{endpoint}")
    }
}

/// Build the strategy matching a resolved auth selection.
///
/// Missing credential fields fail with a `Config` error naming the field.
pub fn strategy_for(
    auth: &AuthConfig,
    base_url_override: Option<&str>,
) -> Result<Arc<dyn AuthStrategy>, GeminiError> {
    match (&auth.kind, &auth.credentials) {
        (AuthKind::Gemini, Credentials::ApiKey { key }) => Ok(Arc::new(
            GeminiStrategy::new(key.clone(), base_url_override),
        )),
        (AuthKind::Vertex, Credentials::VertexToken {
            access_token,
            project_id,
            location,
        }) => {
            if project_id.is_empty() {
                return Err(GeminiError::missing_credential("project_id"));
            }
            if location.is_empty() {
                return Err(GeminiError::missing_credential("location"));
            }
            Ok(Arc::new(VertexStrategy::new(
                access_token.clone(),
                project_id,
                location,
                base_url_override,
            )))
        }
        (kind, _) => Err(GeminiError::Config(format!(
            "credentials do not match auth kind {kind}"
        ))),
    }
}

/// Map a logical path to an absolute URL.
///
/// Action paths (`models/<name>:<verb>`) are routed through the strategy's
/// `action_path`; collection and resource paths are appended verbatim.
pub fn request_url(strategy: &dyn AuthStrategy, logical_path: &str) -> String {
    let base = strategy.base_url();
    let base = base.trim_end_matches('/');
    match split_action(logical_path) {
        Some((model, endpoint)) => {
            format!("{base}/{}", strategy.action_path(model, endpoint))
        }
        None => format!("{base}/{logical_path}"),
    }
}

/// Split `models/<name>:<verb>` into `(<name>, <verb>)`; `None` for
/// collection and resource paths.
fn split_action(path: &str) -> Option<(&str, &str)> {
    let (resource, endpoint) = path.split_once(':')?;
    let model = resource.strip_prefix("models/").unwrap_or(resource);
    Some((model, endpoint))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    #[test]
    fn action_paths_route_through_the_strategy() {
        let strategy = GeminiStrategy::new(SecretString::from("k"), None);
        assert_eq!(
            request_url(&strategy, "models/gemini-2.0-flash:generateContent"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[test]
    fn collection_paths_append_verbatim() {
        let strategy = GeminiStrategy::new(SecretString::from("k"), None);
        assert_eq!(
            request_url(&strategy, "models"),
            "https://generativelanguage.googleapis.com/v1beta/models"
        );
        assert_eq!(
            request_url(&strategy, "models?pageSize=5"),
            "https://generativelanguage.googleapis.com/v1beta/models?pageSize=5"
        );
    }

    #[test]
    fn resource_paths_append_verbatim() {
        let strategy = GeminiStrategy::new(SecretString::from("k"), None);
        assert_eq!(
            request_url(&strategy, "models/gemini-2.0-flash"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash"
        );
    }

    #[test]
    fn strategy_for_rejects_mismatched_credentials() {
        let auth = AuthConfig {
            kind: AuthKind::Vertex,
            credentials: Credentials::ApiKey {
                key: SecretString::from("k"),
            },
        };
        assert!(strategy_for(&auth, None).is_err());
    }

    #[test]
    fn strategy_for_names_missing_vertex_fields() {
        let auth = AuthConfig::vertex("tok", "", "us-central1");
        let err = strategy_for(&auth, None).unwrap_err();
        assert!(err.to_string().contains("missing credential: project_id"));
    }
}
