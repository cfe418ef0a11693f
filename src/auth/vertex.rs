//! Vertex AI (bearer-token) strategy.
//!
//! Credentials travel as `Authorization: Bearer <token>`; the base URL is
//! the regional aiplatform host scoped to project, location, and the Google
//! publisher namespace. The `global` location uses the unprefixed host.

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};

use crate::config::AuthKind;
use crate::error::GeminiError;

use super::AuthStrategy;

#[derive(Debug)]
pub struct VertexStrategy {
    access_token: SecretString,
    project_id: String,
    location: String,
    base_url_override: Option<String>,
}

impl VertexStrategy {
    pub fn new(
        access_token: SecretString,
        project_id: &str,
        location: &str,
        base_url_override: Option<&str>,
    ) -> Self {
        Self {
            access_token,
            project_id: project_id.to_string(),
            location: location.to_string(),
            base_url_override: base_url_override.map(str::to_string),
        }
    }

    fn host(&self) -> String {
        if self.location == "global" {
            "aiplatform.googleapis.com".to_string()
        } else {
            format!("{}-aiplatform.googleapis.com", self.location)
        }
    }
}

impl AuthStrategy for VertexStrategy {
    fn kind(&self) -> AuthKind {
        AuthKind::Vertex
    }

    fn base_url(&self) -> String {
        match &self.base_url_override {
            Some(base) => base.clone(),
            None => format!(
                "https://{}/v1/projects/{}/locations/{}/publishers/google",
                self.host(),
                self.project_id,
                self.location
            ),
        }
    }

    fn headers(&self) -> Result<HeaderMap, GeminiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let bearer = format!("Bearer {}", self.access_token.expose_secret());
        let value = HeaderValue::from_str(&bearer).map_err(|_| {
            GeminiError::Config("access token contains invalid header bytes".to_string())
        })?;
        headers.insert(AUTHORIZATION, value);
        Ok(headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::request_url;

    fn strategy() -> VertexStrategy {
        VertexStrategy::new(SecretString::from("tok"), "my-proj", "us-central1", None)
    }

    #[test]
    fn base_url_is_regional_and_project_scoped() {
        assert_eq!(
            strategy().base_url(),
            "https://us-central1-aiplatform.googleapis.com/v1/projects/my-proj/locations/us-central1/publishers/google"
        );
    }

    #[test]
    fn global_location_uses_the_unprefixed_host() {
        let strategy = VertexStrategy::new(SecretString::from("tok"), "my-proj", "global", None);
        assert_eq!(
            strategy.base_url(),
            "https://aiplatform.googleapis.com/v1/projects/my-proj/locations/global/publishers/google"
        );
    }

    #[test]
    fn headers_carry_a_bearer_token() {
        let headers = strategy().headers().unwrap();
        assert_eq!(
            headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()),
            Some("Bearer tok")
        );
    }

    #[test]
    fn action_url_matches_the_vertex_shape() {
        assert_eq!(
            request_url(&strategy(), "models/gemini-2.0-flash:streamGenerateContent"),
            "https://us-central1-aiplatform.googleapis.com/v1/projects/my-proj/locations/us-central1/publishers/google/models/gemini-2.0-flash:streamGenerateContent"
        );
    }
}
