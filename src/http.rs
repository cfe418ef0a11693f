//! Unary HTTP transport.
//!
//! One shared `reqwest::Client` (connection pool included) serves every
//! request. Responses are normalized to the canonical snake_case shape here,
//! at the boundary, so wire spelling never leaks into caller types. Unary
//! requests are never retried.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::auth::{AuthStrategy, request_url};
use crate::error::GeminiError;
use crate::normalize::normalize_keys;
use crate::telemetry::{ContentsKind, RequestMeta, Telemetry, TelemetryEvent};

/// Per-request identity for telemetry.
#[derive(Debug, Clone)]
pub(crate) struct RequestContext {
    pub model: String,
    pub function: &'static str,
    pub contents_type: ContentsKind,
}

#[derive(Clone)]
pub(crate) struct HttpTransport {
    http: reqwest::Client,
    strategy: Arc<dyn AuthStrategy>,
    telemetry: Telemetry,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(
        http: reqwest::Client,
        strategy: Arc<dyn AuthStrategy>,
        telemetry: Telemetry,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            strategy,
            telemetry,
            timeout,
        }
    }

    pub async fn get(&self, path: &str, ctx: RequestContext) -> Result<Value, GeminiError> {
        self.execute(reqwest::Method::GET, path, None, ctx).await
    }

    pub async fn post(
        &self,
        path: &str,
        body: &Value,
        ctx: RequestContext,
    ) -> Result<Value, GeminiError> {
        self.execute(reqwest::Method::POST, path, Some(body), ctx)
            .await
    }

    async fn execute(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&Value>,
        ctx: RequestContext,
    ) -> Result<Value, GeminiError> {
        let url = request_url(self.strategy.as_ref(), path);
        let meta = RequestMeta {
            url: url.clone(),
            method: if method == reqwest::Method::GET { "GET" } else { "POST" },
            model: ctx.model,
            function: ctx.function,
            contents_type: ctx.contents_type,
        };

        self.telemetry.emit(TelemetryEvent::RequestStart {
            meta: meta.clone(),
            system_time: chrono::Utc::now(),
        });
        let started = Instant::now();

        match self.send(method, &url, body).await {
            Ok((status, value)) => {
                self.telemetry.emit(TelemetryEvent::RequestStop {
                    meta,
                    status,
                    duration_ms: started.elapsed().as_millis() as u64,
                });
                Ok(value)
            }
            Err(err) => {
                self.telemetry.emit(TelemetryEvent::RequestException {
                    meta,
                    reason: err.to_string(),
                    system_time: chrono::Utc::now(),
                });
                Err(err)
            }
        }
    }

    async fn send(
        &self,
        method: reqwest::Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<(u16, Value), GeminiError> {
        let headers = self.strategy.headers()?;
        let mut request = self
            .http
            .request(method, url)
            .headers(headers)
            .timeout(self.timeout);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(GeminiError::from)?;
        let status = response.status();
        let text = response.text().await.map_err(GeminiError::from)?;

        if status.is_success() {
            let value: Value = serde_json::from_str(&text)
                .map_err(|e| GeminiError::InvalidResponse(format!("body is not JSON: {e}")))?;
            Ok((status.as_u16(), normalize_keys(value)))
        } else {
            let body = serde_json::from_str::<Value>(&text).ok();
            Err(GeminiError::api(status.as_u16(), body))
        }
    }
}
