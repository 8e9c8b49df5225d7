//! Analysis API Client
//!
//! Thin HTTP layer over the server's streaming endpoints: one POST per
//! analysis kind. Pre-stream rejections (validation, rate limit, size) come
//! back as ordinary JSON error responses and surface as `ClientError::Api`.

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use convoscope_core::analysis::AnalysisKind;

use crate::error::{ClientError, ClientResult};
use crate::transport::{self, StreamOutcome};

/// Build a `reqwest::Client` for the analysis API.
pub fn build_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .build()
        .expect("failed to build reqwest client")
}

/// Client for the Convoscope analysis endpoints.
#[derive(Clone)]
pub struct AnalysisClient {
    base_url: String,
    http: reqwest::Client,
}

impl AnalysisClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, build_http_client())
    }

    /// Use a preconfigured HTTP client (proxy, timeouts).
    pub fn with_client(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, http }
    }

    fn endpoint(&self, kind: AnalysisKind) -> String {
        format!("{}/v1/analysis/{}", self.base_url, kind.path_segment())
    }

    /// Issue one streaming request and read it to its end, delivering each
    /// event to `on_event` in arrival order.
    pub async fn stream<F>(
        &self,
        kind: AnalysisKind,
        body: &Value,
        token: &CancellationToken,
        on_event: F,
    ) -> ClientResult<StreamOutcome>
    where
        F: FnMut(&convoscope_core::event::StreamEvent),
    {
        let request = self.http.post(self.endpoint(kind)).json(body).send();
        let response = tokio::select! {
            _ = token.cancelled() => return Ok(StreamOutcome::Cancelled),
            response = request => response?,
        };

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v.get("error").and_then(Value::as_str).map(String::from))
                .unwrap_or(text);
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        transport::read_event_stream(response, token, on_event).await
    }
}
