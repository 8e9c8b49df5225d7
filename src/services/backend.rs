//! Analysis Backend
//!
//! The boundary to whatever actually performs an analysis phase. The
//! orchestrator only ever sees this trait; the content of an analysis
//! (prompts, scoring, lexicons) lives behind it.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use convoscope_core::analysis::AnalysisKind;

/// Input for one phase execution.
#[derive(Debug, Clone, Serialize)]
pub struct BackendRequest {
    pub kind: AnalysisKind,
    /// Phase name within the kind's plan (e.g. "recon", "patterns").
    pub phase: String,
    pub conversation: String,
    /// Client-supplied seeds plus upstream phase outputs, by seed key.
    pub seeds: Map<String, Value>,
}

/// Errors from a backend execution.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Backend request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Backend returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Backend returned an unreadable response: {0}")]
    Decode(String),

    /// Execution-level failure reported by the backend itself.
    #[error("{0}")]
    Execution(String),
}

/// Executes one analysis phase. `execute` is the orchestrator's only
/// suspension point besides stream writes.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    async fn execute(&self, request: BackendRequest) -> Result<Value, BackendError>;
}

/// Backend that POSTs phase input to a configured upstream endpoint.
pub struct HttpBackend {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .build()
            .expect("failed to build reqwest client");
        Self {
            endpoint: endpoint.into(),
            client,
        }
    }
}

#[async_trait]
impl AnalysisBackend for HttpBackend {
    async fn execute(&self, request: BackendRequest) -> Result<Value, BackendError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }
}
