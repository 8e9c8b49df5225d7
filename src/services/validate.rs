//! Request Validation
//!
//! Schema checks for analysis request bodies, applied before any stream is
//! opened. A failure here is an ordinary `400` JSON response, never an
//! in-stream error event.

use serde_json::{Map, Value};

use convoscope_core::analysis::AnalysisKind;

use crate::utils::error::{ServerError, ServerResult};

/// A validated request body.
#[derive(Debug, Clone)]
pub struct AnalysisPayload {
    pub conversation: String,
    /// Upstream results this request is seeded with, by seed key.
    pub seeds: Map<String, Value>,
}

/// Seeds a kind cannot run without.
fn required_seeds(kind: AnalysisKind) -> &'static [&'static str] {
    match kind {
        AnalysisKind::DeepRecon => &["recon"],
        AnalysisKind::Cps => &["recon", "deep_recon"],
        AnalysisKind::Recon | AnalysisKind::Subtext => &[],
    }
}

/// Parse and validate a raw request body for `kind`.
pub fn validate_request(kind: AnalysisKind, body: &[u8]) -> ServerResult<AnalysisPayload> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ServerError::validation(format!("body is not valid JSON: {e}")))?;

    let conversation = value
        .get("conversation")
        .and_then(Value::as_str)
        .ok_or_else(|| ServerError::validation("conversation is required and must be a string"))?;
    if conversation.trim().is_empty() {
        return Err(ServerError::validation("conversation must not be empty"));
    }

    let mut seeds = Map::new();
    for &seed in required_seeds(kind) {
        match value.get(seed) {
            Some(seed_value) if !seed_value.is_null() => {
                seeds.insert(seed.to_string(), seed_value.clone());
            }
            _ => {
                return Err(ServerError::validation(format!(
                    "missing required field for {kind}: {seed}"
                )));
            }
        }
    }

    Ok(AnalysisPayload {
        conversation: conversation.to_string(),
        seeds,
    })
}
