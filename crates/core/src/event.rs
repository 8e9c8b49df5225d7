//! Wire Event Types
//!
//! The typed units carried on an analysis event stream. The server frames
//! each event as an SSE `data:` payload and the client transport decodes
//! them back; keepalive comment frames are transport noise, not events.
//!
//! Exactly one terminal event (`*_complete` or `error`) is observed per
//! uncancelled request stream.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::analysis::AnalysisKind;

/// Interval between keepalive comment frames on an otherwise idle stream.
/// Defeats idle-connection teardown by proxies; it does not extend the
/// wall-clock budget of a request.
pub const DEFAULT_HEARTBEAT_MS: u64 = 15_000;

/// Delimiter between frames on the wire.
pub const FRAME_DELIMITER: &str = "\n\n";

/// A keepalive comment frame. Filtered out by the client transport.
pub const HEARTBEAT_FRAME: &str = ":\n\n";

/// One event on an analysis stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A phase checkpoint. `status` is matched verbatim against the job's
    /// phase map on the client; unknown statuses are a display no-op.
    Progress { status: String },

    /// Recon request finished.
    ReconComplete { result: Value },

    /// Deep recon request finished.
    DeepReconComplete { result: Value },

    /// Main analysis request finished.
    CpsComplete { result: Value },

    /// Subtext request finished.
    SubtextComplete { result: Value },

    /// Terminal failure. The message is surfaced to the user verbatim.
    Error { error: String },
}

impl StreamEvent {
    /// Create a progress checkpoint event.
    pub fn progress(status: impl Into<String>) -> Self {
        StreamEvent::Progress {
            status: status.into(),
        }
    }

    /// Create a terminal error event.
    pub fn error(message: impl Into<String>) -> Self {
        StreamEvent::Error {
            error: message.into(),
        }
    }

    /// The terminal completion event for a request kind.
    pub fn complete(kind: AnalysisKind, result: Value) -> Self {
        match kind {
            AnalysisKind::Recon => StreamEvent::ReconComplete { result },
            AnalysisKind::DeepRecon => StreamEvent::DeepReconComplete { result },
            AnalysisKind::Cps => StreamEvent::CpsComplete { result },
            AnalysisKind::Subtext => StreamEvent::SubtextComplete { result },
        }
    }

    /// Whether this event ends its stream.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamEvent::Progress { .. })
    }

    /// The completion payload, if this is a `*_complete` event.
    pub fn into_result(self) -> Option<Value> {
        match self {
            StreamEvent::ReconComplete { result }
            | StreamEvent::DeepReconComplete { result }
            | StreamEvent::CpsComplete { result }
            | StreamEvent::SubtextComplete { result } => Some(result),
            _ => None,
        }
    }

    /// Encode as an SSE data frame.
    pub fn to_frame(&self) -> serde_json::Result<String> {
        Ok(format!("data: {}{}", serde_json::to_string(self)?, FRAME_DELIMITER))
    }
}
