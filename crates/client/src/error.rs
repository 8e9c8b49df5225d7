//! Client Error Types

use thiserror::Error;

/// Errors surfaced by the client-side transport and API layer.
///
/// Terminal `error` events from the server are not errors at this layer;
/// they are delivered as events and recorded by the operation state machine.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Network / connection errors from the HTTP client
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-streaming rejection before a stream opened (4xx/5xx)
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Undecodable frame payload on the event stream
    #[error("Decode error: {0}")]
    Decode(String),
}

/// Result type alias for client errors
pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    /// Create a decode error
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }
}
