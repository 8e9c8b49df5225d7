//! Convoscope Server - Streaming Analysis Pipeline
//!
//! This library provides the server half of the Convoscope analysis
//! pipeline. It includes:
//! - Streaming HTTP handlers (one per analysis kind)
//! - The phase orchestrator and its analysis-backend boundary
//! - Event-stream framing with keepalive heartbeats
//! - Pre-stream request policy (rate limiting, size budget, validation)

pub mod config;
pub mod handlers;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;

pub use config::ServerConfig;
pub use routes::build_router;
pub use state::AppState;
pub use utils::error::{ServerError, ServerResult};
