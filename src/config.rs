//! Server Configuration
//!
//! Typed configuration with environment overrides. The heartbeat interval
//! and the request budgets are tuning values; defaults match production.

use std::env;
use std::time::Duration;

/// Runtime configuration for the analysis server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address for the HTTP server.
    pub bind_addr: String,
    /// Upstream analysis backend endpoint.
    pub backend_url: String,
    /// Interval between keepalive comment frames on open streams.
    pub heartbeat_interval: Duration,
    /// Wall-clock budget for one whole stream; exceeding it cancels the run
    /// and closes the stream without a terminal event.
    pub max_stream_duration: Duration,
    /// Maximum accepted request body size, in bytes.
    pub max_body_bytes: usize,
    /// Fixed rate-limit window length.
    pub rate_limit_window: Duration,
    /// Requests allowed per identity per window.
    pub rate_limit_max_requests: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8790".to_string(),
            backend_url: "http://127.0.0.1:8791/v1/execute".to_string(),
            heartbeat_interval: Duration::from_millis(
                convoscope_core::event::DEFAULT_HEARTBEAT_MS,
            ),
            max_stream_duration: Duration::from_secs(300),
            max_body_bytes: 256 * 1024,
            rate_limit_window: Duration::from_secs(60),
            rate_limit_max_requests: 30,
        }
    }
}

impl ServerConfig {
    /// Build a config from `CONVOSCOPE_*` environment variables, falling
    /// back to defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: env_string("CONVOSCOPE_BIND_ADDR", &defaults.bind_addr),
            backend_url: env_string("CONVOSCOPE_BACKEND_URL", &defaults.backend_url),
            heartbeat_interval: Duration::from_millis(env_u64(
                "CONVOSCOPE_HEARTBEAT_MS",
                defaults.heartbeat_interval.as_millis() as u64,
            )),
            max_stream_duration: Duration::from_secs(env_u64(
                "CONVOSCOPE_MAX_STREAM_SECS",
                defaults.max_stream_duration.as_secs(),
            )),
            max_body_bytes: env_usize("CONVOSCOPE_MAX_BODY_BYTES", defaults.max_body_bytes),
            rate_limit_window: Duration::from_secs(env_u64(
                "CONVOSCOPE_RATE_WINDOW_SECS",
                defaults.rate_limit_window.as_secs(),
            )),
            rate_limit_max_requests: env_u64(
                "CONVOSCOPE_RATE_MAX_REQUESTS",
                u64::from(defaults.rate_limit_max_requests),
            ) as u32,
        }
    }
}

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}
