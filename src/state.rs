//! Application State
//!
//! Shared state handed to every handler: configuration, the analysis
//! backend, and the rate limiter.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::services::backend::AnalysisBackend;
use crate::services::rate_limit::FixedWindowLimiter;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub backend: Arc<dyn AnalysisBackend>,
    pub limiter: Arc<FixedWindowLimiter>,
}

impl AppState {
    pub fn new(config: ServerConfig, backend: Arc<dyn AnalysisBackend>) -> Self {
        let limiter = Arc::new(FixedWindowLimiter::new(
            config.rate_limit_max_requests,
            config.rate_limit_window,
        ));
        Self {
            config: Arc::new(config),
            backend,
            limiter,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .finish()
    }
}
