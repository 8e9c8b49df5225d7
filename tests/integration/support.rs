//! Shared Test Support
//!
//! An in-process server on an ephemeral port, backed by a scripted analysis
//! backend whose behavior (delays, failing phases) each test controls.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use convoscope_server::services::backend::{AnalysisBackend, BackendError, BackendRequest};
use convoscope_server::{build_router, AppState, ServerConfig};

/// Backend double: answers each phase with a canned payload, after an
/// optional delay, unless the phase is scripted to fail.
pub struct ScriptedBackend {
    delay: Duration,
    failing: Mutex<HashSet<String>>,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            delay: Duration::ZERO,
            failing: Mutex::new(HashSet::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new()
        }
    }

    pub fn fail_phase(&self, phase: &str) {
        self.failing
            .lock()
            .expect("failing lock poisoned")
            .insert(phase.to_string());
    }

    pub fn clear_failures(&self) {
        self.failing.lock().expect("failing lock poisoned").clear();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalysisBackend for ScriptedBackend {
    async fn execute(&self, request: BackendRequest) -> Result<Value, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let failing = self
            .failing
            .lock()
            .expect("failing lock poisoned")
            .contains(&request.phase);
        if failing {
            return Err(BackendError::Execution(format!(
                "scripted failure in {}",
                request.phase
            )));
        }
        Ok(json!({
            "phase": request.phase,
            "kind": request.kind,
            "seed_count": request.seeds.len(),
        }))
    }
}

/// A config with budgets sized for fast tests.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        heartbeat_interval: Duration::from_secs(2),
        max_stream_duration: Duration::from_secs(30),
        max_body_bytes: 64 * 1024,
        rate_limit_window: Duration::from_secs(60),
        rate_limit_max_requests: 1_000,
        ..ServerConfig::default()
    }
}

/// Serve the router on an ephemeral port; returns the base URL.
pub async fn spawn_server(config: ServerConfig, backend: Arc<dyn AnalysisBackend>) -> String {
    let state = AppState::new(config, backend);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");
    let router = build_router(state);
    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("test server failed");
    });
    format!("http://{addr}")
}

/// Poll `predicate` until it holds or `timeout` elapses.
pub async fn wait_until<F>(timeout: Duration, mut predicate: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if predicate() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
