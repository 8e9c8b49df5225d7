//! Analysis Streaming Handlers
//!
//! One POST route per analysis kind. Every request runs the same gauntlet
//! before a stream opens: rate limit, body size budget, validation. Once
//! those pass, the orchestrator is spawned under the wall-clock budget and
//! the streaming response is returned immediately.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, Response};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use convoscope_core::analysis::AnalysisKind;

use crate::services::orchestrator::Orchestrator;
use crate::services::rate_limit::RateDecision;
use crate::services::sse::{event_sink, event_stream_response};
use crate::services::validate::validate_request;
use crate::state::AppState;
use crate::utils::error::{ServerError, ServerResult};

pub async fn recon(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> ServerResult<Response<Body>> {
    open_stream(state, addr, headers, AnalysisKind::Recon, body).await
}

pub async fn deep_recon(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> ServerResult<Response<Body>> {
    open_stream(state, addr, headers, AnalysisKind::DeepRecon, body).await
}

pub async fn cps(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> ServerResult<Response<Body>> {
    open_stream(state, addr, headers, AnalysisKind::Cps, body).await
}

pub async fn subtext(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> ServerResult<Response<Body>> {
    open_stream(state, addr, headers, AnalysisKind::Subtext, body).await
}

async fn open_stream(
    state: AppState,
    addr: SocketAddr,
    headers: HeaderMap,
    kind: AnalysisKind,
    body: Bytes,
) -> ServerResult<Response<Body>> {
    let identity = client_identity(&headers, addr);

    if let RateDecision::Limited { retry_after } = state.limiter.check(&identity) {
        return Err(ServerError::RateLimited {
            retry_after_secs: retry_after.as_secs().max(1),
        });
    }

    if body.len() > state.config.max_body_bytes {
        return Err(ServerError::PayloadTooLarge {
            size: body.len(),
            limit: state.config.max_body_bytes,
        });
    }

    let payload = validate_request(kind, &body)?;

    let request_id = Uuid::new_v4();
    let token = CancellationToken::new();
    let (sink, events) = event_sink();
    let response =
        event_stream_response(events, state.config.heartbeat_interval, token.clone());

    let orchestrator = Orchestrator::new(Arc::clone(&state.backend));
    let budget = state.config.max_stream_duration;
    tokio::spawn(async move {
        let run = orchestrator.run(kind, payload, sink.clone(), token.clone());
        if tokio::time::timeout(budget, run).await.is_err() {
            tracing::warn!(%request_id, kind = %kind, "stream exceeded its wall-clock budget");
            token.cancel();
            sink.close();
        }
    });

    tracing::info!(%request_id, kind = %kind, client = %identity, "analysis stream opened");
    Ok(response)
}

/// Client identity for rate limiting: first `X-Forwarded-For` hop when
/// present, else the socket address IP.
fn client_identity(headers: &HeaderMap, addr: SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| addr.ip().to_string())
}
