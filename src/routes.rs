//! Route Assembly

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    // The size budget is enforced in the handlers with a JSON error body;
    // axum's own limit stays as a backstop well above it.
    let body_limit = DefaultBodyLimit::max(state.config.max_body_bytes.saturating_mul(4).max(1));

    Router::new()
        .route("/healthz", get(handlers::health::healthz))
        .route("/v1/analysis/recon", post(handlers::analysis::recon))
        .route("/v1/analysis/deep-recon", post(handlers::analysis::deep_recon))
        .route("/v1/analysis/cps", post(handlers::analysis::cps))
        .route("/v1/analysis/subtext", post(handlers::analysis::subtext))
        .layer(body_limit)
        .with_state(state)
}
