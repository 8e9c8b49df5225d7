//! Integration Tests Module
//!
//! End-to-end tests against an in-process server with a scripted analysis
//! backend: wire-level stream behavior, pre-stream request policy, and the
//! client-side job pipeline scenarios.

mod support;


// Pre-stream rejections (rate limit, size budget, validation)
mod limits_test;

// Client job pipeline scenarios (sagas, cancellation, retry)
mod pipeline_test;
