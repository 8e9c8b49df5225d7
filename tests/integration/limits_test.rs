//! Pre-Stream Rejection Tests
//!
//! Rate limiting, the body size budget, and schema validation all reject a
//! request with an ordinary JSON response before any stream opens.

use std::sync::Arc;

use serde_json::{json, Value};

use super::support::{spawn_server, test_config, ScriptedBackend};

async fn post(base_url: &str, path: &str, body: &Value) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("{base_url}/v1/analysis/{path}"))
        .json(body)
        .send()
        .await
        .expect("request failed")
}

fn is_json(response: &reqwest::Response) -> bool {
    response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"))
}

#[tokio::test]
async fn test_requests_beyond_the_window_budget_get_429_with_retry_after() {
    let mut config = test_config();
    config.rate_limit_max_requests = 3;
    let backend = Arc::new(ScriptedBackend::new());
    let base_url = spawn_server(config, backend).await;

    let body = json!({"conversation": "hello"});
    for _ in 0..3 {
        let response = post(&base_url, "subtext", &body).await;
        assert_eq!(response.status().as_u16(), 200);
        // Drain so the server finishes each stream.
        let _ = response.text().await;
    }

    for _ in 0..2 {
        let response = post(&base_url, "subtext", &body).await;
        assert_eq!(response.status().as_u16(), 429);
        // No stream opened: this is a plain JSON rejection.
        assert!(is_json(&response));
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .expect("missing retry-after header");
        assert!(retry_after >= 1 && retry_after <= 60);
        let error: Value = response.json().await.expect("rejection body");
        assert!(error["error"]
            .as_str()
            .expect("error message")
            .starts_with("Rate limit exceeded"));
    }
}

#[tokio::test]
async fn test_oversized_body_gets_413() {
    let mut config = test_config();
    config.max_body_bytes = 1024;
    let backend = Arc::new(ScriptedBackend::new());
    let base_url = spawn_server(config, backend).await;

    let body = json!({"conversation": "x".repeat(2048)});
    let response = post(&base_url, "subtext", &body).await;
    assert_eq!(response.status().as_u16(), 413);
    assert!(is_json(&response));
    let error: Value = response.json().await.expect("rejection body");
    assert!(error["error"]
        .as_str()
        .expect("error message")
        .contains("exceeds"));
}

#[tokio::test]
async fn test_missing_conversation_gets_400_validation_error() {
    let backend = Arc::new(ScriptedBackend::new());
    let base_url = spawn_server(test_config(), backend.clone()).await;

    let response = post(&base_url, "subtext", &json!({})).await;
    assert_eq!(response.status().as_u16(), 400);
    let error: Value = response.json().await.expect("rejection body");
    assert!(error["error"]
        .as_str()
        .expect("error message")
        .starts_with("Validation error:"));

    // Nothing reached the backend.
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_missing_saga_seed_gets_400_naming_the_field() {
    let backend = Arc::new(ScriptedBackend::new());
    let base_url = spawn_server(test_config(), backend).await;

    let response = post(&base_url, "cps", &json!({"conversation": "hello"})).await;
    assert_eq!(response.status().as_u16(), 400);
    let error: Value = response.json().await.expect("rejection body");
    assert!(error["error"].as_str().expect("error message").contains("recon"));
}
