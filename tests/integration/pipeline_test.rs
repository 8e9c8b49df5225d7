//! Client Pipeline Tests
//!
//! The spec'd end-to-end scenarios, driven through the client crate: saga
//! completion, double-start rejection, silent cancellation, independent
//! concurrent keys, and error-retained-then-retry.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;

use convoscope_client::{
    AnalysisClient, JobRunner, OperationRegistry, OperationSnapshot, StartOutcome, CPS_JOB,
    SUBTEXT_JOB,
};

use super::support::{spawn_server, test_config, wait_until, ScriptedBackend};

struct Harness {
    backend: Arc<ScriptedBackend>,
    registry: OperationRegistry,
    base_url: String,
}

impl Harness {
    async fn new(backend: ScriptedBackend) -> Self {
        let backend = Arc::new(backend);
        let base_url = spawn_server(test_config(), backend.clone()).await;
        Self {
            backend,
            registry: OperationRegistry::new(),
            base_url,
        }
    }

    fn runner(&self, spec: &'static convoscope_client::JobSpec) -> JobRunner {
        JobRunner::new(
            spec,
            AnalysisClient::new(self.base_url.clone()),
            self.registry.clone(),
        )
    }

    /// Record every snapshot the registry publishes for `key`.
    fn record(&self, key: &'static str) -> Arc<Mutex<Vec<Option<OperationSnapshot>>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        self.registry.subscribe(move |k, snapshot| {
            if k == key {
                sink.lock().unwrap().push(snapshot.cloned());
            }
        });
        seen
    }
}

/// Start a run and await its completion callback.
async fn run_to_completion(runner: &JobRunner, conversation: &str) -> Value {
    let (tx, rx) = tokio::sync::oneshot::channel();
    let outcome = runner.start_with(conversation, move |result| {
        let _ = tx.send(result);
    });
    assert_eq!(outcome, StartOutcome::Started);
    tokio::time::timeout(Duration::from_secs(10), rx)
        .await
        .expect("run timed out")
        .expect("run never completed")
}

#[tokio::test]
async fn test_cps_saga_completes_with_monotonic_progress() {
    let harness = Harness::new(ScriptedBackend::new()).await;
    let snapshots = harness.record("cps");
    let runner = harness.runner(&CPS_JOB);

    let result = run_to_completion(&runner, "hello there").await;

    // The final pass's output is the job result.
    for key in ["patterns", "emotional_labor", "subtext", "profile"] {
        assert!(result.get(key).is_some(), "missing pass output: {key}");
    }
    // recon + deep recon + four main passes, plus the optional research pass.
    assert_eq!(harness.backend.calls(), 7);
    // Success removes the registry entry.
    assert!(harness.registry.get("cps").is_none());

    let snapshots = snapshots.lock().unwrap();
    assert!(snapshots.len() >= 2);
    assert!(snapshots.last().unwrap().is_none(), "entry not cleared");
    let mut last_progress = 0.0f32;
    for snapshot in snapshots.iter().flatten() {
        assert!(
            snapshot.progress >= last_progress,
            "progress regressed: {} -> {}",
            last_progress,
            snapshot.progress
        );
        // While live, the interpolator never passes the highest ceiling.
        assert!(snapshot.progress <= 96.0 + f32::EPSILON);
        assert!(snapshot.error.is_none());
        last_progress = snapshot.progress;
    }
}

#[tokio::test]
async fn test_double_start_is_a_no_op_with_one_request_and_one_entry() {
    let harness = Harness::new(ScriptedBackend::with_delay(Duration::from_millis(300))).await;
    let runner = harness.runner(&SUBTEXT_JOB);

    let (tx, rx) = tokio::sync::oneshot::channel();
    assert_eq!(
        runner.start_with("hello", move |result| {
            let _ = tx.send(result);
        }),
        StartOutcome::Started
    );
    assert_eq!(runner.start("hello"), StartOutcome::AlreadyRunning);
    assert_eq!(harness.registry.snapshot().len(), 1);

    tokio::time::timeout(Duration::from_secs(10), rx)
        .await
        .expect("run timed out")
        .expect("run never completed");
    assert_eq!(harness.backend.calls(), 1);
}

#[tokio::test]
async fn test_cancel_is_silent() {
    let harness = Harness::new(ScriptedBackend::with_delay(Duration::from_secs(5))).await;
    let snapshots = harness.record("subtext");
    let runner = harness.runner(&SUBTEXT_JOB);

    assert_eq!(runner.start("hello"), StartOutcome::Started);
    assert!(
        wait_until(Duration::from_secs(2), || harness
            .registry
            .get("subtext")
            .is_some())
        .await
    );

    runner.cancel();
    assert!(
        wait_until(Duration::from_secs(2), || harness
            .registry
            .get("subtext")
            .is_none())
        .await,
        "cancelled entry was not cleared"
    );

    // No error was ever recorded.
    let snapshots = snapshots.lock().unwrap();
    assert!(snapshots
        .iter()
        .flatten()
        .all(|snapshot| snapshot.error.is_none()));
}

#[tokio::test]
async fn test_two_keys_run_independently() {
    let harness = Harness::new(ScriptedBackend::new()).await;
    let cps = harness.runner(&CPS_JOB);
    let subtext = harness.runner(&SUBTEXT_JOB);

    let (cps_result, subtext_result) = tokio::join!(
        run_to_completion(&cps, "conversation one"),
        run_to_completion(&subtext, "conversation two"),
    );

    assert!(cps_result.get("profile").is_some());
    assert_eq!(subtext_result["phase"], "subtext");
    assert!(harness.registry.snapshot().is_empty());
}

#[tokio::test]
async fn test_failed_run_is_retained_then_retry_clears_it() {
    let harness = Harness::new(ScriptedBackend::new()).await;
    harness.backend.fail_phase("subtext");
    let runner = harness.runner(&SUBTEXT_JOB);

    assert_eq!(runner.start("hello"), StartOutcome::Started);
    assert!(
        wait_until(Duration::from_secs(5), || harness
            .registry
            .get("subtext")
            .is_some_and(|snapshot| snapshot.error.is_some()))
        .await,
        "error entry never appeared"
    );
    let snapshot = harness.registry.get("subtext").unwrap();
    assert_eq!(
        snapshot.error.as_deref(),
        Some("scripted failure in subtext")
    );

    // Retry is a fresh run; with the failure cleared it succeeds and the
    // retained error entry goes away.
    harness.backend.clear_failures();
    let result = run_to_completion(&runner, "hello").await;
    assert_eq!(result["phase"], "subtext");
    assert!(harness.registry.get("subtext").is_none());
}
