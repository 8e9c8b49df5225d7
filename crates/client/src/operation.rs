//! Operation State Machine
//!
//! One state machine per job key: `idle → running → {complete | error}`,
//! with `error|complete → idle` on reset or retry. The runner owns the
//! cancellation token and the network connection, not the view that rendered
//! the start button, so navigating away never aborts a run.
//!
//! Multi-request jobs are driven as a saga: the runner issues each kind's
//! streaming request in order and carries the accumulated results forward as
//! seeds for the next request. Retry is always a fresh run from the first
//! request.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use convoscope_core::analysis::{status, AnalysisKind};
use convoscope_core::event::StreamEvent;
use convoscope_core::progress::{PhaseCheckpoint, PhaseMap, COMPLETE};

use crate::api::AnalysisClient;
use crate::interpolator;
use crate::registry::{OperationRegistry, OperationSnapshot};
use crate::transport::StreamOutcome;

/// One streaming request within a job's saga.
#[derive(Debug, Clone, Copy)]
pub struct SagaStep {
    pub kind: AnalysisKind,
    /// Upstream results to copy into this request's body, by their seed key.
    pub seeds: &'static [AnalysisKind],
}

/// Static description of a job key: its saga and its progress display table.
pub struct JobSpec {
    pub key: &'static str,
    pub label: &'static str,
    pub phase_map: PhaseMap,
    pub steps: &'static [SagaStep],
}

/// The full psychology analysis: recon, deep recon, then four main passes,
/// issued as three sequential streaming requests.
pub static CPS_JOB: JobSpec = JobSpec {
    key: "cps",
    label: "Psychology analysis",
    phase_map: PhaseMap::new(&[
        PhaseCheckpoint { status: status::RESEARCH, start: 2.0, ceiling: 8.0 },
        PhaseCheckpoint { status: status::RECON, start: 8.0, ceiling: 22.0 },
        PhaseCheckpoint { status: status::DEEP_RECON, start: 22.0, ceiling: 40.0 },
        PhaseCheckpoint { status: status::CPS_PATTERNS, start: 40.0, ceiling: 55.0 },
        PhaseCheckpoint { status: status::CPS_LABOR, start: 55.0, ceiling: 70.0 },
        PhaseCheckpoint { status: status::CPS_SUBTEXT, start: 70.0, ceiling: 85.0 },
        PhaseCheckpoint { status: status::CPS_PROFILE, start: 85.0, ceiling: 96.0 },
    ]),
    steps: &[
        SagaStep { kind: AnalysisKind::Recon, seeds: &[] },
        SagaStep { kind: AnalysisKind::DeepRecon, seeds: &[AnalysisKind::Recon] },
        SagaStep {
            kind: AnalysisKind::Cps,
            seeds: &[AnalysisKind::Recon, AnalysisKind::DeepRecon],
        },
    ],
};

/// Standalone subtext reading, a single request.
pub static SUBTEXT_JOB: JobSpec = JobSpec {
    key: "subtext",
    label: "Subtext reading",
    phase_map: PhaseMap::new(&[PhaseCheckpoint {
        status: status::SUBTEXT,
        start: 12.0,
        ceiling: 88.0,
    }]),
    steps: &[SagaStep { kind: AnalysisKind::Subtext, seeds: &[] }],
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OperationStatus {
    Idle,
    Running,
    Complete,
    Error,
}

/// Mutable state of one run, shared between the saga driver, the
/// interpolator ticker, and the runner's control methods.
pub(crate) struct OperationState {
    spec: &'static JobSpec,
    status: OperationStatus,
    phase_name: Option<String>,
    pub(crate) progress: f32,
    pub(crate) ceiling: f32,
    error: Option<String>,
    started_at: DateTime<Utc>,
}

impl OperationState {
    fn new(spec: &'static JobSpec) -> Self {
        Self {
            spec,
            status: OperationStatus::Running,
            phase_name: None,
            progress: 0.0,
            ceiling: 0.0,
            error: None,
            started_at: Utc::now(),
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.status == OperationStatus::Running
    }

    /// Apply a progress checkpoint. Unknown statuses leave progress and
    /// ceiling untouched; known ones jump to the checkpoint's start without
    /// ever moving backwards.
    fn apply_status(&mut self, status_text: &str) {
        self.phase_name = Some(status_text.to_string());
        if let Some(checkpoint) = self.spec.phase_map.lookup(status_text) {
            self.progress = self.progress.max(checkpoint.start);
            self.ceiling = checkpoint.ceiling;
        }
    }

    fn complete(&mut self) {
        self.status = OperationStatus::Complete;
        self.progress = COMPLETE;
    }

    fn fail(&mut self, message: impl Into<String>) {
        self.status = OperationStatus::Error;
        self.error = Some(message.into());
    }

    fn settle_cancelled(&mut self) {
        self.status = OperationStatus::Idle;
    }

    pub(crate) fn snapshot(&self) -> OperationSnapshot {
        OperationSnapshot {
            key: self.spec.key.to_string(),
            label: self.spec.label.to_string(),
            phase_name: self.phase_name.clone(),
            progress: self.progress,
            is_complete: self.status == OperationStatus::Complete,
            error: self.error.clone(),
            started_at: self.started_at,
        }
    }
}

/// Outcome of a `start` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// A live operation already exists for this key; the call was a no-op.
    AlreadyRunning,
}

struct LiveRun {
    token: CancellationToken,
    state: Arc<Mutex<OperationState>>,
}

struct RunnerInner {
    spec: &'static JobSpec,
    client: AnalysisClient,
    registry: OperationRegistry,
    live: Mutex<Option<LiveRun>>,
}

/// Per-key job runner. Cloneable; clones share the same live run.
#[derive(Clone)]
pub struct JobRunner {
    inner: Arc<RunnerInner>,
}

impl JobRunner {
    pub fn new(
        spec: &'static JobSpec,
        client: AnalysisClient,
        registry: OperationRegistry,
    ) -> Self {
        Self {
            inner: Arc::new(RunnerInner {
                spec,
                client,
                registry,
                live: Mutex::new(None),
            }),
        }
    }

    pub fn key(&self) -> &'static str {
        self.inner.spec.key
    }

    /// Start a run, discarding the final result.
    pub fn start(&self, conversation: impl Into<String>) -> StartOutcome {
        self.start_with(conversation, |_| {})
    }

    /// Start a run; `on_complete` receives the final result on success.
    ///
    /// A second start while a live operation exists for this key is a
    /// rejected no-op: no request is issued and no state is touched.
    /// Starting over a settled (error/complete) run supersedes its token.
    pub fn start_with<F>(&self, conversation: impl Into<String>, on_complete: F) -> StartOutcome
    where
        F: FnOnce(Value) + Send + 'static,
    {
        let conversation = conversation.into();
        let mut live = self.inner.live.lock().expect("runner lock poisoned");

        if let Some(run) = live.as_ref() {
            if run.state.lock().expect("operation lock poisoned").is_running() {
                return StartOutcome::AlreadyRunning;
            }
        }
        // A live registry entry for this key (e.g. from another runner
        // instance) also rejects the start.
        if self
            .inner
            .registry
            .get(self.inner.spec.key)
            .is_some_and(|snap| snap.is_live())
        {
            return StartOutcome::AlreadyRunning;
        }

        // Supersede: abort the previous token before issuing a new one, so
        // the old run's late events cannot mutate the new run's state.
        if let Some(previous) = live.take() {
            previous.token.cancel();
        }

        let token = CancellationToken::new();
        let state = Arc::new(Mutex::new(OperationState::new(self.inner.spec)));
        let first_snapshot = state
            .lock()
            .expect("operation lock poisoned")
            .snapshot();
        self.inner.registry.set(first_snapshot);
        *live = Some(LiveRun {
            token: token.clone(),
            state: Arc::clone(&state),
        });
        drop(live);

        interpolator::spawn_interpolator(
            Arc::clone(&state),
            self.inner.registry.clone(),
            token.clone(),
        );

        let runner = self.clone();
        tokio::spawn(async move {
            runner
                .drive(conversation, state, token, Box::new(on_complete))
                .await;
        });
        StartOutcome::Started
    }

    /// Abort the live run, if any. Cancellation is not a failure: the
    /// registry entry is removed and no error is recorded.
    pub fn cancel(&self) {
        let live = self.inner.live.lock().expect("runner lock poisoned");
        if let Some(run) = live.as_ref() {
            run.token.cancel();
        }
    }

    /// Return a settled (error/complete) run to idle, clearing its retained
    /// registry entry. A no-op while running.
    pub fn reset(&self) {
        let mut live = self.inner.live.lock().expect("runner lock poisoned");
        if let Some(run) = live.as_ref() {
            if run.state.lock().expect("operation lock poisoned").is_running() {
                return;
            }
        }
        *live = None;
        self.inner.registry.clear(self.inner.spec.key);
    }

    /// Current registry snapshot for this runner's key.
    pub fn snapshot(&self) -> Option<OperationSnapshot> {
        self.inner.registry.get(self.inner.spec.key)
    }

    async fn drive(
        self,
        conversation: String,
        state: Arc<Mutex<OperationState>>,
        token: CancellationToken,
        on_complete: Box<dyn FnOnce(Value) + Send>,
    ) {
        let mut results: HashMap<AnalysisKind, Value> = HashMap::new();
        let steps = self.inner.spec.steps;

        for step in steps {
            if token.is_cancelled() {
                self.settle_cancelled(&state);
                return;
            }

            let mut body = json!({ "conversation": conversation });
            for seed in step.seeds {
                if let Some(result) = results.get(seed) {
                    body[seed.seed_key()] = result.clone();
                }
            }

            // The callback closes over this run's token and checks liveness
            // before applying state, so a superseded run goes quiet.
            let apply_token = token.clone();
            let apply_state = Arc::clone(&state);
            let registry = self.inner.registry.clone();
            let outcome = self
                .inner
                .client
                .stream(step.kind, &body, &token, move |event| {
                    if apply_token.is_cancelled() {
                        return;
                    }
                    if let StreamEvent::Progress { status } = event {
                        // Published under the state lock so registry
                        // observers never see a stale snapshot out of order.
                        let mut st = apply_state.lock().expect("operation lock poisoned");
                        st.apply_status(status);
                        registry.set(st.snapshot());
                    }
                })
                .await;

            match outcome {
                Ok(StreamOutcome::Terminal(StreamEvent::Error { error })) => {
                    self.settle_error(&state, error);
                    return;
                }
                Ok(StreamOutcome::Terminal(event)) => {
                    let result = event.into_result().unwrap_or(Value::Null);
                    results.insert(step.kind, result);
                }
                Ok(StreamOutcome::Cancelled) => {
                    self.settle_cancelled(&state);
                    return;
                }
                Ok(StreamOutcome::EndedWithoutTerminal) => {
                    if token.is_cancelled() {
                        self.settle_cancelled(&state);
                    } else {
                        self.settle_error(
                            &state,
                            "The connection dropped before the analysis finished",
                        );
                    }
                    return;
                }
                Err(err) => {
                    if token.is_cancelled() {
                        self.settle_cancelled(&state);
                    } else {
                        self.settle_error(&state, err.to_string());
                    }
                    return;
                }
            }
        }

        let final_kind = steps[steps.len() - 1].kind;
        let result = results.remove(&final_kind).unwrap_or(Value::Null);
        self.settle_complete(&state, result, on_complete);
    }

    fn settle_complete(
        &self,
        state: &Arc<Mutex<OperationState>>,
        result: Value,
        on_complete: Box<dyn FnOnce(Value) + Send>,
    ) {
        {
            let mut st = state.lock().expect("operation lock poisoned");
            st.complete();
            self.inner.registry.clear(self.inner.spec.key);
        }
        tracing::info!(key = self.inner.spec.key, "analysis complete");
        on_complete(result);
    }

    fn settle_error(&self, state: &Arc<Mutex<OperationState>>, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(
            key = self.inner.spec.key,
            error = %message,
            "analysis failed"
        );
        let mut st = state.lock().expect("operation lock poisoned");
        st.fail(message);
        // Retained in the registry until the user retries or resets.
        self.inner.registry.set(st.snapshot());
    }

    fn settle_cancelled(&self, state: &Arc<Mutex<OperationState>>) {
        {
            let mut st = state.lock().expect("operation lock poisoned");
            st.settle_cancelled();
            self.inner.registry.clear(self.inner.spec.key);
        }
        tracing::debug!(key = self.inner.spec.key, "run cancelled");
    }
}
