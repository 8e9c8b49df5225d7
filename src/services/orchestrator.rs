//! Phase Orchestrator
//!
//! Runs the ordered phase sequence for one streaming request: emit a
//! progress checkpoint, call the analysis backend, continue. Optional phases
//! degrade silently on failure; a required-phase failure emits a single
//! terminal error event and stops. The request's cancellation token is
//! polled before and after every suspension point, and once it fires
//! nothing further is emitted.

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use convoscope_core::analysis::{status, AnalysisKind};
use convoscope_core::event::StreamEvent;

use crate::services::backend::{AnalysisBackend, BackendRequest};
use crate::services::sse::EventSink;
use crate::services::validate::AnalysisPayload;

/// One phase within a request kind's plan.
#[derive(Debug, Clone, Copy)]
pub struct PhaseSpec {
    /// Internal name; keys the phase's output in seeds and results.
    pub name: &'static str,
    /// Status string emitted as the phase's progress checkpoint.
    pub status: &'static str,
    /// Optional phases may fail without failing the request.
    pub optional: bool,
}

/// The ordered phase plan for a request kind.
pub fn phase_plan(kind: AnalysisKind) -> &'static [PhaseSpec] {
    match kind {
        AnalysisKind::Recon => &[
            PhaseSpec {
                name: "research",
                status: status::RESEARCH,
                optional: true,
            },
            PhaseSpec {
                name: "recon",
                status: status::RECON,
                optional: false,
            },
        ],
        AnalysisKind::DeepRecon => &[PhaseSpec {
            name: "deep_recon",
            status: status::DEEP_RECON,
            optional: false,
        }],
        AnalysisKind::Cps => &[
            PhaseSpec {
                name: "patterns",
                status: status::CPS_PATTERNS,
                optional: false,
            },
            PhaseSpec {
                name: "emotional_labor",
                status: status::CPS_LABOR,
                optional: false,
            },
            PhaseSpec {
                name: "subtext",
                status: status::CPS_SUBTEXT,
                optional: false,
            },
            PhaseSpec {
                name: "profile",
                status: status::CPS_PROFILE,
                optional: false,
            },
        ],
        AnalysisKind::Subtext => &[PhaseSpec {
            name: "subtext",
            status: status::SUBTEXT,
            optional: false,
        }],
    }
}

/// Drives phase plans against the analysis backend.
pub struct Orchestrator {
    backend: Arc<dyn AnalysisBackend>,
}

impl Orchestrator {
    pub fn new(backend: Arc<dyn AnalysisBackend>) -> Self {
        Self { backend }
    }

    /// Run one request to its terminal event (or silent cancellation).
    pub async fn run(
        &self,
        kind: AnalysisKind,
        payload: AnalysisPayload,
        sink: EventSink,
        token: CancellationToken,
    ) {
        let plan = phase_plan(kind);
        let mut seeds = payload.seeds;
        let mut outputs: Map<String, Value> = Map::new();
        let required_total = plan.iter().filter(|p| !p.optional).count();

        for phase in plan {
            if token.is_cancelled() {
                tracing::debug!(kind = %kind, phase = phase.name, "cancelled before phase");
                sink.close();
                return;
            }

            sink.send(StreamEvent::progress(phase.status)).await;
            if token.is_cancelled() || sink.is_closed() {
                sink.close();
                return;
            }

            let request = BackendRequest {
                kind,
                phase: phase.name.to_string(),
                conversation: payload.conversation.clone(),
                seeds: seeds.clone(),
            };
            let result = self.backend.execute(request).await;

            if token.is_cancelled() {
                sink.close();
                return;
            }

            match result {
                Ok(output) => {
                    seeds.insert(phase.name.to_string(), output.clone());
                    if !phase.optional {
                        outputs.insert(phase.name.to_string(), output);
                    }
                }
                Err(err) if phase.optional => {
                    tracing::warn!(
                        kind = %kind,
                        phase = phase.name,
                        error = %err,
                        "optional phase failed, continuing without it"
                    );
                }
                Err(err) => {
                    tracing::error!(
                        kind = %kind,
                        phase = phase.name,
                        error = %err,
                        "required phase failed"
                    );
                    sink.send(StreamEvent::error(err.to_string())).await;
                    sink.close();
                    return;
                }
            }
        }

        let result = if required_total == 1 {
            outputs
                .into_iter()
                .next()
                .map(|(_, output)| output)
                .unwrap_or(Value::Null)
        } else {
            Value::Object(outputs)
        };
        sink.send(StreamEvent::complete(kind, result)).await;
        sink.close();
    }
}
