//! Progress Interpolator
//!
//! A periodic ticker that eases displayed progress toward the current
//! ceiling between sparse server checkpoints. Ticks are unordered with
//! respect to stream events but idempotent once progress reaches the
//! ceiling, so no coordination with the read loop is needed.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use convoscope_core::progress::{ease_step, TICK_MS};

use crate::operation::OperationState;
use crate::registry::OperationRegistry;

/// Spawn the ticker for one run. It stops when the run settles or its token
/// is cancelled, whichever comes first.
///
/// The registry publish happens under the state lock, as everywhere else a
/// snapshot is published, so observers see updates in state order and never
/// a stale regression.
pub(crate) fn spawn_interpolator(
    state: Arc<Mutex<OperationState>>,
    registry: OperationRegistry,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(TICK_MS));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let mut st = state.lock().expect("operation lock poisoned");
            if !st.is_running() {
                break;
            }
            if st.progress < st.ceiling {
                st.progress = ease_step(st.progress, st.ceiling);
                registry.set(st.snapshot());
            }
        }
    })
}
