//! Event Transport (server side)
//!
//! Frames stream events as SSE `data:` payloads, interleaves keepalive
//! comment frames on a fixed interval, and owns exactly-once stream closing.
//!
//! The orchestrator writes through an [`EventSink`]; a pump task converts
//! events to wire frames and feeds the HTTP response body. When the client
//! disconnects, the pump's writes fail, it cancels the request token, and
//! the orchestrator observes that at its next poll. A sink that has been
//! closed swallows further writes silently.

use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Response};
use bytes::Bytes;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use convoscope_core::event::{StreamEvent, HEARTBEAT_FRAME};

const CHANNEL_CAPACITY: usize = 32;

/// Write half of one event stream.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::Sender<StreamEvent>,
    closed: Arc<AtomicBool>,
}

impl EventSink {
    /// Emit one event. After `close` (or after the receiving side went
    /// away) this is a silent no-op, never an error.
    pub async fn send(&self, event: StreamEvent) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        if self.tx.send(event).await.is_err() {
            // Receiver gone: the pump stopped or the client disconnected.
            self.close();
        }
    }

    /// Close the sink. Idempotent; later `send` calls are no-ops.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Create the event channel for one stream.
pub fn event_sink() -> (EventSink, mpsc::Receiver<StreamEvent>) {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    (
        EventSink {
            tx,
            closed: Arc::new(AtomicBool::new(false)),
        },
        rx,
    )
}

/// Build the streaming HTTP response for one event channel, spawning the
/// pump that frames events and emits a heartbeat every `heartbeat`.
///
/// `token` is cancelled when the client side of the response goes away, so
/// the producer stops emitting into the void.
pub fn event_stream_response(
    mut events: mpsc::Receiver<StreamEvent>,
    heartbeat: Duration,
    token: CancellationToken,
) -> Response<Body> {
    let (bytes_tx, bytes_rx) = mpsc::channel::<Bytes>(CHANNEL_CAPACITY);

    tokio::spawn(async move {
        let mut heartbeats = interval_at(Instant::now() + heartbeat, heartbeat);
        heartbeats.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => {
                        let frame = match event.to_frame() {
                            Ok(frame) => frame,
                            Err(e) => {
                                tracing::error!(error = %e, "unencodable stream event");
                                continue;
                            }
                        };
                        if bytes_tx.send(Bytes::from(frame)).await.is_err() {
                            token.cancel();
                            break;
                        }
                    }
                    // All sinks dropped: the stream is complete.
                    None => break,
                },
                _ = heartbeats.tick() => {
                    if bytes_tx
                        .send(Bytes::from_static(HEARTBEAT_FRAME.as_bytes()))
                        .await
                        .is_err()
                    {
                        token.cancel();
                        break;
                    }
                }
            }
        }
    });

    let body = Body::from_stream(ReceiverStream::new(bytes_rx).map(Ok::<_, Infallible>));
    Response::builder()
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache, no-transform")
        .header(header::CONNECTION, "keep-alive")
        .header("x-accel-buffering", "no")
        .body(body)
        .expect("static event-stream headers are valid")
}
