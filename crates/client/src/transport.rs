//! Event Transport (client side)
//!
//! Decodes an SSE byte stream back into typed events: incremental buffering
//! of partial reads, frame splitting, keepalive filtering, JSON decoding,
//! and an ordered read loop that processes each event synchronously before
//! resuming. Events are never dropped or reordered relative to arrival.

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use convoscope_core::event::{StreamEvent, FRAME_DELIMITER};

use crate::error::{ClientError, ClientResult};

/// Incremental SSE frame decoder.
///
/// Feed arbitrary chunk boundaries; complete frames come out as their
/// `data:` payloads. Comment frames (heartbeats) produce nothing.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: String,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one chunk and return the payload of every frame it completed,
    /// in wire order.
    pub fn feed(&mut self, chunk: &str) -> Vec<String> {
        self.buffer.push_str(chunk);

        let mut payloads = Vec::new();
        while let Some(end) = self.buffer.find(FRAME_DELIMITER) {
            let frame: String = self.buffer.drain(..end + FRAME_DELIMITER.len()).collect();
            if let Some(payload) = Self::payload_of(frame.trim_end_matches('\n')) {
                payloads.push(payload);
            }
        }
        payloads
    }

    /// Extract the data payload of one complete frame, if it carries any.
    fn payload_of(frame: &str) -> Option<String> {
        let mut data_lines: Vec<&str> = Vec::new();
        for line in frame.lines() {
            if line.starts_with(':') {
                // keepalive / comment line
                continue;
            }
            if let Some(rest) = line.strip_prefix("data:") {
                data_lines.push(rest.strip_prefix(' ').unwrap_or(rest));
            }
        }
        if data_lines.is_empty() {
            None
        } else {
            Some(data_lines.join("\n"))
        }
    }
}

/// How an event stream ended.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamOutcome {
    /// The stream delivered its terminal event.
    Terminal(StreamEvent),
    /// The caller's token fired; the stream was abandoned mid-read.
    Cancelled,
    /// The connection ended with no terminal event and no cancellation.
    /// The caller concludes an abnormal termination.
    EndedWithoutTerminal,
}

/// Read a streaming response to its end, invoking `on_event` for each
/// decoded event in arrival order.
///
/// The callback runs synchronously before the next read; the loop returns as
/// soon as a terminal event has been delivered. Cancellation is observed at
/// every read suspension point.
pub async fn read_event_stream<F>(
    response: reqwest::Response,
    token: &CancellationToken,
    mut on_event: F,
) -> ClientResult<StreamOutcome>
where
    F: FnMut(&StreamEvent),
{
    let mut decoder = FrameDecoder::new();
    let mut stream = response.bytes_stream();

    loop {
        let chunk = tokio::select! {
            _ = token.cancelled() => return Ok(StreamOutcome::Cancelled),
            chunk = stream.next() => chunk,
        };

        match chunk {
            Some(Ok(bytes)) => {
                for payload in decoder.feed(&String::from_utf8_lossy(&bytes)) {
                    let event: StreamEvent = serde_json::from_str(&payload)
                        .map_err(|e| ClientError::decode(format!("bad event frame: {e}")))?;
                    let terminal = event.is_terminal();
                    on_event(&event);
                    if terminal {
                        return Ok(StreamOutcome::Terminal(event));
                    }
                }
            }
            Some(Err(e)) => {
                if token.is_cancelled() {
                    return Ok(StreamOutcome::Cancelled);
                }
                return Err(ClientError::Network(e));
            }
            None => return Ok(StreamOutcome::EndedWithoutTerminal),
        }
    }
}
