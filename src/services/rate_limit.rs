//! Request Rate Limiting
//!
//! Fixed-window counters keyed by client identity. Checked before any
//! stream is opened; a rejection carries the time remaining in the window
//! as the retry-after hint.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Limited { retry_after: Duration },
}

struct Window {
    opened: Instant,
    count: u32,
}

/// Fixed-window rate limiter.
pub struct FixedWindowLimiter {
    max_requests: u32,
    window: Duration,
    windows: Mutex<HashMap<String, Window>>,
}

impl FixedWindowLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Count one request against `identity`'s current window.
    pub fn check(&self, identity: &str) -> RateDecision {
        let now = Instant::now();
        let mut windows = self.windows.lock().expect("rate limiter lock poisoned");
        let slot = windows.entry(identity.to_string()).or_insert(Window {
            opened: now,
            count: 0,
        });

        let elapsed = now.duration_since(slot.opened);
        if elapsed >= self.window {
            slot.opened = now;
            slot.count = 0;
        }

        if slot.count < self.max_requests {
            slot.count += 1;
            RateDecision::Allowed
        } else {
            RateDecision::Limited {
                retry_after: self.window.saturating_sub(now.duration_since(slot.opened)),
            }
        }
    }
}
